//! Command vocabulary of the mount computer.

/// Every command name the client is allowed to send.
pub const KNOWN_COMMANDS: &[&str] = &[
    ":AP", ":CM", ":FLIP",
    ":GDW", ":GDA", ":GDF", ":GDS", ":GDGPS", ":GJD1", ":GDUT", ":GDUTV",
    ":GLDT", ":GMs", ":GMsa", ":GMsb", ":GMACW", ":GMAC",
    ":GREF", ":GRPRS", ":GRTMP",
    ":GS", ":GT", ":GTMP1", ":GUDT",
    ":GVD", ":GVN", ":GVP", ":GVT", ":GVZ",
    ":GWOL", ":Ga", ":GaXa", ":GaXb",
    ":Gd", ":Gdat", ":Gev", ":Gg", ":Gh", ":GINQ", ":Ginfo", ":Glms",
    ":Glmt", ":Gmte", ":Go", ":Gr", ":Gt", ":gtg", ":GTsid",
    ":Guaf", ":Gz", ":Gstm", ":GAPO", ":GCFG", ":gtgpps",
    ":MA", ":MS", ":MaX", ":Me", ":Mn", ":Ms", ":Mw", ":MSao", ":MSap",
    ":NTGdisc", ":NTGweb", ":NTSdisc", ":NTSweb", ":NUtim",
    ":PO", ":PaX", ":PiP",
    ":Q", ":QaXa", ":QaXb", ":Qe", ":Qn", ":Qs", ":Qw",
    ":RC", ":Rc", ":RG", ":RM", ":RMs", ":RS", ":RT0", ":RT1", ":RT2", ":RT9",
    ":SDAr", ":SREF", ":SRPRS", ":SRTMP", ":STOP", ":SWOL",
    ":Sa", ":SaXa", ":SaXb", ":Sd", ":Sdat", ":Sev", ":Sg", ":Sh", ":Slms", ":Slmt",
    ":So", ":Sr", ":St", ":Suaf", ":Sw", ":Sz",
    ":TLEG", ":TLEL0", ":TLEGAZ", ":TLEGEQ", ":TLEP", ":TLES", ":TLESCK",
    ":TRNEW", ":TRADD", ":TRP", ":TRREPLAY",
    ":TROFFGET", ":TROFFSET", ":TROFFADD", ":TROFFCLR",
    ":U2",
    ":delalig", ":delalst", ":endalig", ":getain", ":getalp", ":getalst", ":hP",
    ":modelcnt", ":modeldel0", ":modelld0", ":modelnam", ":modelsv0",
    ":newalig", ":newalpt",
    ":WSG", ":WSP", ":WST", ":WSH", ":WSD", ":WSS",
    ":shutdown",
];

/// Commands the mount never answers.
pub const NO_REPLY: &[&str] = &[
    ":AP", ":hP",
    ":Me", ":Mn", ":Ms", ":Mw",
    ":PO",
    ":Q", ":Qe", ":Qn", ":Qs", ":Qw",
    ":RC", ":Rc", ":RG", ":RM", ":RS", ":RT0", ":RT1", ":RT2", ":RT9",
    ":SDAr", ":STOP",
    ":U2",
    ":Suaf",
];

/// Commands answered with bare characters and no `#` end mark.
pub const ACK_ONLY: &[&str] = &[
    ":FLIP", ":shutdown", ":GREF", ":Guaf",
    ":MA",
    ":RMs",
    ":SREF", ":SRPRS", ":Sa", ":Sev", ":Sr",
    ":SRTMP", ":Slmt", ":Slms", ":St", ":Sg", ":Sw", ":Sz",
    ":Sdat", ":Gdat",
    ":GTsid", ":So", ":Sh", ":Sd", ":MSap", ":MSao", ":MS",
    ":WSS", ":SWOL",
];
