//! Binary entrypoint for the mountlink CLI.
//!
//! Commands:
//! - `init` - write a starter `mountlink.toml`
//! - `classify <batch>` - print the expected reply shape of a command batch
//! - `send <batch>` - run one validated exchange and print the reply tokens
//! - `raw <batch>` - send without validation and print whatever comes back
//! - `probe` - check whether the mount command port accepts connections
//! - `boot` - wake the mount with a Wake-on-LAN packet
//! - `shutdown` - ask the mount computer to shut down
//! - `monitor [--dome] [--clock] [--json]` - poll the mount and log events until Ctrl-C
//!
//! See the library crate docs for module-level details: `mountlink::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use mountlink::config::Config;
use mountlink::events;
use mountlink::logutil::escape_log;
use mountlink::metrics;
use mountlink::mount::reachability::check_reachable;
use mountlink::mount::MountDevice;
use mountlink::protocol::{classify, valid_command_set};
use mountlink::transport::Connection;

#[derive(Parser)]
#[command(name = "mountlink")]
#[command(about = "Command client and poller for 10micron mount computers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "mountlink.toml", global = true)]
    config: String,

    /// Mount host, overrides the config file
    #[arg(long, global = true)]
    host: Option<String>,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Show the reply shape of a command batch
    Classify { batch: String },
    /// Send a command batch and print the reply
    Send { batch: String },
    /// Send a batch without validation and print the raw reply
    Raw { batch: String },
    /// Check whether the mount accepts connections
    Probe,
    /// Wake the mount via Wake-on-LAN
    Boot,
    /// Shut the mount computer down
    Shutdown,
    /// Poll the mount and log events until interrupted
    Monitor {
        /// Also poll the dome status
        #[arg(long)]
        dome: bool,
        /// Also poll the mount clock
        #[arg(long)]
        clock: bool,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let mut config = match Config::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            if std::path::Path::new(&cli.config).exists() {
                return Err(e);
            }
            Config::default()
        }
    };
    if let Some(host) = cli.host {
        config.mount.host = Some(host);
    }
    init_logging(&Some(config.clone()), cli.verbose);
    let options = config.mount_options();

    match cli.command {
        Commands::Init => {}
        Commands::Classify { batch } => {
            let shape = classify(&batch);
            println!(
                "valid={} chunks={} min_bytes={} wait={}",
                valid_command_set(&batch),
                shape.chunks_to_receive,
                shape.min_bytes,
                shape.must_wait
            );
        }
        Commands::Send { batch } => {
            let conn = Connection::new(options.host, options.port).with_timeouts(options.timeouts);
            let response = conn.exchange(&batch).await?;
            for (i, token) in response.tokens.iter().enumerate() {
                println!("{:>3}: {}", i, escape_log(token));
            }
        }
        Commands::Raw { batch } => {
            let conn = Connection::new(options.host, options.port).with_timeouts(options.timeouts);
            let reply = conn.communicate_raw(&batch).await;
            println!(
                "connected={} received={} payload={}",
                reply.connected,
                reply.received,
                escape_log(&reply.payload)
            );
        }
        Commands::Probe => {
            let addr = Connection::new(options.host, options.port)
                .addr()
                .ok_or_else(|| anyhow!("no mount host configured"))?;
            let up = check_reachable(&addr, options.probe_timeout).await;
            println!("{} is {}", addr, if up { "reachable" } else { "not reachable" });
        }
        Commands::Boot => {
            let mount = MountDevice::new(options, events::channel().0);
            mount.boot().await?;
            println!("magic packet sent");
        }
        Commands::Shutdown => {
            let mount = MountDevice::new(options, events::channel().0);
            if !mount.shutdown().await {
                return Err(anyhow!("mount did not accept the shutdown command"));
            }
            println!("mount is shutting down; wait about 20 seconds before cutting power");
        }
        Commands::Monitor { dome, clock, json } => {
            if options.host.is_none() {
                warn!("No mount host configured; monitor will only report unreachable");
            }
            let (sink, mut stream) = events::channel();
            let mut mount = MountDevice::new(options, sink);
            if dome {
                mount.start_dome();
            }
            if clock {
                mount.start_clock();
            }
            mount.start();
            info!("Monitoring mount, Ctrl-C to stop");

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            loop {
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    event = stream.recv() => {
                        let Some(event) = event else { break };
                        if json {
                            println!("{}", serde_json::to_string(&event)?);
                        } else {
                            info!("event {}", event.name());
                        }
                    }
                }
            }

            mount.stop().await;
            let stats = metrics::snapshot();
            info!(
                "exchanges ok={} failed={} ticks skipped={} gated={}",
                stats.exchanges_ok,
                stats.exchanges_failed(),
                stats.ticks_skipped_busy,
                stats.ticks_gated_offline
            );
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
