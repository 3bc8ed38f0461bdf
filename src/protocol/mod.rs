//! # Command Classification
//!
//! The mount protocol carries no length header: a reply is plain ASCII and the client has
//! to know up front how much data each command produces. Every command therefore belongs
//! to one of three response classes:
//!
//! - **None**: the mount answers nothing (`:U2#`, `:Q#`, `:Me#` ...)
//! - **Ack**: the mount answers with bare characters and no `#` end mark, mostly `0`/`1`
//! - **Chunk**: the mount answers with one `#`-terminated segment
//!
//! Classes are matched by prefix against the class tables themselves, so `:SaXa+45.0`
//! is an ack setter like `:Sa`; only the bare `:Q` is a quit, `:QaXa` answers a chunk.
//!
//! A batch of concatenated commands is summarised as a [`BatchShape`]: the number of
//! chunks to wait for and the minimum number of bytes the ack-style replies add.
//!
//! ```rust
//! use mountlink::protocol::{classify, BatchShape};
//!
//! let shape = classify(":U2#:GTsid#:Ga#:Gz#:Gr#:Gd#:QaXa#:QaXb#");
//! assert_eq!(shape, BatchShape { chunks_to_receive: 6, must_wait: true, min_bytes: 1 });
//! ```

mod commands;

use std::ops::Add;
use std::sync::OnceLock;

pub use commands::{ACK_ONLY, KNOWN_COMMANDS, NO_REPLY};

/// Response class of a single command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// No reply at all
    None,
    /// Reply without `#` end mark; counts towards `min_bytes`
    Ack,
    /// One `#`-terminated reply segment
    Chunk,
}

/// Expected reply shape of a command batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchShape {
    pub chunks_to_receive: usize,
    pub must_wait: bool,
    pub min_bytes: usize,
}

impl BatchShape {
    fn from_counts(chunks_to_receive: usize, min_bytes: usize) -> Self {
        Self {
            chunks_to_receive,
            must_wait: chunks_to_receive > 0 || min_bytes > 0,
            min_bytes,
        }
    }

    fn of_kind(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::None => Self::default(),
            ResponseKind::Ack => Self::from_counts(0, 1),
            ResponseKind::Chunk => Self::from_counts(1, 0),
        }
    }
}

impl Add for BatchShape {
    type Output = BatchShape;

    fn add(self, rhs: BatchShape) -> BatchShape {
        BatchShape::from_counts(
            self.chunks_to_receive + rhs.chunks_to_receive,
            self.min_bytes + rhs.min_bytes,
        )
    }
}

/// Known command names, longest first so that `:QaXa` is tried before `:Q`.
fn vocabulary() -> &'static [&'static str] {
    static SORTED: OnceLock<Vec<&'static str>> = OnceLock::new();
    SORTED.get_or_init(|| {
        let mut names: Vec<&'static str> = KNOWN_COMMANDS.to_vec();
        names.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        names.dedup();
        names
    })
}

/// Split a batch into its command tokens (without the trailing `#`).
///
/// Text after the last `#` is not a complete command and is ignored.
pub fn tokens(batch: &str) -> impl Iterator<Item = &str> {
    batch
        .rfind('#')
        .map(|end| &batch[..end])
        .into_iter()
        .flat_map(|complete| complete.split('#'))
}

/// Canonical name of a single token, if it belongs to the vocabulary.
pub fn canonical_name(token: &str) -> Option<&'static str> {
    let token = token.strip_suffix('#').unwrap_or(token);
    vocabulary()
        .iter()
        .copied()
        .find(|name| token.starts_with(name))
}

/// Response class of a single token; anything unrecognised waits for a chunk.
///
/// Classes match by prefix against their own tables, no-reply first, so parameterised
/// setters such as `:SaXa+45.0` answer like `:Sa`. `:Q` only covers the bare quit command.
pub fn response_kind(token: &str) -> ResponseKind {
    let token = token.strip_suffix('#').unwrap_or(token);
    if in_class(NO_REPLY, token) {
        ResponseKind::None
    } else if in_class(ACK_ONLY, token) {
        ResponseKind::Ack
    } else {
        ResponseKind::Chunk
    }
}

fn in_class(class: &[&str], token: &str) -> bool {
    class.iter().any(|&name| match name {
        ":Q" => token == name,
        _ => token.starts_with(name),
    })
}

/// Derive the expected reply shape of a command batch.
pub fn classify(batch: &str) -> BatchShape {
    tokens(batch)
        .map(|token| BatchShape::of_kind(response_kind(token)))
        .fold(BatchShape::default(), Add::add)
}

/// True if the token starts with a known command name.
pub fn valid_command(token: &str) -> bool {
    canonical_name(token).is_some()
}

/// True if every token of the batch is a known command.
pub fn valid_command_set(batch: &str) -> bool {
    tokens(batch).all(valid_command)
}
