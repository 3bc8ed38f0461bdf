//! # Mountlink - Client and Polling Engine for 10micron Mount Computers
//!
//! Mountlink talks to a telescope mount computer over its TCP ASCII command port. The
//! protocol has no length framing, so every command is classified up front by the shape
//! of its reply, and every exchange uses a fresh, deadline-bounded connection.
//!
//! ## Features
//!
//! - **Command Classification**: closed vocabulary with per-command reply shapes
//! - **Transport**: one socket per exchange with a typed failure taxonomy
//! - **Polling Engine**: independent cycles per subsystem on a bounded worker pool,
//!   gated by a reachability monitor
//! - **Events**: typed notifications for state updates, slew completion, alerts and
//!   trajectory upload progress
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mountlink::config::Config;
//! use mountlink::events;
//! use mountlink::mount::MountDevice;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("mountlink.toml").await?;
//!     let (sink, mut stream) = events::channel();
//!     let mut mount = MountDevice::new(config.mount_options(), sink);
//!     mount.start();
//!     while let Some(event) = stream.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`protocol`] - command vocabulary and reply shape classification
//! - [`transport`] - connection per exchange, raw exchanges, socket teardown
//! - [`poll`] - cyclic poll dispatcher
//! - [`worker`] - shared bounded worker pool
//! - [`mount`] - subsystem states, slew monitor, trajectory upload, firmware query and the
//!   device facade
//! - [`events`] - published notifications
//! - [`config`] - TOML configuration
//! - [`metrics`] - process-wide counters

pub mod config;
pub mod events;
pub mod logutil;
pub mod metrics;
pub mod mount;
pub mod poll;
pub mod protocol;
pub mod transport;
pub mod worker;
