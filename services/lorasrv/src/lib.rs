//! LoRa sensor-network master station
//!
//! Coordinates a fixed roster of remote sensor nodes over a shared,
//! half-duplex, lossy radio channel: polls each node in round-robin order,
//! retries on timeout with a bounded budget, and relays a one-shot alert
//! broadcast to all nodes when any reply carries the alert flag.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌───────────────┐    ┌───────────────┐
//! │ ServiceConfig│───►│  PollEngine   │───►│  ChannelLink  │
//! │ (YAML + env) │    │ (round robin, │    │ (serial modem │
//! └──────────────┘    │  retry budget)│    │  or simulator)│
//!                     └──────┬────────┘    └───────────────┘
//!                            │ accepted telemetry / timeouts
//!                            ▼
//!                     ┌───────────────┐    ┌───────────────┐
//!                     │     Sinks     │    │AlertDispatcher│
//!                     │ (console, CSV)│    │ (one-shot     │
//!                     └───────────────┘    │  broadcast)   │
//!                                          └───────────────┘
//! ```
//!
//! The engine is synchronous and deterministic; the runtime drives it from
//! a single cooperative loop, so all protocol state is touched from one
//! task and needs no locking.

pub mod alert;
pub mod channel;
pub mod config;
pub mod error;
pub mod poll;
pub mod registry;
pub mod runtime;
pub mod sink;

pub use config::ServiceConfig;
pub use error::{LoraSrvError, Result};
pub use poll::{PollEngine, PollPolicy, PollStats};
