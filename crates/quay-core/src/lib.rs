//! Core systems for Quay.
//!
//! This crate provides the foundational pieces shared by Quay's networking
//! crates:
//!
//! - **Signal/Slot System**: Type-safe event notification ([`Signal`])
//! - **Logging**: `tracing` targets and span names ([`logging`])
//!
//! # Signal Example
//!
//! ```
//! use quay_core::Signal;
//!
//! let dropped = Signal::<usize>::new();
//!
//! let conn_id = dropped.connect(|size| {
//!     println!("dropped a {size}-byte datagram");
//! });
//!
//! dropped.emit(1200);
//! dropped.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use signal::{ConnectionId, Signal};
