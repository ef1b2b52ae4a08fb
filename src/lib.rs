//! ddq - distributed delay queue broker.
//!
//! Clients submit tasks tagged with a future execution time; workers fetch
//! tasks whose time has arrived and acknowledge success or failure. The
//! broker guarantees at-least-once delivery, bounded retry with escalation
//! to a dead-letter list, and crash recovery through a visibility-timeout
//! watchdog. Every lifecycle transition is a single server-side atomic
//! script, so the host code holds no locks on task state.

pub mod codec;
pub mod gateway;
pub mod keys;
pub mod scripts;
pub mod server;
pub mod settings;
pub mod store;
pub mod task;
pub mod trace;
pub mod watchdog;

/// Generated protobuf/tonic types for the submission surface.
pub mod pb {
    tonic::include_proto!("ddq.v1");
}

pub use ddq_macros::test;
