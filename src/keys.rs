//! Store key layout.
//!
//! The three keys below are bit-stable: external tooling reads them directly,
//! so changing a name or the shape of the value it holds is a breaking change.

/// Pending index: ZSET of snapshot JSON members scored by `execute_time`.
pub const PENDING_KEY: &str = "ddq:tasks";

/// Running table: HASH of task id -> lease record JSON.
pub const RUNNING_KEY: &str = "ddq:running";

/// Dead-letter log: LIST of snapshot JSON, most recent burial at the head.
pub const DLQ_KEY: &str = "ddq:dlq";
