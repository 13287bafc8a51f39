//! Structured logging for the `dbe-item` binary.
//!
//! # Logging invariants
//!
//! - **No attribute values or key material** may appear in any log field.
//!   Attribute names, counts and provider ids are fine.
//! - Log level is configurable via `DBE_LOG_LEVEL` (default: `info`) and
//!   overridden by `RUST_LOG` when set.
//! - Logs go to stderr; stdout carries only response lines.

pub mod init;

pub use init::init_telemetry;
