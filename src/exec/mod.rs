// src/exec/mod.rs

//! Process execution layer.
//!
//! This module turns declarative command specs into OS processes, using
//! `tokio::process` for the concurrent engine and `std::process` for the
//! sequential one.
//!
//! - [`split`] tokenizes command strings per platform.
//! - [`encoding`] decodes captured output.
//! - [`output`] resolves stdout/stderr targets into scoped OS handles.
//! - [`invocation`] spawns and waits on exactly one process.
//! - [`command`] runs one invocation or a serial chain of them.
//! - [`batch`] runs many Commands concurrently (or sequentially) and
//!   aggregates their failures.

pub mod batch;
pub mod command;
pub mod encoding;
pub mod invocation;
pub mod output;
pub mod split;

pub use batch::CommandBatch;
pub use command::{Command, CommandOptions, CommandSpec, CommandState};
pub use encoding::TextEncoding;
pub use invocation::{CaptureMode, Invocation, InvocationSpec};
pub use output::{NULL_DEVICE, OutputHandles, OutputTarget, STDOUT_REDIRECT};
pub use split::{ArgSplitter, PosixSplitter, WindowsSplitter, platform_splitter};
