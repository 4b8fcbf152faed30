//! Stage building blocks used by [`crate::convert::ConversionPipeline`].
//!
//! ## Data Flow
//!
//! ```text
//! tool dir ──▶ locate ──▶ process ──▶ StageResult
//! (archives)  (argv)     (spawn+wait)
//! ```
//!
//! 1. [`locate`]  — enumerate converter archives and build the command line
//! 2. [`process`] — spawn a program, drain its output, enforce the timeout
//! 3. [`command`] — argv-template collaborators (thumbnails, rendering,
//!    manifest) that run through the same [`process::ProcessRunner`]

pub mod command;
pub mod locate;
pub mod process;
