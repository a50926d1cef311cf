//! Sandbox Executor: stages a writ's source, input, and run script
//! into a scratch directory and executes it inside a locked-down Docker
//! container via `bollard`.

mod docker;
mod scratch;

pub use docker::{Sandbox, SandboxConfig, SandboxOutcome};
pub use scratch::ScratchDir;
