//! Configuration and logging shared by the binaries of this workspace.

pub mod config;
pub mod logging;

pub use config::*;
