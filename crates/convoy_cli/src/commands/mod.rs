//! CLI command implementations.

pub mod logs;
pub mod remote;
pub mod serve;
