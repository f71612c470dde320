//! Ambient helpers shared by the workspace: logging setup, instance address
//! resolution and small response types.

pub mod env;
pub mod types;
pub mod utils;
