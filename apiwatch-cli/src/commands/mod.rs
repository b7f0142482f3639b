//! CLI command implementations.

pub mod check_config;
pub mod fetch;
pub mod quota;
pub mod run;
