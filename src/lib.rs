pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod logging;

#[cfg(test)]
mod integration_tests;

pub use error::*;
pub use models::*;
