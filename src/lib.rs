pub mod cluster;
pub mod config;
pub mod context;
pub mod controller;
mod error;
pub mod hook;
pub mod publisher;
pub mod relation;
pub mod resolver;
pub mod signal;
pub mod status;
#[cfg(test)]
mod testing;
pub mod workload;

pub use error::{Error, Result};
