#[macro_use]
pub mod common;

pub mod budget;
pub mod config;
pub mod energy;
pub mod engine;
pub mod messages;
pub mod pool;
pub mod registry;

#[cfg(test)]
mod tests;

pub use common::{Map, Set};

/// Job identifiers are owned by the simulator and treated as opaque.
pub type JobId = String;

pub type Error = common::error::JouleError;
pub type Result<T> = std::result::Result<T, Error>;
