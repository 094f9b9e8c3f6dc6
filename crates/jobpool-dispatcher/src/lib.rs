#![doc = include_str!("../README.md")]

pub mod connection;
pub mod dispatcher;
pub mod metrics;
pub mod server;

#[cfg(test)]
mod testing;
