#![doc = include_str!("../README.md")]

mod common;
pub mod pool;
pub mod telemetry;

pub use common::*;
