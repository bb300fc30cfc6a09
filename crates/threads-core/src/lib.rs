//! Core domain logic for the threads tracker.

pub mod config;
pub mod criteria;
pub mod delete;
pub mod merge;
pub mod model;
pub mod ops;
pub mod resolve;
pub mod score;
pub mod store;
pub mod tree;
pub mod views;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
