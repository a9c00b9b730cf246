//! convertd - File conversion queue and worker pool
//!
//! This library crate exposes the queue, executors and HTTP surface so they
//! can be driven from integration tests.

pub mod clock;
pub mod config;
pub mod executor;
pub mod queue;
pub mod server;
