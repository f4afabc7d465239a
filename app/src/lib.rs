//! Headless stream watcher daemon.
//!
//! Wires the platform clients and [`watch_core::WatchService`] to a SQLite
//! store, an axum HTTP + WebSocket server and a WebSocket notification sink.

pub mod app;
pub mod background;
pub mod bootstrap;
pub mod config;
pub mod server;
pub mod services;
pub mod shutdown;

pub use bootstrap::init_foundation;

#[cfg(test)]
mod test_support;
