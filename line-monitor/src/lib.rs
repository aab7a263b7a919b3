//! Real-time line monitor.
//!
//! Tracks which station each carrier on a treatment line occupies, how long
//! until it is due out, and when it leaves the line. State arrives over a
//! websocket push channel, with a polling fallback that keeps the view
//! bounded-stale when the channel is down.

pub mod cache;
pub mod config;
pub mod domain;
pub mod forecast;
pub mod poller;
pub mod router;
pub mod store;
pub mod stream;
pub mod web;
