//! opsdash - operations dashboard status client.
//!
//! Polls the trading server's JSON status resources, derives traffic-light
//! severity, and drives the futures roll workflow. Exposes core modules
//! for use by binaries and tests.

pub mod client;
pub mod config;
pub mod demo;
pub mod error;
pub mod render;
pub mod rolls;
pub mod status;
