//! Futures roll workflow: wire protocol and the client-side controller.

pub mod controller;
pub mod protocol;

pub use controller::{RollController, RollError, RollOutcome};
pub use protocol::{RollRecord, RollReport, RollTransitionResponse, ROLL_ADJUSTED};
