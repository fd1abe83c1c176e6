//! Wire protocol for the control channel and the measured UDP path.
//!
//! This module houses constants, message definitions, encoding helpers and
//! the control-session state used by the session and transport layers.

pub mod constants;
pub mod packet;
pub mod state;
pub mod types;
