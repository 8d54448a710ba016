//! # wabridge-core
//!
//! Core types, traits, configuration, and error handling for the bridge.

pub mod config;
pub mod error;
pub mod message;
pub mod number;
pub mod traits;
