//! # wabridge-channels
//!
//! Messaging session adapters and pairing utilities.

pub mod qr;
pub mod whatsapp;
