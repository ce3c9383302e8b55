//! act-server
//!
//! Remote act service: accepts act requests over TCP, sends the
//! caller's message to the counterparty and answers with the correlated
//! replies.

pub mod config;
pub mod types;
pub mod session;
pub mod handlers;
pub mod security_list;
pub mod server;

// internal, not re-exported
mod client;
