//! Authenticated HTTP control plane for sending SMS/MMS from a device, plus
//! a fire-and-forget webhook notifier for inbound messages.

pub mod attachments;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod receiver;
pub mod segment;
pub mod server;
pub mod transmitter;
pub mod types;
pub mod webhook;
