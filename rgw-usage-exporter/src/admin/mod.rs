//! Signed HTTPS client for the RGW administrative API.

pub mod client;
pub mod signing;
pub mod types;

pub use client::AdminClient;
