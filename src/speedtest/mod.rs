//! Measurement Client.
//!
//! [`engine::TestEngine`] drives one run against a measurement server:
//! identity, then download, upload and ping, one sub-request at a time.

pub mod cancel;
pub mod client;
pub mod download;
pub mod engine;
pub mod latency;
pub mod phase;
pub mod progress;
pub mod requests;
pub mod upload;
