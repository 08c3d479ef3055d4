//! Terminal presentation layer for the measurement client.
//!
//! Renders phase, unified progress, live speed and the final result, and
//! provides the start/stop/reset controls.

pub mod controller;
pub mod display_mode;
pub mod renderer;
pub mod state;

pub use controller::TuiController;
pub use display_mode::DisplayMode;
