//! Core abstractions for the scanner collaborators.
//!
//! - [`driver::HardwareController`]: Trait to implement for new scanner hardware
//! - [`services`]: Image processing, calibration, settings, storage and event sinks
//! - [`types`]: Frames, tasks, points and completion events

pub mod driver;
pub mod services;
pub mod types;
