//! Drishti - scan orchestration for turntable laser 3D scanners
//!
//! Sequences the turntable, lasers, LED ring and camera, farms frames out to a
//! pool of image processing workers and accumulates their output into a
//! colored point cloud.
//!
//! ## Modules
//!
//! - [`scan`]: orchestrator state machine, task queue, workers, accumulator
//! - [`core`]: collaborator traits and shared data types
//! - [`devices`]: device factory and the mock scanner
//! - [`events`]: client notices and the in-process event bus
//! - [`settings`], [`storage`], [`config`]: runtime settings, scan artifacts,
//!   daemon configuration

pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod events;
pub mod scan;
pub mod settings;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use events::{BusEvent, EventBus};
pub use scan::{OrchestratorParts, ScanCommand, ScanHandle, ScanOrchestrator};
