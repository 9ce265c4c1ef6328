//! Scan orchestration
//!
//! ```text
//!            START (color)           last texture position
//!   Idle ─────────────────► Texture ───────────────────────► Object
//!    │  START (mono)                  (queue drained, LED off)   │
//!    └─────────────────────────────────────────────────────────►│
//!    ▲                                                           │ progress == total
//!    │               persisted, SCAN_COMPLETE                    ▼
//!    └─────────────────────────────────────────────────── Finalizing
//!
//!   STOP from any phase: pool killed, queue cleared, scan folder deleted, Idle
//! ```
//!
//! Each phase acquires positions `0..=N` where `N = 3200 / resolution`. The
//! wrap-around frame at position N repeats position 0 and carries no progress,
//! so the scan completes after `N × lasers` slots per phase.
//!
//! Threads:
//! - `scan-orchestrator`: owns hardware and session, see [`ScanOrchestrator`]
//! - `scan-worker-<generation>-<index>`: image processing, see [`WorkerPool`]

pub mod accumulator;
pub mod commands;
pub mod orchestrator;
pub mod queue;
pub mod session;
pub mod workers;

pub use accumulator::{RecordOutcome, ScanAccumulator};
pub use commands::{CommandReply, ScanCommand, ScanHandle, ScanStatus};
pub use orchestrator::{OrchestratorParts, OrchestratorThread, ScanOrchestrator};
pub use queue::TaskQueue;
pub use session::{ScanGeometry, ScanPhase, ScanSession};
pub use workers::WorkerPool;
