//! Commands accepted by the scan orchestrator and the client handle.
//!
//! Commands travel over an unbounded crossbeam channel. Each may carry a reply
//! sender; [`ScanHandle::request`] waits for the reply with a timeout.

use super::session::ScanPhase;
use crate::core::types::Frame;
use crate::error::{Error, Result};
use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Public scanner commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanCommand {
    Start,
    Stop,
    SettingsModeOn,
    SettingsModeOff,
    NotifyHardwareState,
    /// Deep-merge a JSON object into the runtime settings
    UpdateSettings(Value),
    GetHardwareInfo,
    GetCalibrationStream,
    GetLaserStream,
    GetTextureStream,
    StartCalibration,
    StopCalibration,
    NotifyIfNotCalibrated,
    Status,
    /// Cancel any scan and leave the command loop
    Shutdown,
}

/// Reply to a command sent with [`ScanHandle::request`]
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Ack,
    /// Firmware version, `None` when the board did not answer
    HardwareInfo(Option<String>),
    /// Preview frame, `None` when it was dropped
    StreamFrame(Option<Frame>),
    Status(ScanStatus),
}

/// Snapshot of the orchestrator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    pub scan_id: Option<String>,
    pub progress: u32,
    pub total: u32,
    pub position: u32,
    pub settings_mode: bool,
    pub calibrating: bool,
}

/// Command plus optional reply channel
pub(crate) struct Request {
    pub command: ScanCommand,
    pub reply: Option<Sender<CommandReply>>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .field("reply", &self.reply.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Client side of the orchestrator. Cheap to clone.
///
/// When every handle is dropped the orchestrator shuts down.
#[derive(Clone)]
pub struct ScanHandle {
    tx: Sender<Request>,
}

impl ScanHandle {
    pub(crate) fn new(tx: Sender<Request>) -> Self {
        Self { tx }
    }

    /// Fire-and-forget
    pub fn send(&self, command: ScanCommand) -> Result<()> {
        self.tx
            .send(Request {
                command,
                reply: None,
            })
            .map_err(|_| Error::ChannelClosed("scan orchestrator"))
    }

    /// Send a command and wait for its reply
    pub fn request(&self, command: ScanCommand, timeout: Duration) -> Result<CommandReply> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Request {
                command,
                reply: Some(reply_tx),
            })
            .map_err(|_| Error::ChannelClosed("scan orchestrator"))?;

        reply_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => Error::Timeout,
            RecvTimeoutError::Disconnected => Error::ChannelClosed("scan orchestrator reply"),
        })
    }

    pub fn start(&self) -> Result<()> {
        self.send(ScanCommand::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(ScanCommand::Stop)
    }

    pub fn status(&self, timeout: Duration) -> Result<ScanStatus> {
        match self.request(ScanCommand::Status, timeout)? {
            CommandReply::Status(status) => Ok(status),
            other => Err(Error::Other(format!("unexpected reply: {:?}", other))),
        }
    }

    pub fn hardware_info(&self, timeout: Duration) -> Result<Option<String>> {
        match self.request(ScanCommand::GetHardwareInfo, timeout)? {
            CommandReply::HardwareInfo(version) => Ok(version),
            other => Err(Error::Other(format!("unexpected reply: {:?}", other))),
        }
    }

    /// Request one preview frame; `command` must be one of the stream commands
    pub fn stream_frame(&self, command: ScanCommand, timeout: Duration) -> Result<Option<Frame>> {
        match self.request(command, timeout)? {
            CommandReply::StreamFrame(frame) => Ok(frame),
            other => Err(Error::Other(format!("unexpected reply: {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_wire_names() {
        let value = serde_json::to_value(ScanCommand::NotifyIfNotCalibrated).unwrap();
        assert_eq!(value["command"], "NOTIFY_IF_NOT_CALIBRATED");

        let update: ScanCommand = serde_json::from_value(json!({
            "command": "UPDATE_SETTINGS",
            "payload": {"resolution": 100}
        }))
        .unwrap();
        assert_eq!(update, ScanCommand::UpdateSettings(json!({"resolution": 100})));
    }

    #[test]
    fn test_request_reply() {
        let (tx, rx) = crossbeam_channel::unbounded::<Request>();
        let handle = ScanHandle::new(tx);

        let responder = thread::spawn(move || {
            let request = rx.recv().unwrap();
            assert_eq!(request.command, ScanCommand::GetHardwareInfo);
            request
                .reply
                .unwrap()
                .send(CommandReply::HardwareInfo(Some("v1".to_string())))
                .unwrap();
        });

        let version = handle.hardware_info(Duration::from_secs(1)).unwrap();
        assert_eq!(version.as_deref(), Some("v1"));
        responder.join().unwrap();
    }

    #[test]
    fn test_request_timeout_and_closed() {
        let (tx, rx) = crossbeam_channel::unbounded::<Request>();
        let handle = ScanHandle::new(tx);
        assert!(matches!(
            handle.request(ScanCommand::Status, Duration::from_millis(10)),
            Err(Error::Timeout)
        ));

        drop(rx);
        assert!(matches!(
            handle.send(ScanCommand::Start),
            Err(Error::ChannelClosed(_))
        ));
    }
}
