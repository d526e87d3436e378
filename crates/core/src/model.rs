#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Last-good state of a managed service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Created,
    Started,
    Stopped,
    Deleted,
}

impl ServiceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::Deleted => "DELETED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ParseEnumError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Ok(Self::Created),
            "STARTED" => Ok(Self::Started),
            "STOPPED" => Ok(Self::Stopped),
            "DELETED" => Ok(Self::Deleted),
            _ => Err(ParseEnumError {
                kind: "service state",
                value: raw.to_string(),
            }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobAction {
    Create,
    Update,
    Start,
    Stop,
    Delete,
}

impl JobAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ParseEnumError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "START" => Ok(Self::Start),
            "STOP" => Ok(Self::Stop),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ParseEnumError {
                kind: "job action",
                value: raw.to_string(),
            }),
        }
    }

    /// Lower is more urgent. Releasing capacity (stop/delete) goes first,
    /// reconfiguration last.
    pub fn default_priority(self) -> i64 {
        match self {
            Self::Stop | Self::Delete => 1,
            Self::Create | Self::Start => 2,
            Self::Update => 3,
        }
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending -> Claimed -> {Completed | Failed}. Never re-enters Pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Claimed,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Claimed => "CLAIMED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ParseEnumError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CLAIMED" => Ok(Self::Claimed),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ParseEnumError {
                kind: "job status",
                value: raw.to_string(),
            }),
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Claimed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connectivity of a remote executor. Independent of any job status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Connected,
    Disconnected,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ParseEnumError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CONNECTED" => Ok(Self::Connected),
            "DISCONNECTED" => Ok(Self::Disconnected),
            _ => Err(ParseEnumError {
                kind: "agent status",
                value: raw.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
