//! Alert, target and policy-file configuration types

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::policy::{EscalationPolicy, Level};

/// Identifier of a monitored service
pub type MonitoredServiceId = String;

/// Address of a notification destination (email address or phone number)
pub type Recipient = String;

/// Default acknowledgement window in minutes
pub const DEFAULT_ACK_TIMEOUT_MINUTES: u64 = 15;

/// Alert raised for a monitored service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    monitored_service_id: MonitoredServiceId,
    message: String,
}

impl Alert {
    pub fn new(monitored_service_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            monitored_service_id: monitored_service_id.into(),
            message: message.into(),
        }
    }

    pub fn monitored_service_id(&self) -> &str {
        &self.monitored_service_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Channel a target is reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Email,
    Sms,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Email => write!(f, "Email"),
            TargetKind::Sms => write!(f, "Sms"),
        }
    }
}

/// Notification target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    kind: TargetKind,
    recipient: Recipient,
}

impl Target {
    pub fn new(kind: TargetKind, recipient: impl Into<String>) -> Self {
        Self {
            kind,
            recipient: recipient.into(),
        }
    }

    /// Email target addressed to `address`
    pub fn email(address: impl Into<String>) -> Self {
        Self::new(TargetKind::Email, address)
    }

    /// SMS target addressed to `phone_number`
    pub fn sms(phone_number: impl Into<String>) -> Self {
        Self::new(TargetKind::Sms, phone_number)
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }
}

/// On-disk policy file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFile {
    /// Acknowledgement window before escalating to the next level
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_minutes: u64,
    /// Escalation policies, one per monitored service
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
}

/// Escalation policy as written in the policy file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub monitored_service_id: MonitoredServiceId,
    #[serde(default)]
    pub levels: Vec<Vec<Target>>,
}

impl PolicyDefinition {
    /// Build a fresh policy with its cursor at the first level
    pub fn to_policy(&self) -> EscalationPolicy {
        let levels = self.levels.iter().cloned().map(Level::new).collect();
        EscalationPolicy::with_levels(self.monitored_service_id.clone(), levels)
    }
}

impl PolicyFile {
    /// Parse a policy file from JSON text
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a policy file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Materialize the escalation policies in file order
    pub fn policies(&self) -> Vec<EscalationPolicy> {
        self.policies.iter().map(PolicyDefinition::to_policy).collect()
    }
}

impl Default for PolicyFile {
    fn default() -> Self {
        Self {
            ack_timeout_minutes: DEFAULT_ACK_TIMEOUT_MINUTES,
            policies: Vec::new(),
        }
    }
}

fn default_ack_timeout() -> u64 {
    DEFAULT_ACK_TIMEOUT_MINUTES
}

/// Policy file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read policy file: {0}")]
    Io(String),

    #[error("Invalid policy file: {0}")]
    Parse(String),
}
