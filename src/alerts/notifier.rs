//! Notification dispatch for escalation targets

use std::collections::HashMap;
use std::sync::Arc;

use super::config::{Target, TargetKind};

/// Delivery channel for one kind of target (mail, SMS, ...).
///
/// Delivery failures stay inside the channel; the pager treats a call as sent.
pub trait Channel: Send + Sync {
    fn notify(&self, recipient: &str);
}

/// Channel that records deliveries to tracing instead of sending them
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: &'static str,
}

impl LogChannel {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn mail() -> Self {
        Self::new("mail")
    }

    pub fn sms() -> Self {
        Self::new("sms")
    }
}

impl Channel for LogChannel {
    fn notify(&self, recipient: &str) {
        tracing::warn!(
            channel = self.name,
            recipient = %recipient,
            "Page sent"
        );
    }
}

/// Dispatches a target to the channel matching its kind
pub trait Notifier: Send {
    fn notify(&self, target: &Target) -> Result<(), NotifierError>;
}

/// Notifier backed by a dispatch table keyed by [`TargetKind`]
#[derive(Clone, Default)]
pub struct TargetNotifier {
    channels: HashMap<TargetKind, Arc<dyn Channel>>,
}

impl TargetNotifier {
    /// Notifier covering every target kind
    pub fn new(mail: Arc<dyn Channel>, sms: Arc<dyn Channel>) -> Self {
        Self::empty()
            .with_channel(TargetKind::Email, mail)
            .with_channel(TargetKind::Sms, sms)
    }

    /// Notifier with no registered channels
    pub fn empty() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register (or replace) the channel used for `kind`
    pub fn with_channel(mut self, kind: TargetKind, channel: Arc<dyn Channel>) -> Self {
        self.channels.insert(kind, channel);
        self
    }
}

impl Notifier for TargetNotifier {
    fn notify(&self, target: &Target) -> Result<(), NotifierError> {
        let channel = self
            .channels
            .get(&target.kind())
            .ok_or(NotifierError::UnsupportedTarget(target.kind()))?;

        tracing::debug!(
            kind = %target.kind(),
            recipient = %target.recipient(),
            "Dispatching notification"
        );
        channel.notify(target.recipient());
        Ok(())
    }
}

/// Notifier errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifierError {
    #[error("Cannot notify, unsupported Target type [{0}]")]
    UnsupportedTarget(TargetKind),
}
