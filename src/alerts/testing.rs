//! Recording doubles shared by the alerts tests

use std::sync::Arc;

use parking_lot::Mutex;

use super::config::Alert;
use super::notifier::Channel;
use super::timer::Timer;

/// Channel that remembers every recipient it was asked to notify
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl Channel for RecordingChannel {
    fn notify(&self, recipient: &str) {
        self.sent.lock().push(recipient.to_string());
    }
}

/// Timer that only records calls; tests fire timeouts by hand
#[derive(Debug, Clone, Default)]
pub struct RecordingTimer {
    added: Arc<Mutex<Vec<(Alert, u64)>>>,
    removed: Arc<Mutex<Vec<String>>>,
}

impl RecordingTimer {
    pub fn added(&self) -> Vec<(Alert, u64)> {
        self.added.lock().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }
}

impl Timer for RecordingTimer {
    fn add_timeout(&self, alert: Alert, minutes: u64) {
        self.added.lock().push((alert, minutes));
    }

    fn remove_timeout(&self, monitored_service_id: &str) {
        self.removed.lock().push(monitored_service_id.to_string());
    }
}
