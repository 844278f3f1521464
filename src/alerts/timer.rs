//! Acknowledgement timeouts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::Alert;
use super::pager::PagerError;

/// Something that reacts to alerts; expired timeouts are delivered here
pub trait Alertable {
    fn receive(&mut self, alert: Alert) -> Result<(), PagerError>;
}

/// Schedules re-delivery of an alert to the alertable that owns the timer
pub trait Timer: Send {
    /// Re-deliver `alert` after `minutes`
    fn add_timeout(&self, alert: Alert, minutes: u64);

    /// Cancel every pending timeout for the service. No-op when none is pending.
    fn remove_timeout(&self, monitored_service_id: &str);
}

/// Expired timeout posted to the mailbox of a [`TokioTimer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub alert: Alert,
    generation: u64,
}

#[derive(Default)]
struct ServiceTimeouts {
    /// Bumped on every cancellation
    generation: u64,
    handles: Vec<JoinHandle<()>>,
}

/// Shared record of armed timeouts.
///
/// An expiry can already sit in the mailbox when its timeout is cancelled, so
/// the consumer checks [`TimeoutLedger::is_current`] before acting on it.
#[derive(Clone, Default)]
pub struct TimeoutLedger {
    services: Arc<Mutex<HashMap<String, ServiceTimeouts>>>,
}

impl TimeoutLedger {
    /// False once the service's timeouts were cancelled after this expiry was armed
    pub fn is_current(&self, expiry: &Expiry) -> bool {
        self.services
            .lock()
            .get(expiry.alert.monitored_service_id())
            .map(|s| s.generation == expiry.generation)
            .unwrap_or(false)
    }
}

/// Timer backed by tokio tasks.
///
/// Each timeout is a task that sleeps and then posts an [`Expiry`] into
/// `mailbox`; whoever drains the mailbox feeds live expiries back into the
/// alertable.
pub struct TokioTimer {
    mailbox: mpsc::UnboundedSender<Expiry>,
    minute: Duration,
    ledger: TimeoutLedger,
}

impl TokioTimer {
    pub fn new(mailbox: mpsc::UnboundedSender<Expiry>) -> Self {
        Self {
            mailbox,
            minute: Duration::from_secs(60),
            ledger: TimeoutLedger::default(),
        }
    }

    /// Ledger the mailbox consumer uses to discard cancelled expiries
    pub fn ledger(&self) -> TimeoutLedger {
        self.ledger.clone()
    }

    /// Number of timeouts still waiting to fire for a service
    pub fn pending(&self, monitored_service_id: &str) -> usize {
        self.ledger
            .services
            .lock()
            .get(monitored_service_id)
            .map(|s| s.handles.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

impl Timer for TokioTimer {
    fn add_timeout(&self, alert: Alert, minutes: u64) {
        let delay = self.minute.saturating_mul(minutes.min(u32::MAX as u64) as u32);
        let service_id = alert.monitored_service_id().to_string();
        let mailbox = self.mailbox.clone();

        let mut services = self.ledger.services.lock();
        let timeouts = services.entry(service_id).or_default();
        let expiry = Expiry {
            alert,
            generation: timeouts.generation,
        };

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(
                service_id = %expiry.alert.monitored_service_id(),
                "Acknowledgement timeout expired"
            );
            if mailbox.send(expiry).is_err() {
                tracing::debug!("Timeout mailbox closed, dropping expired alert");
            }
        });

        timeouts.handles.retain(|h| !h.is_finished());
        timeouts.handles.push(handle);
    }

    fn remove_timeout(&self, monitored_service_id: &str) {
        let mut services = self.ledger.services.lock();
        let Some(timeouts) = services.get_mut(monitored_service_id) else {
            return;
        };

        timeouts.generation = timeouts.generation.wrapping_add(1);
        let cancelled = timeouts.handles.iter().filter(|h| !h.is_finished()).count();
        for handle in timeouts.handles.drain(..) {
            handle.abort();
        }
        if cancelled > 0 {
            tracing::debug!(
                service_id = %monitored_service_id,
                cancelled,
                "Cancelled acknowledgement timeouts"
            );
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for timeouts in self.ledger.services.lock().values() {
            for handle in &timeouts.handles {
                handle.abort();
            }
        }
    }
}
