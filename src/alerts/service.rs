//! Serialized execution context for a pager
//!
//! The pager is not thread-safe by itself. [`PagerService`] moves it onto a
//! single tokio task; callers talk to it through a cloneable [`PagerHandle`]
//! and expired acknowledgement timeouts are posted to the same task, so every
//! mutation runs one at a time.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::config::{Alert, MonitoredServiceId, Recipient};
use super::notifier::Notifier;
use super::pager::{Pager, PagerError, ServiceHealth};
use super::policy::EscalationPolicy;
use super::timer::{Alertable, Expiry, TimeoutLedger, TokioTimer};

const COMMAND_BUFFER: usize = 256;

/// Snapshot of a service's health
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub monitored_service_id: MonitoredServiceId,
    pub health: ServiceHealth,
    pub notified: Vec<Recipient>,
    pub opened_at_ms: Option<i64>,
}

enum Command {
    Receive {
        alert: Alert,
        reply: oneshot::Sender<Result<(), PagerError>>,
    },
    MarkHealthy {
        monitored_service_id: MonitoredServiceId,
        reply: oneshot::Sender<Result<(), PagerError>>,
    },
    MarkUnhealthy {
        monitored_service_id: MonitoredServiceId,
        reply: oneshot::Sender<()>,
    },
    Status {
        monitored_service_id: MonitoredServiceId,
        reply: oneshot::Sender<ServiceStatus>,
    },
    UnhealthyServices {
        reply: oneshot::Sender<Vec<MonitoredServiceId>>,
    },
}

/// Owns a pager wired to a [`TokioTimer`] and the mailbox that timer feeds
pub struct PagerService {
    pager: Pager,
    timeouts: mpsc::UnboundedReceiver<Expiry>,
    ledger: TimeoutLedger,
}

impl PagerService {
    pub fn new(
        notifier: impl Notifier + 'static,
        policies: Vec<EscalationPolicy>,
        ack_timeout_minutes: u64,
    ) -> Self {
        let (timeout_tx, timeouts) = mpsc::unbounded_channel();
        let timer = TokioTimer::new(timeout_tx);
        let ledger = timer.ledger();
        let mut pager = Pager::with_ack_timeout(notifier, timer, ack_timeout_minutes);
        for policy in policies {
            pager.add_escalation_policy(policy);
        }
        Self {
            pager,
            timeouts,
            ledger,
        }
    }

    /// Spawn the service loop. It runs until every handle has been dropped.
    pub fn start(self) -> (PagerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = tokio::spawn(self.run(rx));
        (PagerHandle { tx }, handle)
    }

    async fn run(self, mut commands: mpsc::Receiver<Command>) {
        let Self {
            mut pager,
            mut timeouts,
            ledger,
        } = self;

        tracing::info!(
            policies = pager.policy_count(),
            ack_timeout_minutes = pager.ack_timeout_minutes(),
            "Pager service started"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => dispatch(&mut pager, command),
                    None => break,
                },
                Some(expiry) = timeouts.recv() => handle_expiry(&mut pager, &ledger, expiry),
            }
        }

        tracing::info!("Pager service stopped");
    }
}

/// Re-deliver an expired timeout unless it was cancelled while queued
fn handle_expiry(pager: &mut Pager, ledger: &TimeoutLedger, expiry: Expiry) {
    let service_id = expiry.alert.monitored_service_id().to_string();
    if !ledger.is_current(&expiry) {
        tracing::debug!(
            service_id = %service_id,
            "Dropping acknowledgement timeout cancelled while queued"
        );
        return;
    }

    if let Err(e) = Alertable::receive(pager, expiry.alert) {
        tracing::error!(
            service_id = %service_id,
            error = %e,
            "Failed to escalate after acknowledgement timeout"
        );
    }
}

fn dispatch(pager: &mut Pager, command: Command) {
    // A dropped reply receiver only means the caller stopped waiting
    match command {
        Command::Receive { alert, reply } => {
            let _ = reply.send(pager.receive(alert));
        }
        Command::MarkHealthy {
            monitored_service_id,
            reply,
        } => {
            let _ = reply.send(pager.mark_as_healthy(&monitored_service_id));
        }
        Command::MarkUnhealthy {
            monitored_service_id,
            reply,
        } => {
            pager.mark_as_unhealthy(&monitored_service_id);
            let _ = reply.send(());
        }
        Command::Status {
            monitored_service_id,
            reply,
        } => {
            let incident = pager.incident(&monitored_service_id);
            let status = ServiceStatus {
                health: pager.health(&monitored_service_id),
                notified: incident.map(|i| i.notified.clone()).unwrap_or_default(),
                opened_at_ms: incident.map(|i| i.opened_at_ms),
                monitored_service_id,
            };
            let _ = reply.send(status);
        }
        Command::UnhealthyServices { reply } => {
            let _ = reply.send(pager.unhealthy_services());
        }
    }
}

/// Cloneable front door to a running [`PagerService`]
#[derive(Clone)]
pub struct PagerHandle {
    tx: mpsc::Sender<Command>,
}

impl PagerHandle {
    pub async fn receive(&self, alert: Alert) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Receive { alert, reply }).await?;
        Ok(rx.await.map_err(|_| ServiceError::Closed)??)
    }

    pub async fn mark_as_healthy(
        &self,
        monitored_service_id: impl Into<String>,
    ) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::MarkHealthy {
            monitored_service_id: monitored_service_id.into(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| ServiceError::Closed)??)
    }

    pub async fn mark_as_unhealthy(
        &self,
        monitored_service_id: impl Into<String>,
    ) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::MarkUnhealthy {
            monitored_service_id: monitored_service_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn status(
        &self,
        monitored_service_id: impl Into<String>,
    ) -> Result<ServiceStatus, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status {
            monitored_service_id: monitored_service_id.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn is_service_unhealthy(
        &self,
        monitored_service_id: impl Into<String>,
    ) -> Result<bool, ServiceError> {
        let status = self.status(monitored_service_id).await?;
        Ok(status.health == ServiceHealth::Unhealthy)
    }

    pub async fn unhealthy_services(&self) -> Result<Vec<MonitoredServiceId>, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::UnhealthyServices { reply }).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.tx.send(command).await.map_err(|_| ServiceError::Closed)
    }
}

/// Errors returned through a [`PagerHandle`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Pager(#[from] PagerError),

    #[error("Pager service is not running")]
    Closed,
}
