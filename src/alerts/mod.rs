//! Alert escalation
//!
//! Escalation policies, target notification, acknowledgement timeouts and the
//! pager state machine tying them together.

pub mod config;
pub mod notifier;
pub mod pager;
pub mod policy;
pub mod service;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    Alert, ConfigError, MonitoredServiceId, PolicyDefinition, PolicyFile, Recipient, Target,
    TargetKind, DEFAULT_ACK_TIMEOUT_MINUTES,
};
pub use notifier::{Channel, LogChannel, Notifier, NotifierError, TargetNotifier};
pub use pager::{Incident, Pager, PagerError, ServiceHealth};
pub use policy::{EscalationPolicy, Level};
pub use service::{PagerHandle, PagerService, ServiceError, ServiceStatus};
pub use timer::{Alertable, Expiry, TimeoutLedger, Timer, TokioTimer};
