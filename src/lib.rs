//! Pager: Alert Escalation Service
//!
//! Tracks the health of monitored services and, when an alert arrives, pages
//! the levels of the service's escalation policy one after another until
//! somebody acknowledges the incident.
//!
//! # Features
//!
//! - **Escalation Policies**: Ordered levels of email and SMS targets per service
//! - **Deduplication**: A recipient is paged at most once per open incident
//! - **Acknowledgement Timeouts**: Unacknowledged alerts escalate after 15 minutes
//! - **Serialized Execution**: Timeouts and API calls share one pager task
//! - **HTTP API**: Alert intake, acknowledgement and health queries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pager::alerts::{
//!     Alert, EscalationPolicy, Level, LogChannel, Pager, Target, TargetNotifier, TokioTimer,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (timeouts, _expired) = tokio::sync::mpsc::unbounded_channel();
//! let notifier = TargetNotifier::new(Arc::new(LogChannel::mail()), Arc::new(LogChannel::sms()));
//! let mut pager = Pager::new(notifier, TokioTimer::new(timeouts));
//!
//! pager.add_escalation_policy(EscalationPolicy::with_levels(
//!     "checkout",
//!     vec![
//!         Level::new(vec![Target::email("oncall@example.org"), Target::sms("666 55 44 33")]),
//!         Level::new(vec![Target::email("lead@example.org")]),
//!     ],
//! ));
//!
//! pager.receive(Alert::new("checkout", "5xx rate above 10%")).unwrap();
//! assert!(pager.is_service_unhealthy("checkout"));
//! # }
//! ```

pub mod alerts;
pub mod api;

// Re-export commonly used types
pub use alerts::{Alert, EscalationPolicy, Level, Pager, PagerError, Target};
