//! Escalation state machine
//!
//! The pager owns the escalation policies and the registry of unhealthy
//! services. Every alert for a service consumes the next level of its policy
//! and notifies the targets of that level that were not already paged for the
//! open incident. While somebody was paged, an acknowledgement timeout is armed
//! and its expiry is delivered back to [`Pager::receive`] like any other alert.

use std::collections::HashMap;

use serde::Serialize;

use super::config::{Alert, MonitoredServiceId, Recipient, Target, DEFAULT_ACK_TIMEOUT_MINUTES};
use super::notifier::{Notifier, NotifierError};
use super::policy::EscalationPolicy;
use super::timer::{Alertable, Timer};

/// Health of a monitored service as seen by the pager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
}

/// Open incident for an unhealthy service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incident {
    /// Recipients already paged, in notification order
    pub notified: Vec<Recipient>,
    /// When the service became unhealthy (unix millis)
    pub opened_at_ms: i64,
}

impl Incident {
    fn open() -> Self {
        Self {
            notified: Vec::new(),
            opened_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn has_notified(&self, recipient: &str) -> bool {
        self.notified.iter().any(|r| r == recipient)
    }
}

pub struct Pager {
    policies: Vec<EscalationPolicy>,
    incidents: HashMap<MonitoredServiceId, Incident>,
    notifier: Box<dyn Notifier>,
    timer: Box<dyn Timer>,
    ack_timeout_minutes: u64,
}

impl Pager {
    pub fn new(notifier: impl Notifier + 'static, timer: impl Timer + 'static) -> Self {
        Self::with_ack_timeout(notifier, timer, DEFAULT_ACK_TIMEOUT_MINUTES)
    }

    pub fn with_ack_timeout(
        notifier: impl Notifier + 'static,
        timer: impl Timer + 'static,
        ack_timeout_minutes: u64,
    ) -> Self {
        Self {
            policies: Vec::new(),
            incidents: HashMap::new(),
            notifier: Box::new(notifier),
            timer: Box::new(timer),
            ack_timeout_minutes,
        }
    }

    /// Register a policy and return how many policies the pager holds.
    ///
    /// Policies are not deduplicated; lookups use the first one registered
    /// for a service.
    pub fn add_escalation_policy(&mut self, policy: EscalationPolicy) -> usize {
        self.policies.push(policy);
        self.policies.len()
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    pub fn ack_timeout_minutes(&self) -> u64 {
        self.ack_timeout_minutes
    }

    /// Handle an alert, whether fresh or re-delivered by an expired timeout
    pub fn receive(&mut self, alert: Alert) -> Result<(), PagerError> {
        let service_id = alert.monitored_service_id().to_string();

        let policy = self
            .policies
            .iter_mut()
            .find(|p| p.monitored_service_id() == service_id)
            .ok_or_else(|| PagerError::UnmonitoredService(service_id.clone()))?;

        let level = policy.cursor() + 1;
        let level_targets: Vec<Target> = policy
            .next_level()
            .map(|l| l.targets().to_vec())
            .unwrap_or_default();
        let exhausted = policy.is_exhausted();

        self.mark_as_unhealthy(&service_id);

        let notified = self.notify_targets(&service_id, &level_targets)?;

        if notified > 0 {
            tracing::info!(
                service_id = %service_id,
                level,
                notified,
                minutes = self.ack_timeout_minutes,
                "Escalation level paged, waiting for acknowledgement"
            );
            self.timer.add_timeout(alert, self.ack_timeout_minutes);
        } else if exhausted {
            tracing::warn!(
                service_id = %service_id,
                level,
                "Escalation policy exhausted, nobody left to page"
            );
        } else {
            tracing::warn!(
                service_id = %service_id,
                level,
                "Every target of this level was already paged, escalation stopped"
            );
        }

        Ok(())
    }

    /// Acknowledge the incident: forget who was paged and cancel the pending timeout
    pub fn mark_as_healthy(&mut self, monitored_service_id: &str) -> Result<(), PagerError> {
        let incident = self
            .incidents
            .remove(monitored_service_id)
            .ok_or_else(|| PagerError::NotUnhealthy(monitored_service_id.to_string()))?;

        self.timer.remove_timeout(monitored_service_id);

        tracing::info!(
            service_id = %monitored_service_id,
            paged = incident.notified.len(),
            "Service acknowledged, marked healthy"
        );
        Ok(())
    }

    /// Open an incident for the service unless one is already open
    pub fn mark_as_unhealthy(&mut self, monitored_service_id: &str) {
        if !self.incidents.contains_key(monitored_service_id) {
            tracing::info!(service_id = %monitored_service_id, "Service marked unhealthy");
            self.incidents
                .insert(monitored_service_id.to_string(), Incident::open());
        }
    }

    pub fn is_service_unhealthy(&self, monitored_service_id: &str) -> bool {
        self.incidents.contains_key(monitored_service_id)
    }

    pub fn health(&self, monitored_service_id: &str) -> ServiceHealth {
        if self.is_service_unhealthy(monitored_service_id) {
            ServiceHealth::Unhealthy
        } else {
            ServiceHealth::Healthy
        }
    }

    pub fn incident(&self, monitored_service_id: &str) -> Option<&Incident> {
        self.incidents.get(monitored_service_id)
    }

    /// Ids of every service with an open incident, sorted
    pub fn unhealthy_services(&self) -> Vec<MonitoredServiceId> {
        let mut ids: Vec<_> = self.incidents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Page every target not yet paged for this incident; returns how many were paged.
    ///
    /// The notified list is checked as each target is paged, so a recipient
    /// listed twice in the same level is paged once.
    fn notify_targets(
        &mut self,
        monitored_service_id: &str,
        targets: &[Target],
    ) -> Result<usize, PagerError> {
        let incident = self
            .incidents
            .entry(monitored_service_id.to_string())
            .or_insert_with(Incident::open);

        let mut notified = 0;
        for target in targets {
            if incident.has_notified(target.recipient()) {
                tracing::debug!(
                    service_id = %monitored_service_id,
                    recipient = %target.recipient(),
                    "Recipient already paged for this incident"
                );
                continue;
            }

            self.notifier.notify(target)?;
            incident.notified.push(target.recipient().to_string());
            notified += 1;
        }

        Ok(notified)
    }
}

impl Alertable for Pager {
    fn receive(&mut self, alert: Alert) -> Result<(), PagerError> {
        Pager::receive(self, alert)
    }
}

/// Pager errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PagerError {
    #[error("The service [{0}] is not monitored by this pager policies")]
    UnmonitoredService(MonitoredServiceId),

    #[error("The given monitored service Id [{0}] is not registered in the pager service as unhealthy")]
    NotUnhealthy(MonitoredServiceId),

    #[error(transparent)]
    Notifier(#[from] NotifierError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::config::TargetKind;
    use crate::alerts::notifier::TargetNotifier;
    use crate::alerts::policy::Level;
    use crate::alerts::testing::{RecordingChannel, RecordingTimer};
    use std::sync::Arc;

    const SERVICE: &str = "monitoredServiceId";

    struct Fixture {
        pager: Pager,
        mail: Arc<RecordingChannel>,
        sms: Arc<RecordingChannel>,
        timer: RecordingTimer,
    }

    impl Fixture {
        fn new() -> Self {
            let mail = Arc::new(RecordingChannel::default());
            let sms = Arc::new(RecordingChannel::default());
            let timer = RecordingTimer::default();
            let pager = Pager::new(TargetNotifier::new(mail.clone(), sms.clone()), timer.clone());
            Self { pager, mail, sms, timer }
        }

        /// Level 1: email a@x + sms 123, level 2: email b@x
        fn with_two_level_policy() -> Self {
            let mut fixture = Self::new();
            fixture.pager.add_escalation_policy(EscalationPolicy::with_levels(
                SERVICE,
                vec![
                    Level::new(vec![Target::email("a@x"), Target::sms("123")]),
                    Level::new(vec![Target::email("b@x")]),
                ],
            ));
            fixture
        }

        fn all_recipients(&self) -> Vec<String> {
            let mut all = self.mail.recipients();
            all.extend(self.sms.recipients());
            all.sort();
            all
        }

        /// Deliver the most recently armed timeout back into the pager
        fn fire_last_timeout(&mut self) -> Result<(), PagerError> {
            let (alert, _) = self.timer.added().last().cloned().unwrap();
            Alertable::receive(&mut self.pager, alert)
        }
    }

    fn alert() -> Alert {
        Alert::new(SERVICE, "not important")
    }

    #[test]
    fn test_unmonitored_service_error() {
        let mut fixture = Fixture::new();

        let err = fixture.pager.receive(alert()).unwrap_err();
        assert_eq!(err, PagerError::UnmonitoredService(SERVICE.to_string()));
        assert_eq!(
            err.to_string(),
            "The service [monitoredServiceId] is not monitored by this pager policies"
        );
        assert!(!fixture.pager.is_service_unhealthy(SERVICE));
    }

    #[test]
    fn test_unmonitored_regardless_of_prior_state() {
        let mut fixture = Fixture::with_two_level_policy();
        fixture.pager.mark_as_unhealthy("other");
        fixture.pager.receive(alert()).unwrap();

        for _ in 0..2 {
            let err = fixture.pager.receive(Alert::new("other", "boom")).unwrap_err();
            assert!(err.to_string().contains("[other]"));
        }
    }

    #[test]
    fn test_first_alert_pages_first_level() {
        let mut fixture = Fixture::with_two_level_policy();
        assert!(!fixture.pager.is_service_unhealthy(SERVICE));

        fixture.pager.receive(alert()).unwrap();

        assert!(fixture.pager.is_service_unhealthy(SERVICE));
        assert_eq!(fixture.all_recipients(), vec!["123", "a@x"]);
        assert_eq!(fixture.mail.recipients(), vec!["a@x"]);
        assert_eq!(fixture.sms.recipients(), vec!["123"]);
        assert_eq!(fixture.timer.added(), vec![(alert(), 15)]);
    }

    #[test]
    fn test_timeout_escalates_to_next_level() {
        let mut fixture = Fixture::with_two_level_policy();
        fixture.pager.receive(alert()).unwrap();

        fixture.fire_last_timeout().unwrap();

        assert_eq!(fixture.mail.recipients(), vec!["a@x", "b@x"]);
        assert_eq!(fixture.timer.added().len(), 2);
        assert_eq!(fixture.timer.added()[1].1, 15);
        assert_eq!(
            fixture.pager.incident(SERVICE).unwrap().notified,
            vec!["a@x", "123", "b@x"]
        );
    }

    #[test]
    fn test_exhausted_policy_stops_escalating() {
        let mut fixture = Fixture::with_two_level_policy();
        fixture.pager.receive(alert()).unwrap();
        fixture.fire_last_timeout().unwrap();

        fixture.fire_last_timeout().unwrap();

        assert_eq!(fixture.all_recipients().len(), 3);
        assert_eq!(fixture.timer.added().len(), 2);
        assert!(fixture.pager.is_service_unhealthy(SERVICE));
    }

    #[test]
    fn test_zero_level_policy_marks_unhealthy_without_paging() {
        let mut fixture = Fixture::new();
        fixture.pager.add_escalation_policy(EscalationPolicy::new(SERVICE));

        fixture.pager.receive(alert()).unwrap();

        assert!(fixture.all_recipients().is_empty());
        assert!(fixture.timer.added().is_empty());
        assert!(fixture.pager.is_service_unhealthy(SERVICE));
    }

    #[test]
    fn test_recipient_repeated_across_levels_paged_once() {
        let mut fixture = Fixture::new();
        fixture.pager.add_escalation_policy(EscalationPolicy::with_levels(
            SERVICE,
            vec![
                Level::new(vec![Target::email("a@x")]),
                Level::new(vec![Target::email("a@x")]),
                Level::new(vec![Target::email("a@x"), Target::sms("123")]),
            ],
        ));

        fixture.pager.receive(alert()).unwrap();
        assert_eq!(fixture.timer.added().len(), 1);

        // Second level only repeats a@x: nobody paged, no timer armed
        fixture.pager.receive(alert()).unwrap();
        assert_eq!(fixture.mail.recipients(), vec!["a@x"]);
        assert_eq!(fixture.timer.added().len(), 1);

        fixture.pager.receive(alert()).unwrap();
        assert_eq!(fixture.mail.recipients(), vec!["a@x"]);
        assert_eq!(fixture.sms.recipients(), vec!["123"]);
        assert_eq!(fixture.timer.added().len(), 2);
    }

    #[test]
    fn test_recipient_repeated_within_level_paged_once() {
        let mut fixture = Fixture::new();
        fixture.pager.add_escalation_policy(EscalationPolicy::with_levels(
            SERVICE,
            vec![Level::new(vec![Target::email("a@x"), Target::email("a@x")])],
        ));

        fixture.pager.receive(alert()).unwrap();
        assert_eq!(fixture.mail.recipients(), vec!["a@x"]);
    }

    #[test]
    fn test_same_recipient_across_channels_deduplicated_by_address() {
        let mut fixture = Fixture::new();
        fixture.pager.add_escalation_policy(EscalationPolicy::with_levels(
            SERVICE,
            vec![
                Level::new(vec![Target::email("shared")]),
                Level::new(vec![Target::sms("shared")]),
            ],
        ));

        fixture.pager.receive(alert()).unwrap();
        fixture.pager.receive(alert()).unwrap();
        assert!(fixture.sms.recipients().is_empty());
    }

    #[test]
    fn test_acknowledgement_cancels_timeout() {
        let mut fixture = Fixture::with_two_level_policy();
        fixture.pager.receive(alert()).unwrap();

        fixture.pager.mark_as_healthy(SERVICE).unwrap();

        assert!(!fixture.pager.is_service_unhealthy(SERVICE));
        assert_eq!(fixture.timer.removed(), vec![SERVICE.to_string()]);
    }

    #[test]
    fn test_acknowledged_then_realerted_can_page_same_recipients() {
        let mut fixture = Fixture::new();
        fixture.pager.add_escalation_policy(EscalationPolicy::with_levels(
            SERVICE,
            vec![
                Level::new(vec![Target::email("a@x")]),
                Level::new(vec![Target::email("a@x")]),
            ],
        ));

        fixture.pager.receive(alert()).unwrap();
        fixture.pager.mark_as_healthy(SERVICE).unwrap();

        // Cursor is policy-lifetime state: the new incident starts at level two
        fixture.pager.receive(alert()).unwrap();
        assert_eq!(fixture.mail.recipients(), vec!["a@x", "a@x"]);
    }

    #[test]
    fn test_health_round_trip() {
        let mut fixture = Fixture::new();

        fixture.pager.mark_as_unhealthy(SERVICE);
        assert_eq!(fixture.pager.health(SERVICE), ServiceHealth::Unhealthy);

        fixture.pager.mark_as_healthy(SERVICE).unwrap();
        assert_eq!(fixture.pager.health(SERVICE), ServiceHealth::Healthy);

        let err = fixture.pager.mark_as_healthy(SERVICE).unwrap_err();
        assert_eq!(err, PagerError::NotUnhealthy(SERVICE.to_string()));
        assert_eq!(
            err.to_string(),
            "The given monitored service Id [monitoredServiceId] is not registered in the pager service as unhealthy"
        );
    }

    #[test]
    fn test_mark_as_unhealthy_is_idempotent() {
        let mut fixture = Fixture::with_two_level_policy();
        fixture.pager.receive(alert()).unwrap();

        fixture.pager.mark_as_unhealthy(SERVICE);
        fixture.pager.mark_as_unhealthy(SERVICE);

        assert_eq!(fixture.pager.incident(SERVICE).unwrap().notified.len(), 2);
        assert_eq!(fixture.pager.unhealthy_services(), vec![SERVICE.to_string()]);
    }

    #[test]
    fn test_acknowledgement_before_any_alert_pages_nobody() {
        let mut fixture = Fixture::with_two_level_policy();
        fixture.pager.mark_as_unhealthy(SERVICE);

        fixture.pager.mark_as_healthy(SERVICE).unwrap();

        assert!(fixture.all_recipients().is_empty());
        assert!(fixture.timer.added().is_empty());
    }

    #[test]
    fn test_first_matching_policy_wins() {
        let mut fixture = Fixture::new();
        assert_eq!(
            fixture.pager.add_escalation_policy(EscalationPolicy::with_levels(
                SERVICE,
                vec![Level::new(vec![Target::email("first@x")])],
            )),
            1
        );
        assert_eq!(
            fixture.pager.add_escalation_policy(EscalationPolicy::with_levels(
                SERVICE,
                vec![Level::new(vec![Target::email("second@x")])],
            )),
            2
        );

        fixture.pager.receive(alert()).unwrap();
        fixture.pager.receive(alert()).unwrap();

        assert_eq!(fixture.mail.recipients(), vec!["first@x"]);
    }

    #[test]
    fn test_unsupported_target_surfaces_error() {
        let mail = Arc::new(RecordingChannel::default());
        let timer = RecordingTimer::default();
        let notifier = TargetNotifier::empty().with_channel(TargetKind::Email, mail.clone());
        let mut pager = Pager::new(notifier, timer.clone());
        pager.add_escalation_policy(EscalationPolicy::with_levels(
            SERVICE,
            vec![Level::new(vec![Target::email("a@x"), Target::sms("123")])],
        ));

        let err = pager.receive(alert()).unwrap_err();

        assert_eq!(err.to_string(), "Cannot notify, unsupported Target type [Sms]");
        assert_eq!(pager.incident(SERVICE).unwrap().notified, vec!["a@x"]);
        assert!(timer.added().is_empty());
    }

    #[test]
    fn test_custom_ack_timeout() {
        let timer = RecordingTimer::default();
        let notifier = TargetNotifier::new(
            Arc::new(RecordingChannel::default()),
            Arc::new(RecordingChannel::default()),
        );
        let mut pager = Pager::with_ack_timeout(notifier, timer.clone(), 5);
        pager.add_escalation_policy(EscalationPolicy::with_levels(
            SERVICE,
            vec![Level::new(vec![Target::sms("123")])],
        ));

        pager.receive(alert()).unwrap();
        assert_eq!(timer.added()[0].1, 5);
    }
}
