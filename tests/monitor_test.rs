mod common;

use async_trait::async_trait;
use chrono::TimeDelta;
use fine_payments::application::monitor::{MonitorConfig, MonitorSummary, PaymentMonitor};
use fine_payments::application::registration::{RegistrationConfig, RegistrationService};
use fine_payments::application::service::PaymentService;
use fine_payments::domain::clock::{Clock, ManualClock};
use fine_payments::domain::payment::{Payment, UserId};
use fine_payments::domain::ports::{IlsGateway, Notifier, RegistrationOutcome, RegistrationRequest};
use fine_payments::domain::status::PaymentStatus;
use fine_payments::error::{PaymentError, Result};
use std::sync::{Arc, Mutex};

struct MockIls {
    payable: Option<i64>,
    outcome: std::result::Result<RegistrationOutcome, String>,
    requests: Arc<Mutex<Vec<RegistrationRequest>>>,
}

#[async_trait]
impl IlsGateway for MockIls {
    async fn payable_amount(&self, _: &str, _: &str, _: &[String]) -> Result<Option<i64>> {
        Ok(self.payable)
    }

    async fn register_payment(&self, request: RegistrationRequest) -> Result<RegistrationOutcome> {
        self.requests.lock().unwrap().push(request);
        self.outcome.clone().map_err(PaymentError::IlsError)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    fail: bool,
    reports: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_unresolved(&self, source_ils: &str, payments: &[Payment]) -> Result<()> {
        if self.fail {
            return Err(PaymentError::NotificationError("mail server down".to_string()));
        }
        let ids = payments.iter().map(|p| p.local_identifier().to_string()).collect();
        self.reports.lock().unwrap().push((source_ils.to_string(), ids));
        Ok(())
    }
}

async fn paid_payment(
    service: &PaymentService,
    clock: &ManualClock,
    local_identifier: &str,
    source_ils: &str,
) -> Payment {
    let mut payment = service.create_in_progress_payment(UserId(1), local_identifier);
    payment
        .set_cat_username("alice")
        .set_source_ils(source_ils)
        .set_amount(1100)
        .set_currency("EUR");
    payment.apply_payment_paid_status_at(clock.now());
    service.persist(&mut payment).await.unwrap();
    payment
}

/// Timeline: `expired` fails registration, three hours pass, then `fresh` is paid
/// and `stale` runs into changed fines, and ten more minutes pass.
async fn seed(service: &PaymentService, clock: &ManualClock) {
    let mut expired = paid_payment(service, clock, "expired", "North").await;
    expired.apply_registration_failed_status("timeout");
    service.persist(&mut expired).await.unwrap();

    clock.advance(TimeDelta::hours(3));
    paid_payment(service, clock, "fresh", "North").await;
    let mut stale = paid_payment(service, clock, "stale", "South").await;
    stale.apply_fines_updated_status();
    service.persist(&mut stale).await.unwrap();

    clock.advance(TimeDelta::minutes(10));
}

fn monitor(
    service: &Arc<PaymentService>,
    ils: MockIls,
    notifier: RecordingNotifier,
) -> PaymentMonitor {
    let registration =
        RegistrationService::new(service.clone(), Box::new(ils), RegistrationConfig::default());
    PaymentMonitor::new(
        service.clone(),
        registration,
        Box::new(notifier),
        MonitorConfig::default(),
    )
}

#[tokio::test]
async fn test_monitor_registers_expires_and_reports() {
    let (service, clock) = common::service();
    seed(&service, &clock).await;

    let requests = Arc::new(Mutex::new(Vec::new()));
    let reports = Arc::new(Mutex::new(Vec::new()));
    let monitor = monitor(
        &service,
        MockIls {
            payable: Some(1100),
            outcome: Ok(RegistrationOutcome::Registered),
            requests: requests.clone(),
        },
        RecordingNotifier {
            fail: false,
            reports: reports.clone(),
        },
    );

    let summary = monitor.run().await.unwrap();
    assert_eq!(
        summary,
        MonitorSummary {
            registered: 1,
            failed: 0,
            expired: 1,
            reported: 2,
        }
    );

    let requests = requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].local_identifier, "fresh");
    assert_eq!(requests[0].fine_ids, None);

    assert_eq!(
        *reports.lock().unwrap(),
        vec![
            ("North".to_string(), vec!["expired".to_string()]),
            ("South".to_string(), vec!["stale".to_string()]),
        ]
    );

    let fresh = service.get_payment_by_local_identifier("fresh").await.unwrap().unwrap();
    assert_eq!(fresh.status(), PaymentStatus::Completed);
    assert_eq!(fresh.registered(), Some(clock.now()));

    let expired = service.get_payment_by_local_identifier("expired").await.unwrap().unwrap();
    assert_eq!(expired.status(), PaymentStatus::RegistrationExpired);
    assert_eq!(expired.reported(), Some(clock.now()));

    // Reported payments are not reported again within the interval.
    let second = monitor.run().await.unwrap();
    assert_eq!(second, MonitorSummary::default());
    assert_eq!(reports.lock().unwrap().len(), 2);

    clock.advance(TimeDelta::minutes(121));
    let third = monitor.run().await.unwrap();
    assert_eq!(third.reported, 2);
}

#[tokio::test]
async fn test_monitor_detects_changed_fines() {
    let (service, clock) = common::service();
    paid_payment(&service, &clock, "changed", "North").await;
    clock.advance(TimeDelta::minutes(5));

    let requests = Arc::new(Mutex::new(Vec::new()));
    let monitor = monitor(
        &service,
        MockIls {
            payable: Some(900),
            outcome: Ok(RegistrationOutcome::Registered),
            requests: requests.clone(),
        },
        RecordingNotifier::default(),
    );

    let summary = monitor.run().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.registered, 0);
    // The fines update is reported in the same run.
    assert_eq!(summary.reported, 1);
    assert!(requests.lock().unwrap().is_empty());

    let changed = service.get_payment_by_local_identifier("changed").await.unwrap().unwrap();
    assert_eq!(changed.status(), PaymentStatus::FinesUpdated);
}

#[tokio::test]
async fn test_monitor_records_ils_failure() {
    let (service, clock) = common::service();
    paid_payment(&service, &clock, "refused", "North").await;
    clock.advance(TimeDelta::minutes(5));

    let monitor = monitor(
        &service,
        MockIls {
            payable: None,
            outcome: Ok(RegistrationOutcome::Failed("patron blocked".to_string())),
            requests: Arc::default(),
        },
        RecordingNotifier::default(),
    );

    let summary = monitor.run().await.unwrap();
    assert_eq!(summary.failed, 1);

    let refused = service.get_payment_by_local_identifier("refused").await.unwrap().unwrap();
    assert_eq!(refused.status(), PaymentStatus::RegistrationFailed);
    assert_eq!(refused.status_message(), "Failed to mark fees paid: patron blocked");
    assert_eq!(refused.registration_started(), None);
}

#[tokio::test]
async fn test_monitor_keeps_payments_unreported_when_notification_fails() {
    let (service, clock) = common::service();
    seed(&service, &clock).await;

    let monitor = monitor(
        &service,
        MockIls {
            payable: Some(1100),
            outcome: Ok(RegistrationOutcome::Registered),
            requests: Arc::default(),
        },
        RecordingNotifier {
            fail: true,
            reports: Arc::default(),
        },
    );

    let summary = monitor.run().await.unwrap();
    assert_eq!(summary.reported, 0);
    let stale = service.get_payment_by_local_identifier("stale").await.unwrap().unwrap();
    assert_eq!(stale.reported(), None);
}

async fn event_messages(service: &PaymentService, local_identifier: &str) -> Vec<String> {
    let payment = service
        .get_payment_by_local_identifier(local_identifier)
        .await
        .unwrap()
        .unwrap();
    service
        .payment_events(payment.id().unwrap())
        .await
        .unwrap()
        .into_iter()
        .map(|event| event.message)
        .collect()
}

#[tokio::test]
async fn test_monitor_records_gateway_error() {
    let (service, clock) = common::service();
    paid_payment(&service, &clock, "unreachable", "North").await;
    clock.advance(TimeDelta::minutes(5));

    let requests = Arc::new(Mutex::new(Vec::new()));
    let monitor = monitor(
        &service,
        MockIls {
            payable: Some(1100),
            outcome: Err("connection reset".to_string()),
            requests: requests.clone(),
        },
        RecordingNotifier::default(),
    );

    let summary = monitor.run().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.registered, 0);
    assert_eq!(requests.lock().unwrap().len(), 1);

    let unreachable = service
        .get_payment_by_local_identifier("unreachable")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unreachable.status(), PaymentStatus::RegistrationFailed);
    assert!(unreachable.status_message().contains("connection reset"));
    assert_eq!(unreachable.registration_started(), None);

    let events = service.payment_events(unreachable.id().unwrap()).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].message, "Registration failed");
    assert_eq!(
        events[1].data.get("error").map(String::as_str),
        Some("ILS error: connection reset")
    );

    // Picked up again on the next run without waiting for the registration timeout
    let retry = monitor.run().await.unwrap();
    assert_eq!(retry.failed, 1);
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_monitor_audit_trail() {
    let (service, clock) = common::service();
    seed(&service, &clock).await;

    let monitor = monitor(
        &service,
        MockIls {
            payable: Some(1100),
            outcome: Ok(RegistrationOutcome::Registered),
            requests: Arc::default(),
        },
        RecordingNotifier::default(),
    );
    monitor.run().await.unwrap();

    assert_eq!(event_messages(&service, "expired").await, vec!["Marked as expired"]);
    assert_eq!(
        event_messages(&service, "fresh").await,
        vec!["Started registration", "Successfully registered"]
    );
    assert!(event_messages(&service, "stale").await.is_empty());

    let fresh = service.get_payment_by_local_identifier("fresh").await.unwrap().unwrap();
    let events = service.payment_events(fresh.id().unwrap()).await.unwrap();
    assert!(events.iter().all(|event| event.created == clock.now()));
    assert!(events.iter().all(|event| event.user == UserId(1)));
}
