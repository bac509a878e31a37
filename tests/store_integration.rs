//! Integration tests for the Postgres-backed recipient store.
//!
//! These tests verify:
//! 1. Schema bootstrap is idempotent
//! 2. Registration, duplicate rejection, and active listing
//! 3. Last-alert timestamp round-trips (set and clear)
//! 4. Alert history append and most-recent-first retrieval
//!
//! Prerequisites:
//! - PostgreSQL running and reachable
//! - DATABASE_URL set in .env or the environment
//!
//! Run with: cargo test --test store_integration -- --ignored --test-threads=1
//!
//! All tests are #[ignore]d so normal CI builds do not depend on a
//! database. Test rows use the +99999 phone prefix and are deleted
//! before each test.

use chrono::{Duration, TimeZone, Utc};
use postgres::{Client, NoTls};

use flosim_service::model::{DeliveryStatus, RiskLevel, StoreError};
use flosim_service::store::{PostgresStore, RecipientStore};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn database_url() -> String {
    dotenv::dotenv().ok();
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for store integration tests")
}

fn connect_store() -> PostgresStore {
    PostgresStore::connect(&database_url()).expect("failed to connect to test database")
}

/// Removes leftovers from previous runs. Test recipients all use the
/// +99999 prefix so production-looking rows are never touched.
fn cleanup_test_rows() {
    let mut client =
        Client::connect(&database_url(), NoTls).expect("failed to connect for cleanup");
    client
        .execute(
            "DELETE FROM alert_history
             WHERE recipient_id IN (SELECT id FROM recipients WHERE phone LIKE '+99999%')",
            &[],
        )
        .expect("alert_history cleanup failed");
    client
        .execute("DELETE FROM recipients WHERE phone LIKE '+99999%'", &[])
        .expect("recipients cleanup failed");
}

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore] // Requires DATABASE_URL - run manually
fn store_bootstrap_is_idempotent() {
    // Connecting twice must not fail on existing tables.
    let _first = connect_store();
    let _second = connect_store();
}

#[test]
#[ignore] // Requires DATABASE_URL - run manually
fn store_registers_lists_and_rejects_duplicates() {
    cleanup_test_rows();
    let store = connect_store();

    let id = store
        .register(
            "+9999900001",
            "Test Recipient",
            "Test Area",
            30.3165,
            78.0322,
            fixed_now(),
        )
        .expect("first registration should succeed");

    let duplicate = store.register(
        "+9999900001",
        "Someone Else",
        "Other Area",
        30.0,
        78.0,
        fixed_now(),
    );
    assert!(matches!(duplicate, Err(StoreError::DuplicatePhone(_))));

    let recipients = store.list_active().unwrap();
    let ours: Vec<_> = recipients
        .iter()
        .filter(|r| r.phone.starts_with("+99999"))
        .collect();
    assert_eq!(ours.len(), 1);
    assert_eq!(ours[0].id, id);
    assert_eq!(ours[0].name, "Test Recipient");
    assert_eq!(ours[0].last_alert_sent, None);
}

#[test]
#[ignore] // Requires DATABASE_URL - run manually
fn store_round_trips_last_alert_timestamp() {
    cleanup_test_rows();
    let store = connect_store();

    let id = store
        .register(
            "+9999900002",
            "Timestamp Test",
            "Test Area",
            30.3,
            78.0,
            fixed_now(),
        )
        .unwrap();

    store.set_last_alert(id, Some(fixed_now())).unwrap();
    let recipient = store
        .list_active()
        .unwrap()
        .into_iter()
        .find(|r| r.id == id)
        .unwrap();
    assert_eq!(recipient.last_alert_sent, Some(fixed_now()));

    store.set_last_alert(id, None).unwrap();
    let recipient = store
        .list_active()
        .unwrap()
        .into_iter()
        .find(|r| r.id == id)
        .unwrap();
    assert_eq!(recipient.last_alert_sent, None);

    // Unknown ids are reported, not silently ignored.
    let missing = store.set_last_alert(-1, Some(fixed_now()));
    assert!(matches!(missing, Err(StoreError::UnknownRecipient(-1))));
}

#[test]
#[ignore] // Requires DATABASE_URL - run manually
fn store_returns_alert_history_most_recent_first() {
    cleanup_test_rows();
    let store = connect_store();

    let id = store
        .register(
            "+9999900003",
            "History Test",
            "Test Area",
            30.3,
            78.0,
            fixed_now(),
        )
        .unwrap();

    for i in 0..4 {
        store
            .append_alert(
                id,
                if i % 2 == 0 {
                    RiskLevel::High
                } else {
                    RiskLevel::Severe
                },
                &format!("test alert {}", i),
                if i == 2 {
                    DeliveryStatus::Failed
                } else {
                    DeliveryStatus::Sent
                },
                fixed_now() + Duration::minutes(i),
            )
            .unwrap();
    }

    let records = store.alerts_for(id, 3).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].message, "test alert 3");
    assert_eq!(records[1].message, "test alert 2");
    assert_eq!(records[1].status, DeliveryStatus::Failed);
    assert_eq!(records[2].message, "test alert 1");
    assert_eq!(records[2].risk_level, RiskLevel::Severe);
}
