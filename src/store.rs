//! Recipient and alert-history persistence.
//!
//! The pipeline consumes persistence behind the `RecipientStore` trait:
//! recipients are read, their last-alert timestamp is the only mutated
//! field, and alert records are append-only. Two implementations ship
//! here: `PostgresStore` for real runs and `MemoryStore` for tests and
//! demo mode.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use postgres::error::SqlState;
use postgres::{Client, NoTls};

use crate::model::{AlertRecord, DeliveryStatus, Recipient, RiskLevel, StoreError};

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Durable store for recipients and alert history.
///
/// Methods take `&self`; implementations serialize internal access,
/// which also makes per-recipient timestamp updates mutually exclusive
/// across threads.
pub trait RecipientStore: Send + Sync {
    /// Registers a new recipient. Fails with `DuplicatePhone` if the
    /// phone identifier already exists (active or not).
    fn register(
        &self,
        phone: &str,
        name: &str,
        area: &str,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// All active recipients, ordered by id.
    fn list_active(&self) -> Result<Vec<Recipient>, StoreError>;

    /// Sets or clears a recipient's last-alert timestamp.
    fn set_last_alert(
        &self,
        recipient_id: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Appends one alert-history record. Returns the record id.
    fn append_alert(
        &self,
        recipient_id: i64,
        risk_level: RiskLevel,
        message: &str,
        status: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Alert history for a recipient, most recent first, capped at `limit`.
    fn alerts_for(&self, recipient_id: i64, limit: usize) -> Result<Vec<AlertRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

fn backend(e: postgres::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub struct PostgresStore {
    client: Mutex<Client>,
}

impl PostgresStore {
    /// Connects and ensures the schema exists. Connection string comes
    /// from `DATABASE_URL` in real runs.
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut client = Client::connect(database_url, NoTls).map_err(backend)?;
        Self::init_schema(&mut client)?;
        Ok(PostgresStore {
            client: Mutex::new(client),
        })
    }

    fn init_schema(client: &mut Client) -> Result<(), StoreError> {
        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS recipients (
                     id              BIGSERIAL PRIMARY KEY,
                     phone           TEXT UNIQUE NOT NULL,
                     name            TEXT NOT NULL,
                     area            TEXT NOT NULL,
                     latitude        DOUBLE PRECISION NOT NULL,
                     longitude       DOUBLE PRECISION NOT NULL,
                     registered_at   TIMESTAMPTZ NOT NULL,
                     is_active       BOOLEAN NOT NULL DEFAULT TRUE,
                     last_alert_sent TIMESTAMPTZ
                 );
                 CREATE TABLE IF NOT EXISTS alert_history (
                     id           BIGSERIAL PRIMARY KEY,
                     recipient_id BIGINT NOT NULL REFERENCES recipients(id),
                     risk_level   TEXT NOT NULL,
                     message      TEXT NOT NULL,
                     status       TEXT NOT NULL,
                     sent_at      TIMESTAMPTZ NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS alert_history_recipient_sent_idx
                     ON alert_history (recipient_id, sent_at DESC);",
            )
            .map_err(backend)
    }

    fn parse_risk(value: &str) -> Result<RiskLevel, StoreError> {
        RiskLevel::parse(value)
            .ok_or_else(|| StoreError::Backend(format!("unrecognized risk level '{}'", value)))
    }

    fn parse_status(value: &str) -> Result<DeliveryStatus, StoreError> {
        match value {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(StoreError::Backend(format!(
                "unrecognized delivery status '{}'",
                other
            ))),
        }
    }
}

impl RecipientStore for PostgresStore {
    fn register(
        &self,
        phone: &str,
        name: &str,
        area: &str,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut client = self.client.lock().unwrap();
        let result = client.query_one(
            "INSERT INTO recipients (phone, name, area, latitude, longitude, registered_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
            &[&phone, &name, &area, &latitude, &longitude, &now],
        );
        match result {
            Ok(row) => Ok(row.get(0)),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Err(StoreError::DuplicatePhone(phone.to_string()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    fn list_active(&self) -> Result<Vec<Recipient>, StoreError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                "SELECT id, phone, name, area, latitude, longitude,
                        registered_at, is_active, last_alert_sent
                 FROM recipients
                 WHERE is_active
                 ORDER BY id",
                &[],
            )
            .map_err(backend)?;

        Ok(rows
            .iter()
            .map(|row| Recipient {
                id: row.get(0),
                phone: row.get(1),
                name: row.get(2),
                area: row.get(3),
                latitude: row.get(4),
                longitude: row.get(5),
                registered_at: row.get(6),
                is_active: row.get(7),
                last_alert_sent: row.get(8),
            })
            .collect())
    }

    fn set_last_alert(
        &self,
        recipient_id: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut client = self.client.lock().unwrap();
        let updated = client
            .execute(
                "UPDATE recipients SET last_alert_sent = $1 WHERE id = $2",
                &[&at, &recipient_id],
            )
            .map_err(backend)?;
        if updated == 0 {
            return Err(StoreError::UnknownRecipient(recipient_id));
        }
        Ok(())
    }

    fn append_alert(
        &self,
        recipient_id: i64,
        risk_level: RiskLevel,
        message: &str,
        status: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut client = self.client.lock().unwrap();
        let result = client.query_one(
            "INSERT INTO alert_history (recipient_id, risk_level, message, status, sent_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
            &[
                &recipient_id,
                &risk_level.as_str(),
                &message,
                &status.as_str(),
                &now,
            ],
        );
        match result {
            Ok(row) => Ok(row.get(0)),
            Err(e) if e.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) => {
                Err(StoreError::UnknownRecipient(recipient_id))
            }
            Err(e) => Err(backend(e)),
        }
    }

    fn alerts_for(&self, recipient_id: i64, limit: usize) -> Result<Vec<AlertRecord>, StoreError> {
        let mut client = self.client.lock().unwrap();
        let rows = client
            .query(
                "SELECT id, recipient_id, risk_level, message, status, sent_at
                 FROM alert_history
                 WHERE recipient_id = $1
                 ORDER BY sent_at DESC, id DESC
                 LIMIT $2",
                &[&recipient_id, &(limit as i64)],
            )
            .map_err(backend)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(AlertRecord {
                id: row.get(0),
                recipient_id: row.get(1),
                risk_level: Self::parse_risk(row.get(2))?,
                message: row.get(3),
                status: Self::parse_status(row.get(4))?,
                sent_at: row.get(5),
            });
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    recipients: Vec<Recipient>,
    alerts: Vec<AlertRecord>,
    next_recipient_id: i64,
    next_alert_id: i64,
}

/// Mutex-guarded in-memory store with the same semantics as the
/// Postgres store. Used by tests and demo mode.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(MemoryInner {
                next_recipient_id: 1,
                next_alert_id: 1,
                ..MemoryInner::default()
            }),
        }
    }
}

impl RecipientStore for MemoryStore {
    fn register(
        &self,
        phone: &str,
        name: &str,
        area: &str,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.recipients.iter().any(|r| r.phone == phone) {
            return Err(StoreError::DuplicatePhone(phone.to_string()));
        }
        let id = inner.next_recipient_id;
        inner.next_recipient_id += 1;
        inner.recipients.push(Recipient {
            id,
            phone: phone.to_string(),
            name: name.to_string(),
            area: area.to_string(),
            latitude,
            longitude,
            registered_at: now,
            is_active: true,
            last_alert_sent: None,
        });
        Ok(id)
    }

    fn list_active(&self) -> Result<Vec<Recipient>, StoreError> {
        let inner = self.inner.lock().unwrap();
        // Insertion order is id order.
        Ok(inner
            .recipients
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    fn set_last_alert(
        &self,
        recipient_id: i64,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let recipient = inner
            .recipients
            .iter_mut()
            .find(|r| r.id == recipient_id)
            .ok_or(StoreError::UnknownRecipient(recipient_id))?;
        recipient.last_alert_sent = at;
        Ok(())
    }

    fn append_alert(
        &self,
        recipient_id: i64,
        risk_level: RiskLevel,
        message: &str,
        status: DeliveryStatus,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.recipients.iter().any(|r| r.id == recipient_id) {
            return Err(StoreError::UnknownRecipient(recipient_id));
        }
        let id = inner.next_alert_id;
        inner.next_alert_id += 1;
        inner.alerts.push(AlertRecord {
            id,
            recipient_id,
            risk_level,
            message: message.to_string(),
            status,
            sent_at: now,
        });
        Ok(id)
    }

    fn alerts_for(&self, recipient_id: i64, limit: usize) -> Result<Vec<AlertRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut records: Vec<AlertRecord> = inner
            .alerts
            .iter()
            .filter(|a| a.recipient_id == recipient_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));
        records.truncate(limit);
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 9, 0, 0).unwrap()
    }

    fn register_demo(store: &MemoryStore, phone: &str) -> i64 {
        store
            .register(phone, "Asha Rawat", "Rispana", 30.3165, 78.0322, fixed_now())
            .expect("registration should succeed")
    }

    #[test]
    fn test_duplicate_phone_is_rejected_and_leaves_one_record() {
        let store = MemoryStore::new();
        register_demo(&store, "+919876500001");

        let second = store.register(
            "+919876500001",
            "Someone Else",
            "Bindal",
            30.31,
            78.03,
            fixed_now(),
        );
        assert!(matches!(second, Err(StoreError::DuplicatePhone(_))));

        let recipients = store.list_active().unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].name, "Asha Rawat");
    }

    #[test]
    fn test_list_active_is_ordered_by_id() {
        let store = MemoryStore::new();
        let a = register_demo(&store, "+919876500001");
        let b = register_demo(&store, "+919876500002");
        let c = register_demo(&store, "+919876500003");

        let ids: Vec<i64> = store.list_active().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_set_last_alert_round_trips_and_clears() {
        let store = MemoryStore::new();
        let id = register_demo(&store, "+919876500001");

        store.set_last_alert(id, Some(fixed_now())).unwrap();
        let recipient = &store.list_active().unwrap()[0];
        assert_eq!(recipient.last_alert_sent, Some(fixed_now()));

        store.set_last_alert(id, None).unwrap();
        let recipient = &store.list_active().unwrap()[0];
        assert_eq!(recipient.last_alert_sent, None);
    }

    #[test]
    fn test_set_last_alert_for_unknown_recipient_errors() {
        let store = MemoryStore::new();
        let result = store.set_last_alert(404, Some(fixed_now()));
        assert!(matches!(result, Err(StoreError::UnknownRecipient(404))));
    }

    #[test]
    fn test_alerts_for_returns_most_recent_first_with_limit() {
        let store = MemoryStore::new();
        let id = register_demo(&store, "+919876500001");

        for i in 0..5 {
            store
                .append_alert(
                    id,
                    RiskLevel::High,
                    &format!("alert {}", i),
                    DeliveryStatus::Sent,
                    fixed_now() + Duration::minutes(i),
                )
                .unwrap();
        }

        let records = store.alerts_for(id, 3).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "alert 4");
        assert_eq!(records[1].message, "alert 3");
        assert_eq!(records[2].message, "alert 2");
    }

    #[test]
    fn test_append_alert_for_unknown_recipient_errors() {
        let store = MemoryStore::new();
        let result = store.append_alert(
            7,
            RiskLevel::Severe,
            "orphan",
            DeliveryStatus::Failed,
            fixed_now(),
        );
        assert!(matches!(result, Err(StoreError::UnknownRecipient(7))));
    }
}
