//! libSQL backend — async `PaymentStore` implementation.
//!
//! Supports local file and in-memory databases; the in-memory form backs
//! tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::payments::model::{Payment, PaymentStatus, UpdatePayment};
use crate::payments::store::PaymentStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS payments (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    envelope_id TEXT NOT NULL,
    case_reference TEXT NOT NULL,
    is_exception_record INTEGER NOT NULL,
    po_box TEXT NOT NULL,
    jurisdiction TEXT NOT NULL,
    service TEXT NOT NULL,
    document_control_numbers TEXT NOT NULL,
    status TEXT NOT NULL,
    status_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);
CREATE TABLE IF NOT EXISTS update_payments (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    envelope_id TEXT NOT NULL,
    jurisdiction TEXT NOT NULL,
    exception_record_ref TEXT NOT NULL,
    new_case_ref TEXT NOT NULL,
    status TEXT NOT NULL,
    status_message TEXT
);
CREATE INDEX IF NOT EXISTS idx_update_payments_status ON update_payments(status);
";

/// libSQL payment store.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlPaymentStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlPaymentStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open database: {e}")))?;
        let store = Self::from_db(db)?;
        store.init_schema().await?;
        info!(path = %path.display(), "Payment database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to create database: {e}")))?;
        let store = Self::from_db(db)?;
        store.init_schema().await?;
        Ok(store)
    }

    fn from_db(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StoreError::Query(format!("Schema init failed: {e}")))?;
        Ok(())
    }
}

/// Convert `Option<String>` to a libsql value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn row_to_payment(row: &libsql::Row) -> Result<Payment, libsql::Error> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(1)?;
    let dcns_json: String = row.get(8)?;
    Ok(Payment {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
        envelope_id: row.get(2)?,
        case_reference: row.get(3)?,
        is_exception_record: row.get::<i64>(4)? != 0,
        po_box: row.get(5)?,
        jurisdiction: row.get(6)?,
        service: row.get(7)?,
        document_control_numbers: serde_json::from_str(&dcns_json).unwrap_or_default(),
        status: PaymentStatus::parse(&row.get::<String>(9)?),
        status_message: row.get::<String>(10).ok(),
    })
}

fn row_to_update_payment(row: &libsql::Row) -> Result<UpdatePayment, libsql::Error> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(1)?;
    Ok(UpdatePayment {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        created_at: parse_datetime(&created_str),
        envelope_id: row.get(2)?,
        jurisdiction: row.get(3)?,
        exception_record_ref: row.get(4)?,
        new_case_ref: row.get(5)?,
        status: PaymentStatus::parse(&row.get::<String>(6)?),
        status_message: row.get::<String>(7).ok(),
    })
}

fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl PaymentStore for LibSqlPaymentStore {
    async fn save_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let dcns = serde_json::to_string(&payment.document_control_numbers)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO payments
                 (id, created_at, envelope_id, case_reference, is_exception_record,
                  po_box, jurisdiction, service, document_control_numbers, status, status_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    payment.id.to_string(),
                    payment.created_at.to_rfc3339(),
                    payment.envelope_id.clone(),
                    payment.case_reference.clone(),
                    payment.is_exception_record as i64,
                    payment.po_box.clone(),
                    payment.jurisdiction.clone(),
                    payment.service.clone(),
                    dcns,
                    payment.status.as_str(),
                    opt_text_owned(payment.status_message.clone()),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, created_at, envelope_id, case_reference, is_exception_record,
                        po_box, jurisdiction, service, document_control_numbers, status, status_message
                 FROM payments WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_payment(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, created_at, envelope_id, case_reference, is_exception_record,
                        po_box, jurisdiction, service, document_control_numbers, status, status_message
                 FROM payments WHERE status = ?1 ORDER BY created_at",
                params![status.as_str()],
            )
            .await
            .map_err(query_err)?;
        let mut payments = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            payments.push(row_to_payment(&row).map_err(query_err)?);
        }
        Ok(payments)
    }

    async fn save_update_payment(&self, payment: &UpdatePayment) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO update_payments
                 (id, created_at, envelope_id, jurisdiction, exception_record_ref,
                  new_case_ref, status, status_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    payment.id.to_string(),
                    payment.created_at.to_rfc3339(),
                    payment.envelope_id.clone(),
                    payment.jurisdiction.clone(),
                    payment.exception_record_ref.clone(),
                    payment.new_case_ref.clone(),
                    payment.status.as_str(),
                    opt_text_owned(payment.status_message.clone()),
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn update_payment(&self, id: Uuid) -> Result<Option<UpdatePayment>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, created_at, envelope_id, jurisdiction, exception_record_ref,
                        new_case_ref, status, status_message
                 FROM update_payments WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;
        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_update_payment(&row).map_err(query_err)?)),
            None => Ok(None),
        }
    }

    async fn update_payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<UpdatePayment>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, created_at, envelope_id, jurisdiction, exception_record_ref,
                        new_case_ref, status, status_message
                 FROM update_payments WHERE status = ?1 ORDER BY created_at",
                params![status.as_str()],
            )
            .await
            .map_err(query_err)?;
        let mut payments = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            payments.push(row_to_update_payment(&row).map_err(query_err)?);
        }
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::envelope_with_payments;
    use crate::envelope::Classification;

    #[tokio::test]
    async fn payment_roundtrips_through_the_store() {
        let store = LibSqlPaymentStore::new_memory().await.unwrap();
        let envelope = envelope_with_payments(Classification::Exception, &["111", "222"]);
        let payment = Payment::new(&envelope, 42, true);

        store.save_payment(&payment).await.unwrap();
        let loaded = store.payment(payment.id).await.unwrap().unwrap();

        assert_eq!(loaded.id, payment.id);
        assert_eq!(loaded.case_reference, "42");
        assert!(loaded.is_exception_record);
        assert_eq!(loaded.document_control_numbers, vec!["111", "222"]);
        assert_eq!(loaded.status, PaymentStatus::Pending);
        assert_eq!(loaded.status_message, None);
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = LibSqlPaymentStore::new_memory().await.unwrap();
        let envelope = envelope_with_payments(Classification::Exception, &["111"]);
        let mut payment = Payment::new(&envelope, 42, false);

        store.save_payment(&payment).await.unwrap();
        payment.status = PaymentStatus::Failed;
        payment.status_message = Some("processor said no".to_string());
        store.save_payment(&payment).await.unwrap();

        let loaded = store.payment(payment.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PaymentStatus::Failed);
        assert_eq!(loaded.status_message.as_deref(), Some("processor said no"));
        assert_eq!(
            store.payments_by_status(PaymentStatus::Failed).await.unwrap().len(),
            1
        );
        assert!(
            store.payments_by_status(PaymentStatus::Pending).await.unwrap().is_empty()
        );
    }

    #[tokio::test]
    async fn update_payment_roundtrips_through_the_store() {
        let store = LibSqlPaymentStore::new_memory().await.unwrap();
        let payment = UpdatePayment::new("env-1", "MAILSCAN", "100", "200");

        store.save_update_payment(&payment).await.unwrap();
        let loaded = store.update_payment(payment.id).await.unwrap().unwrap();

        assert_eq!(loaded.exception_record_ref, "100");
        assert_eq!(loaded.new_case_ref, "200");
        assert_eq!(loaded.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn missing_rows_read_as_none() {
        let store = LibSqlPaymentStore::new_memory().await.unwrap();
        assert!(store.payment(Uuid::new_v4()).await.unwrap().is_none());
        assert!(store.update_payment(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_file_store_persists_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payments.db");

        let envelope = envelope_with_payments(Classification::Exception, &["111"]);
        let payment = Payment::new(&envelope, 7, false);
        {
            let store = LibSqlPaymentStore::new_local(&path).await.unwrap();
            store.save_payment(&payment).await.unwrap();
        }

        let store = LibSqlPaymentStore::new_local(&path).await.unwrap();
        let loaded = store.payment(payment.id).await.unwrap().unwrap();
        assert_eq!(loaded.envelope_id, payment.envelope_id);
    }
}
