//! Backend-agnostic payment persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::payments::model::{Payment, PaymentStatus, UpdatePayment};

/// Persistence for payment and update-payment rows.
///
/// `save_*` is an upsert: the creation path writes each row twice (once
/// `Pending`, once terminal).
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn save_payment(&self, payment: &Payment) -> Result<(), StoreError>;

    async fn payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn save_update_payment(&self, payment: &UpdatePayment) -> Result<(), StoreError>;

    async fn update_payment(&self, id: Uuid) -> Result<Option<UpdatePayment>, StoreError>;

    async fn update_payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<UpdatePayment>, StoreError>;
}
