use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Delivery, DeliveryId, DeliveryStatus, Locker, LockerId};

/// Storage abstraction over the locker bank and the delivery ledger.
///
/// Lockers and deliveries live behind one trait because every
/// locker-state-changing write travels with a companion delivery write; the
/// implementation is expected to make [`claim_locker`](Self::claim_locker) a
/// compare-and-swap so that concurrent reservations serialize per locker.
pub trait DeliveryRepository: Send + Sync {
    fn add_locker(&self, locker: Locker) -> Result<(), RepositoryError>;

    fn locker(&self, id: &LockerId) -> Result<Option<Locker>, RepositoryError>;

    /// Lockers currently `Available`, ascending id order.
    fn available_lockers(&self) -> Result<Vec<Locker>, RepositoryError>;

    /// Atomically flips the locker from `Available` to `Occupied` and stamps
    /// `last_opened_at`. Returns `false` when the locker is no longer
    /// available — the caller lost the race and must move on.
    fn claim_locker(
        &self,
        id: &LockerId,
        opened_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Returns the locker to `Available` and stamps `last_closed_at`.
    fn release_locker(
        &self,
        id: &LockerId,
        closed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Stamps `last_closed_at` without changing the status; used when the
    /// courier shuts the door but the parcel stays inside.
    fn stamp_locker_closed(
        &self,
        id: &LockerId,
        closed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery, RepositoryError>;

    /// Atomic counterpart of [`claim_locker`](Self::claim_locker) for
    /// delivery rows: applies `mutate` only while the row still holds
    /// `expected`. Every status flip goes through this, so a caller
    /// working from a stale snapshot loses instead of writing it back.
    fn transition_delivery(
        &self,
        id: &DeliveryId,
        expected: DeliveryStatus,
        mutate: &dyn Fn(&mut Delivery),
    ) -> Result<DeliveryTransition, RepositoryError>;

    fn delivery(&self, id: &DeliveryId) -> Result<Option<Delivery>, RepositoryError>;

    /// The authoritative conflict check for allocation: any delivery in a
    /// non-terminal state still referencing the locker.
    fn active_delivery_for_locker(
        &self,
        id: &LockerId,
    ) -> Result<Option<Delivery>, RepositoryError>;

    /// Entry codes on non-terminal deliveries, for the collision guard.
    fn active_entry_codes(&self) -> Result<Vec<String>, RepositoryError>;

    fn deliveries_in_status(
        &self,
        status: DeliveryStatus,
    ) -> Result<Vec<Delivery>, RepositoryError>;

    /// Delivery history for a normalized recipient name, newest first.
    fn deliveries_for_recipient(
        &self,
        normalized_name: &str,
    ) -> Result<Vec<Delivery>, RepositoryError>;
}

/// Outcome of a delivery compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTransition {
    /// The row still held the expected status; the mutation is committed.
    Applied(Delivery),
    /// Another transition won in the meantime; carries the current row so
    /// the caller can report what it actually found.
    Superseded(Delivery),
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound mail hook carrying the locker credentials to the resident.
pub trait DeliveryNoticeSender: Send + Sync {
    fn send_locker_notice(&self, notice: &LockerNotice) -> Result<(), NoticeError>;
}

/// Payload for the pickup notification e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerNotice {
    pub recipient_name: String,
    pub email: String,
    pub locker_number: String,
    pub access_password: String,
    pub entry_code: String,
}

/// Notice dispatch error. Always degraded to `notice_sent = false`, never
/// propagated out of a lifecycle transition.
#[derive(Debug, thiserror::Error)]
pub enum NoticeError {
    #[error("mail transport not configured")]
    NotConfigured,
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}
