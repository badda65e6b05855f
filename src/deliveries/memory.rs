use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::directory::normalize_name;

use super::domain::{Delivery, DeliveryId, DeliveryStatus, Locker, LockerId, LockerStatus};
use super::repository::{
    DeliveryNoticeSender, DeliveryRepository, DeliveryTransition, LockerNotice, NoticeError,
    RepositoryError,
};

/// Mutex-backed repository. One lock covers both tables, which is what makes
/// `claim_locker` an atomic check-and-flip relative to every other write.
#[derive(Default, Clone)]
pub struct InMemoryDeliveryRepository {
    inner: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    lockers: BTreeMap<LockerId, Locker>,
    deliveries: BTreeMap<DeliveryId, Delivery>,
}

impl InMemoryDeliveryRepository {
    /// Test/diagnostic helper: full snapshot of the locker bank.
    pub fn lockers(&self) -> Vec<Locker> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        tables.lockers.values().cloned().collect()
    }
}

impl DeliveryRepository for InMemoryDeliveryRepository {
    fn add_locker(&self, locker: Locker) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().expect("repository mutex poisoned");
        if tables.lockers.contains_key(&locker.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.lockers.insert(locker.id.clone(), locker);
        Ok(())
    }

    fn locker(&self, id: &LockerId) -> Result<Option<Locker>, RepositoryError> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        Ok(tables.lockers.get(id).cloned())
    }

    fn available_lockers(&self) -> Result<Vec<Locker>, RepositoryError> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        Ok(tables
            .lockers
            .values()
            .filter(|locker| locker.status == LockerStatus::Available)
            .cloned()
            .collect())
    }

    fn claim_locker(
        &self,
        id: &LockerId,
        opened_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.inner.lock().expect("repository mutex poisoned");
        let locker = tables.lockers.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if locker.status != LockerStatus::Available {
            return Ok(false);
        }
        locker.status = LockerStatus::Occupied;
        locker.last_opened_at = Some(opened_at);
        Ok(true)
    }

    fn release_locker(
        &self,
        id: &LockerId,
        closed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().expect("repository mutex poisoned");
        let locker = tables.lockers.get_mut(id).ok_or(RepositoryError::NotFound)?;
        locker.status = LockerStatus::Available;
        locker.last_closed_at = Some(closed_at);
        Ok(())
    }

    fn stamp_locker_closed(
        &self,
        id: &LockerId,
        closed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.lock().expect("repository mutex poisoned");
        let locker = tables.lockers.get_mut(id).ok_or(RepositoryError::NotFound)?;
        locker.last_closed_at = Some(closed_at);
        Ok(())
    }

    fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery, RepositoryError> {
        let mut tables = self.inner.lock().expect("repository mutex poisoned");
        if tables.deliveries.contains_key(&delivery.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.deliveries.insert(delivery.id.clone(), delivery.clone());
        Ok(delivery)
    }

    fn transition_delivery(
        &self,
        id: &DeliveryId,
        expected: DeliveryStatus,
        mutate: &dyn Fn(&mut Delivery),
    ) -> Result<DeliveryTransition, RepositoryError> {
        let mut tables = self.inner.lock().expect("repository mutex poisoned");
        let delivery = tables
            .deliveries
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if delivery.status != expected {
            return Ok(DeliveryTransition::Superseded(delivery.clone()));
        }
        mutate(delivery);
        Ok(DeliveryTransition::Applied(delivery.clone()))
    }

    fn delivery(&self, id: &DeliveryId) -> Result<Option<Delivery>, RepositoryError> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        Ok(tables.deliveries.get(id).cloned())
    }

    fn active_delivery_for_locker(
        &self,
        id: &LockerId,
    ) -> Result<Option<Delivery>, RepositoryError> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        Ok(tables
            .deliveries
            .values()
            .find(|delivery| {
                delivery.locker_id.as_ref() == Some(id) && !delivery.status.is_terminal()
            })
            .cloned())
    }

    fn active_entry_codes(&self) -> Result<Vec<String>, RepositoryError> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        Ok(tables
            .deliveries
            .values()
            .filter(|delivery| !delivery.status.is_terminal())
            .filter_map(|delivery| delivery.entry_code.clone())
            .collect())
    }

    fn deliveries_in_status(
        &self,
        status: DeliveryStatus,
    ) -> Result<Vec<Delivery>, RepositoryError> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        Ok(tables
            .deliveries
            .values()
            .filter(|delivery| delivery.status == status)
            .cloned()
            .collect())
    }

    fn deliveries_for_recipient(
        &self,
        normalized_name: &str,
    ) -> Result<Vec<Delivery>, RepositoryError> {
        let tables = self.inner.lock().expect("repository mutex poisoned");
        let mut matches: Vec<Delivery> = tables
            .deliveries
            .values()
            .filter(|delivery| normalize_name(&delivery.recipient_name) == normalized_name)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        Ok(matches)
    }
}

/// Sender used when no mail transport is configured; closures proceed with
/// `notice_sent = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNoticeSender;

impl DeliveryNoticeSender for DisabledNoticeSender {
    fn send_locker_notice(&self, _notice: &LockerNotice) -> Result<(), NoticeError> {
        Err(NoticeError::NotConfigured)
    }
}

/// Captures notices so tests and the demo can assert what would have been
/// mailed.
#[derive(Default, Clone)]
pub struct RecordingNoticeSender {
    sent: Arc<Mutex<Vec<LockerNotice>>>,
}

impl RecordingNoticeSender {
    pub fn sent(&self) -> Vec<LockerNotice> {
        self.sent.lock().expect("notice mutex poisoned").clone()
    }
}

impl DeliveryNoticeSender for RecordingNoticeSender {
    fn send_locker_notice(&self, notice: &LockerNotice) -> Result<(), NoticeError> {
        self.sent
            .lock()
            .expect("notice mutex poisoned")
            .push(notice.clone());
        Ok(())
    }
}
