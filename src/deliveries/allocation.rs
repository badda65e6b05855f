use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::directory::{UnitDirectory, UnitId};

use super::codes::CodeIssuer;
use super::domain::{next_delivery_id, Delivery, DeliveryId, DeliveryStatus, LockerId};
use super::repository::{DeliveryRepository, RepositoryError};

const CODE_COLLISION_RETRIES: usize = 5;

/// Successful reservation: the courier deposits into `locker_id` before the
/// advisory `deposit_deadline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub locker_id: LockerId,
    pub delivery_id: DeliveryId,
    pub entry_code: String,
    pub deposit_deadline: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("residence unit not found or vacant")]
    UnitNotFound,
    #[error("no locker available")]
    NoLockerAvailable,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Locker pool manager: selects a free, conflict-free locker and creates the
/// companion delivery.
pub struct LockerAllocator {
    repository: Arc<dyn DeliveryRepository>,
    directory: Arc<dyn UnitDirectory>,
    codes: Arc<dyn CodeIssuer>,
    deposit_window: Duration,
}

impl LockerAllocator {
    pub fn new(
        repository: Arc<dyn DeliveryRepository>,
        directory: Arc<dyn UnitDirectory>,
        codes: Arc<dyn CodeIssuer>,
        deposit_window: Duration,
    ) -> Self {
        Self {
            repository,
            directory,
            codes,
            deposit_window,
        }
    }

    /// Reserves the first claimable locker for the unit's occupant.
    ///
    /// Candidates are walked in ascending id order. The locker's own status
    /// flag can lag a delivery's true state under concurrent updates, so the
    /// authoritative conflict check is against the delivery ledger; the
    /// repository-level compare-and-swap then decides the race when two
    /// reservations go for the same candidate.
    pub fn reserve(&self, unit_id: &UnitId) -> Result<Reservation, AllocationError> {
        let entry = self
            .directory
            .entry(unit_id)
            .ok_or(AllocationError::UnitNotFound)?;
        let (unit, occupant) = entry.occupied().ok_or(AllocationError::UnitNotFound)?;

        let now = Utc::now();
        for candidate in self.repository.available_lockers()? {
            if self
                .repository
                .active_delivery_for_locker(&candidate.id)?
                .is_some()
            {
                continue;
            }
            if !self.repository.claim_locker(&candidate.id, now)? {
                // Lost the race for this locker; the next candidate may
                // still be free.
                continue;
            }

            let entry_code = self.fresh_entry_code()?;
            let delivery = Delivery {
                id: next_delivery_id(),
                recipient_name: occupant.name.clone(),
                address: unit.address(),
                locker_id: Some(candidate.id.clone()),
                entry_code: Some(entry_code.clone()),
                access_password: Some(self.codes.access_password()),
                registered_at: now,
                picked_up_at: None,
                status: DeliveryStatus::AwaitingLocker,
                contact_phone: Some(occupant.phone.clone()),
                notice_sent: false,
            };

            let delivery = match self.repository.insert_delivery(delivery) {
                Ok(delivery) => delivery,
                Err(err) => {
                    // Never leave an occupied locker without a delivery.
                    self.repository.release_locker(&candidate.id, Utc::now())?;
                    return Err(err.into());
                }
            };

            info!(
                locker = %candidate.id.0,
                delivery = %delivery.id.0,
                "locker reserved"
            );
            return Ok(Reservation {
                locker_id: candidate.id,
                delivery_id: delivery.id,
                entry_code,
                deposit_deadline: now + self.deposit_window,
            });
        }

        Err(AllocationError::NoLockerAvailable)
    }

    /// Administrative release; lifecycle transitions call the repository
    /// directly so their writes stay paired.
    pub fn release(&self, locker_id: &LockerId) -> Result<(), AllocationError> {
        self.repository.release_locker(locker_id, Utc::now())?;
        info!(locker = %locker_id.0, "locker released");
        Ok(())
    }

    /// Entry codes are not globally unique; regenerate a bounded number of
    /// times when the draw collides with a code on a live delivery.
    fn fresh_entry_code(&self) -> Result<String, RepositoryError> {
        let active = self.repository.active_entry_codes()?;
        let mut code = self.codes.entry_code();
        for _ in 0..CODE_COLLISION_RETRIES {
            if !active.contains(&code) {
                return Ok(code);
            }
            code = self.codes.entry_code();
        }
        warn!("entry code still colliding after retries, accepting last draw");
        Ok(code)
    }
}
