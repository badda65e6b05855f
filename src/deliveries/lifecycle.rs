use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::directory::{normalize_name, OccupantId, UnitDirectory};

use super::domain::{next_delivery_id, Delivery, DeliveryId, DeliveryStatus};
use super::repository::{
    DeliveryNoticeSender, DeliveryRepository, DeliveryTransition, LockerNotice, RepositoryError,
};

/// Returned by `confirm_closure`: everything the courier app shows before
/// walking away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosureReceipt {
    pub delivery_id: DeliveryId,
    pub entry_code: String,
    pub access_password: String,
    pub registered_at: DateTime<Utc>,
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupReceipt {
    pub delivery_id: DeliveryId,
    pub picked_up_at: DateTime<Utc>,
}

/// Front-desk escalation protocol entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationReceipt {
    pub case_id: DeliveryId,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("delivery not found")]
    NotFound,
    #[error("operation not valid: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The delivery state machine engine. Owns every status mutation; edges are
/// checked against [`DeliveryStatus::can_transition_to`] up front and then
/// committed through the repository compare-and-swap, so a snapshot that
/// went stale between the check and the write is rejected instead of
/// clobbering a newer status.
pub struct DeliveryLifecycle {
    repository: Arc<dyn DeliveryRepository>,
    directory: Arc<dyn UnitDirectory>,
    notices: Arc<dyn DeliveryNoticeSender>,
    deposit_window: Duration,
}

impl DeliveryLifecycle {
    pub fn new(
        repository: Arc<dyn DeliveryRepository>,
        directory: Arc<dyn UnitDirectory>,
        notices: Arc<dyn DeliveryNoticeSender>,
        deposit_window: Duration,
    ) -> Self {
        Self {
            repository,
            directory,
            notices,
            deposit_window,
        }
    }

    /// The courier shut the locker door: the parcel is now stored. The
    /// locker stays occupied until pickup; the resident is notified on a
    /// best-effort basis.
    pub fn confirm_closure(&self, id: &DeliveryId) -> Result<ClosureReceipt, LifecycleError> {
        let snapshot = self
            .repository
            .delivery(id)?
            .ok_or(LifecycleError::NotFound)?;

        if !snapshot.status.can_transition_to(DeliveryStatus::Stored) {
            return Err(LifecycleError::InvalidState {
                expected: DeliveryStatus::AwaitingLocker.label(),
                found: snapshot.status.label(),
            });
        }
        let locker_id = snapshot.locker_id.clone().ok_or(LifecycleError::InvalidState {
            expected: "a delivery with a reserved locker",
            found: "no locker reference",
        })?;

        // The repository CAS decides ties: of two concurrent closures, or a
        // closure racing the expiry sweep, exactly one commits this edge.
        let delivery = match self.repository.transition_delivery(
            id,
            DeliveryStatus::AwaitingLocker,
            &|delivery| delivery.status = DeliveryStatus::Stored,
        )? {
            DeliveryTransition::Applied(delivery) => delivery,
            DeliveryTransition::Superseded(current) => {
                return Err(LifecycleError::InvalidState {
                    expected: DeliveryStatus::AwaitingLocker.label(),
                    found: current.status.label(),
                });
            }
        };
        self.repository.stamp_locker_closed(&locker_id, Utc::now())?;

        let notified = self.try_notify(&delivery, &locker_id.0);
        if notified {
            // Metadata only; if a pickup races past first the flag is
            // dropped rather than letting a stale row come back.
            self.repository.transition_delivery(
                id,
                DeliveryStatus::Stored,
                &|delivery| delivery.notice_sent = true,
            )?;
        }

        info!(delivery = %delivery.id.0, locker = %locker_id.0, notified, "closure confirmed");
        Ok(ClosureReceipt {
            delivery_id: delivery.id,
            entry_code: delivery.entry_code.unwrap_or_default(),
            access_password: delivery.access_password.unwrap_or_default(),
            registered_at: delivery.registered_at,
            notified,
        })
    }

    /// The resident collected the parcel: terminal state, locker freed.
    pub fn confirm_pickup(&self, id: &DeliveryId) -> Result<PickupReceipt, LifecycleError> {
        let snapshot = self
            .repository
            .delivery(id)?
            .ok_or(LifecycleError::NotFound)?;

        if !snapshot.status.can_transition_to(DeliveryStatus::Retrieved) {
            return Err(LifecycleError::InvalidState {
                expected: DeliveryStatus::Stored.label(),
                found: snapshot.status.label(),
            });
        }

        let picked_up_at = Utc::now();
        let delivery = match self.repository.transition_delivery(
            id,
            DeliveryStatus::Stored,
            &|delivery| {
                delivery.status = DeliveryStatus::Retrieved;
                delivery.picked_up_at = Some(picked_up_at);
            },
        )? {
            DeliveryTransition::Applied(delivery) => delivery,
            DeliveryTransition::Superseded(current) => {
                return Err(LifecycleError::InvalidState {
                    expected: DeliveryStatus::Stored.label(),
                    found: current.status.label(),
                });
            }
        };

        // Only the transition winner frees the door.
        if let Some(locker_id) = &delivery.locker_id {
            self.repository.release_locker(locker_id, picked_up_at)?;
        }

        info!(delivery = %delivery.id.0, "pickup confirmed");
        Ok(PickupReceipt {
            delivery_id: delivery.id,
            picked_up_at,
        })
    }

    /// Registers a delivery that goes straight to human staff: terminal from
    /// birth, no locker involved, independent of prior validation attempts.
    pub fn escalate_front_desk(
        &self,
        recipient_name: &str,
        postal_code: &str,
    ) -> Result<EscalationReceipt, LifecycleError> {
        let registered_at = Utc::now();
        let delivery = Delivery {
            id: next_delivery_id(),
            recipient_name: recipient_name.to_string(),
            address: format!("Postal code {postal_code}"),
            locker_id: None,
            entry_code: None,
            access_password: None,
            registered_at,
            picked_up_at: None,
            status: DeliveryStatus::RedirectedFrontDesk,
            contact_phone: None,
            notice_sent: false,
        };
        let delivery = self.repository.insert_delivery(delivery)?;

        info!(case = %delivery.id.0, "front desk escalation registered");
        Ok(EscalationReceipt {
            case_id: delivery.id,
            registered_at,
        })
    }

    /// Delivery history for a recipient name, newest first.
    pub fn history_for_recipient(
        &self,
        recipient_name: &str,
    ) -> Result<Vec<Delivery>, LifecycleError> {
        Ok(self
            .repository
            .deliveries_for_recipient(&normalize_name(recipient_name))?)
    }

    /// Delivery history keyed by occupant id.
    pub fn history_for_occupant(
        &self,
        occupant_id: &OccupantId,
    ) -> Result<Vec<Delivery>, LifecycleError> {
        let occupant = self
            .directory
            .occupant(occupant_id)
            .ok_or(LifecycleError::NotFound)?;
        self.history_for_recipient(&occupant.name)
    }

    /// Sweep for reservations whose deposit window lapsed without a closure:
    /// the locker returns to the pool and the delivery terminates as a
    /// validation failure. Returns the ids of expired deliveries.
    pub fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<DeliveryId>, LifecycleError> {
        let mut expired = Vec::new();
        for delivery in self
            .repository
            .deliveries_in_status(DeliveryStatus::AwaitingLocker)?
        {
            if delivery.registered_at + self.deposit_window > now {
                continue;
            }
            // Re-checked under the repository lock: a closure that stored the
            // parcel after this snapshot wins, and the door stays shut.
            let failed = match self.repository.transition_delivery(
                &delivery.id,
                DeliveryStatus::AwaitingLocker,
                &|delivery| delivery.status = DeliveryStatus::ValidationFailed,
            )? {
                DeliveryTransition::Applied(failed) => failed,
                DeliveryTransition::Superseded(_) => continue,
            };
            if let Some(locker_id) = &failed.locker_id {
                self.repository.release_locker(locker_id, now)?;
            }
            warn!(delivery = %failed.id.0, "deposit window lapsed, reservation released");
            expired.push(failed.id);
        }
        Ok(expired)
    }

    fn try_notify(&self, delivery: &Delivery, locker_number: &str) -> bool {
        let Some(occupant) = self
            .directory
            .occupant_by_name(&normalize_name(&delivery.recipient_name))
        else {
            warn!(recipient = %delivery.recipient_name, "no occupant for notification lookup");
            return false;
        };
        let Some(email) = occupant.email else {
            warn!(recipient = %delivery.recipient_name, "occupant has no e-mail on file");
            return false;
        };

        let notice = LockerNotice {
            recipient_name: occupant.name,
            email,
            locker_number: locker_number.to_string(),
            access_password: delivery.access_password.clone().unwrap_or_default(),
            entry_code: delivery.entry_code.clone().unwrap_or_default(),
        };

        match self.notices.send_locker_notice(&notice) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "locker notice not delivered");
                false
            }
        }
    }
}
