use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for deliveries. Also doubles as the front-desk case id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeliveryId(pub String);

/// Locker identifiers are zero-padded strings; their `Ord` is the
/// ascending selection order used by the allocator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockerId(pub String);

static DELIVERY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_delivery_id() -> DeliveryId {
    let id = DELIVERY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DeliveryId(format!("dlv-{id:06}"))
}

/// A physical storage compartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locker {
    pub id: LockerId,
    pub status: LockerStatus,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub last_closed_at: Option<DateTime<Utc>>,
}

impl Locker {
    pub fn available(id: LockerId) -> Self {
        Self {
            id,
            status: LockerStatus::Available,
            last_opened_at: None,
            last_closed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockerStatus {
    Available,
    Occupied,
    UnderMaintenance,
    Unavailable,
}

impl LockerStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LockerStatus::Available => "available",
            LockerStatus::Occupied => "occupied",
            LockerStatus::UnderMaintenance => "under_maintenance",
            LockerStatus::Unavailable => "unavailable",
        }
    }
}

/// Tracked record of one parcel from registration to pickup or escalation.
/// Historical: rows are only ever appended and transitioned, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    /// Free-text recipient name as the courier declared it; matched against
    /// occupant names in normalized form.
    pub recipient_name: String,
    pub address: String,
    pub locker_id: Option<LockerId>,
    /// Human-facing tracking code.
    pub entry_code: Option<String>,
    /// Locker-opening secret shared with the resident.
    pub access_password: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub status: DeliveryStatus,
    pub contact_phone: Option<String>,
    pub notice_sent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    AwaitingValidation,
    AwaitingLocker,
    Stored,
    Retrieved,
    ValidationFailed,
    RedirectedFrontDesk,
}

impl DeliveryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryStatus::AwaitingValidation => "awaiting_validation",
            DeliveryStatus::AwaitingLocker => "awaiting_locker",
            DeliveryStatus::Stored => "stored",
            DeliveryStatus::Retrieved => "retrieved",
            DeliveryStatus::ValidationFailed => "validation_failed",
            DeliveryStatus::RedirectedFrontDesk => "redirected_front_desk",
        }
    }

    /// Terminal states release their locker and accept no further
    /// transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Retrieved
                | DeliveryStatus::ValidationFailed
                | DeliveryStatus::RedirectedFrontDesk
        )
    }

    /// The single source of truth for lifecycle edges. Everything the engine
    /// does funnels through this table.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match self {
            AwaitingValidation => {
                matches!(next, AwaitingLocker | ValidationFailed | RedirectedFrontDesk)
            }
            AwaitingLocker => matches!(next, Stored | ValidationFailed | RedirectedFrontDesk),
            Stored => matches!(next, Retrieved),
            Retrieved | ValidationFailed | RedirectedFrontDesk => false,
        }
    }
}
