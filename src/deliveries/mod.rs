//! Package delivery coordination: recipient validation, locker allocation,
//! and the storage/pickup lifecycle for a condominium locker bank.

pub mod allocation;
pub mod codes;
pub mod domain;
pub mod lifecycle;
pub mod matcher;
pub mod memory;
pub mod repository;
pub mod router;
pub mod validation;

#[cfg(test)]
mod tests;

pub use allocation::{AllocationError, LockerAllocator, Reservation};
pub use codes::{CodeIssuer, SeededCodeIssuer, SystemCodeIssuer};
pub use domain::{Delivery, DeliveryId, DeliveryStatus, Locker, LockerId, LockerStatus};
pub use lifecycle::{
    ClosureReceipt, DeliveryLifecycle, EscalationReceipt, LifecycleError, PickupReceipt,
};
pub use matcher::{
    FuzzyMatchReport, LexicalMatcher, MatchCandidate, MatchSuggestion, MatcherError,
    RecipientMatcher,
};
pub use memory::{DisabledNoticeSender, InMemoryDeliveryRepository, RecordingNoticeSender};
pub use repository::{
    DeliveryNoticeSender, DeliveryRepository, DeliveryTransition, LockerNotice, NoticeError,
    RepositoryError,
};
pub use router::{delivery_router, DeliveryServices};
pub use validation::{
    AssistedValidationOutcome, RecipientDetails, RecipientQuery, RecipientValidator,
    ValidationInputError, ValidationOutcome, ValidationPolicy, ValidationRequest,
    ValidationResultKind,
};
