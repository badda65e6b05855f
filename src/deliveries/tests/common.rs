use std::sync::Arc;

use axum::response::Response;
use chrono::Duration;
use serde_json::Value;

use crate::deliveries::allocation::LockerAllocator;
use crate::deliveries::codes::{CodeIssuer, SeededCodeIssuer};
use crate::deliveries::lifecycle::DeliveryLifecycle;
use crate::deliveries::matcher::{
    FuzzyMatchReport, MatchCandidate, MatcherError, RecipientMatcher,
};
use crate::deliveries::memory::{
    DisabledNoticeSender, InMemoryDeliveryRepository, RecordingNoticeSender,
};
use crate::deliveries::repository::DeliveryNoticeSender;
use crate::deliveries::router::{delivery_router, DeliveryServices};
use crate::deliveries::validation::{
    RecipientQuery, RecipientValidator, ValidationPolicy, ValidationRequest,
};
use crate::deliveries::LexicalMatcher;
use crate::directory::{InMemoryUnitDirectory, UnitId};
use crate::seed;

pub(super) const DEPOSIT_WINDOW_MINUTES: i64 = 5;

/// Everything a scenario needs, sharing one repository and directory.
pub(super) struct Harness {
    pub(super) validator: RecipientValidator,
    pub(super) allocator: Arc<LockerAllocator>,
    pub(super) lifecycle: DeliveryLifecycle,
    pub(super) repository: Arc<InMemoryDeliveryRepository>,
    pub(super) notices: Arc<RecordingNoticeSender>,
}

pub(super) fn harness() -> Harness {
    harness_with_lockers(seed::LOCKER_BANK_SIZE)
}

pub(super) fn harness_with_lockers(doors: u32) -> Harness {
    let directory = Arc::new(seed::demo_directory());
    let repository = Arc::new(InMemoryDeliveryRepository::default());
    seed::seed_locker_bank(repository.as_ref(), doors).expect("seed lockers");
    let notices = Arc::new(RecordingNoticeSender::default());
    build_harness(directory, repository, notices.clone(), notices)
}

/// Same harness but with the mail hook unplugged.
pub(super) fn harness_without_mail() -> Harness {
    let directory = Arc::new(seed::demo_directory());
    let repository = Arc::new(InMemoryDeliveryRepository::default());
    seed::seed_locker_bank(repository.as_ref(), seed::LOCKER_BANK_SIZE).expect("seed lockers");
    let notices = Arc::new(RecordingNoticeSender::default());
    build_harness(directory, repository, notices, Arc::new(DisabledNoticeSender))
}

fn build_harness(
    directory: Arc<InMemoryUnitDirectory>,
    repository: Arc<InMemoryDeliveryRepository>,
    notices: Arc<RecordingNoticeSender>,
    sender: Arc<dyn DeliveryNoticeSender>,
) -> Harness {
    let codes: Arc<dyn CodeIssuer> = Arc::new(SeededCodeIssuer::new(7));
    let window = Duration::minutes(DEPOSIT_WINDOW_MINUTES);

    Harness {
        validator: RecipientValidator::new(
            directory.clone(),
            Arc::new(LexicalMatcher),
            codes.clone(),
            ValidationPolicy::default(),
        ),
        allocator: Arc::new(LockerAllocator::new(
            repository.clone(),
            directory.clone(),
            codes,
            window,
        )),
        lifecycle: DeliveryLifecycle::new(repository.clone(), directory, sender, window),
        repository,
        notices,
    }
}

pub(super) fn router() -> axum::Router {
    let harness = harness();
    delivery_router(DeliveryServices {
        validator: Arc::new(harness.validator),
        allocator: harness.allocator,
        lifecycle: Arc::new(harness.lifecycle),
    })
}

pub(super) fn maria_unit() -> UnitId {
    UnitId("unit-h-05".to_string())
}

pub(super) fn house_request(name: &str, postal_code: &str) -> ValidationRequest {
    ValidationRequest {
        claimed_name: name.to_string(),
        query: RecipientQuery::House {
            postal_code: postal_code.to_string(),
        },
    }
}

pub(super) fn apartment_request(
    name: &str,
    tower: Option<&str>,
    number: Option<&str>,
) -> ValidationRequest {
    ValidationRequest {
        claimed_name: name.to_string(),
        query: RecipientQuery::Apartment {
            tower: tower.map(str::to_string),
            number: number.map(str::to_string),
            postal_code: None,
        },
    }
}

/// Matcher stub that is always down.
pub(super) struct OfflineMatcher;

impl RecipientMatcher for OfflineMatcher {
    fn assess(
        &self,
        _claimed_name: &str,
        _reference: &str,
        _candidates: &[MatchCandidate],
    ) -> Result<FuzzyMatchReport, MatcherError> {
        Err(MatcherError::Unavailable("model endpoint offline".to_string()))
    }
}

/// Matcher stub that confidently points at a unit nobody lives in.
pub(super) struct MisdirectedMatcher;

impl RecipientMatcher for MisdirectedMatcher {
    fn assess(
        &self,
        _claimed_name: &str,
        _reference: &str,
        _candidates: &[MatchCandidate],
    ) -> Result<FuzzyMatchReport, MatcherError> {
        Ok(FuzzyMatchReport {
            matched: true,
            confidence: 99,
            matched_unit: Some(UnitId("unit-a-404".to_string())),
            reason: "stub verdict".to_string(),
            suggestions: Vec::new(),
        })
    }
}

/// Issuer that draws the same entry code forever, to force collisions.
pub(super) struct RepeatingCodeIssuer;

impl CodeIssuer for RepeatingCodeIssuer {
    fn entry_code(&self) -> String {
        "AAAAAA".to_string()
    }

    fn access_password(&self) -> String {
        "0000".to_string()
    }

    fn validation_token(&self) -> String {
        "TTTTTTTTTTTTTTTT".to_string()
    }
}

pub(super) fn validator_with_matcher(matcher: Arc<dyn RecipientMatcher>) -> RecipientValidator {
    RecipientValidator::new(
        Arc::new(seed::demo_directory()),
        matcher,
        Arc::new(SeededCodeIssuer::new(7)),
        ValidationPolicy::default(),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
