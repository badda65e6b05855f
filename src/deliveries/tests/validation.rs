use std::sync::Arc;

use super::common::*;
use crate::deliveries::validation::{ValidationInputError, ValidationResultKind};

#[test]
fn exact_house_match_returns_details_and_token() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate(&house_request("Maria Silva", "12345-678"))
        .expect("input is well formed");

    assert!(outcome.matched);
    assert_eq!(outcome.kind, ValidationResultKind::Success);
    assert!(!outcome.can_retry);
    assert!(!outcome.can_escalate);
    let details = outcome.found.expect("details returned");
    assert_eq!(details.unit_id, maria_unit());
    assert_eq!(details.address, "Rua A, House 5");
    assert_eq!(details.unit_kind, "house");
    assert!(outcome.validation_token.is_some());
}

#[test]
fn name_matching_ignores_case_and_spacing() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate(&house_request("  MARIA silva ", "12345678"))
        .expect("input is well formed");

    assert!(outcome.matched);
}

#[test]
fn unknown_house_recipient_can_retry_or_escalate() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate(&house_request("Mario Silva", "12345-678"))
        .expect("input is well formed");

    assert!(!outcome.matched);
    assert_eq!(outcome.kind, ValidationResultKind::NotFound);
    assert!(outcome.can_retry);
    assert!(outcome.can_escalate);
    assert!(outcome.validation_token.is_none());
}

#[test]
fn empty_name_is_rejected_before_lookup() {
    let harness = harness();

    let err = harness
        .validator
        .validate(&house_request("   ", "12345-678"))
        .expect_err("name is required");

    assert!(matches!(err, ValidationInputError::EmptyName));
}

#[test]
fn house_validation_requires_a_full_postal_code() {
    let harness = harness();

    let missing = harness
        .validator
        .validate(&house_request("Maria Silva", "  "))
        .expect_err("postal code is required");
    assert!(matches!(missing, ValidationInputError::MissingPostalCode));

    let short = harness
        .validator
        .validate(&house_request("Maria Silva", "1234"))
        .expect_err("postal code must be complete");
    assert!(matches!(short, ValidationInputError::InvalidPostalCode));
}

#[test]
fn apartment_match_uses_tower_and_number() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate(&apartment_request("Fernanda Lima", Some("T1"), Some("101")))
        .expect("input is well formed");

    assert!(outcome.matched);
    let details = outcome.found.expect("details returned");
    assert_eq!(details.address, "Tower T1, Apt 101");
    assert_eq!(details.unit_kind, "apartment");
}

#[test]
fn apartment_tower_comparison_is_case_insensitive() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate(&apartment_request("Fernanda Lima", Some("t1"), Some("101")))
        .expect("input is well formed");

    assert!(outcome.matched);
}

#[test]
fn apartment_without_tower_or_number_asks_for_more() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate(&apartment_request("Fernanda Lima", None, None))
        .expect("input is well formed");

    assert!(!outcome.matched);
    assert!(outcome.can_retry);
    assert!(outcome.message.contains("tower"));
}

#[test]
fn wrong_apartment_number_does_not_match() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate(&apartment_request("Fernanda Lima", Some("T1"), Some("999")))
        .expect("input is well formed");

    assert!(!outcome.matched);
}

#[test]
fn assisted_validation_absorbs_a_typo() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate_assisted(&house_request("Mariia Silva", "12345-678"))
        .expect("input is well formed");

    assert!(outcome.matched, "typo plus agreeing postal code: {outcome:?}");
    assert!(outcome.confidence >= 70);
    let details = outcome.found.expect("details returned");
    assert_eq!(details.unit_id, maria_unit());
    assert!(outcome.validation_token.is_some());
}

#[test]
fn assisted_validation_surfaces_suggestions_below_threshold() {
    let harness = harness();

    let outcome = harness
        .validator
        .validate_assisted(&house_request("Maria Santos", "99999-999"))
        .expect("input is well formed");

    assert!(!outcome.matched);
    assert!(outcome.can_escalate);
    assert!(outcome.validation_token.is_none());
}

#[test]
fn matcher_outage_degrades_to_escalation_not_error() {
    let validator = validator_with_matcher(Arc::new(OfflineMatcher));

    let outcome = validator
        .validate_assisted(&house_request("Maria Silva", "12345-678"))
        .expect("outage is absorbed");

    assert!(!outcome.matched);
    assert_eq!(outcome.confidence, 0);
    assert!(outcome.can_retry);
    assert!(outcome.can_escalate);
}

#[test]
fn matcher_verdict_for_a_vacant_unit_is_discarded() {
    let validator = validator_with_matcher(Arc::new(MisdirectedMatcher));

    let outcome = validator
        .validate_assisted(&house_request("Maria Silva", "12345-678"))
        .expect("verdict is absorbed");

    assert!(!outcome.matched);
    assert!(outcome.found.is_none());
    assert!(outcome.validation_token.is_none());
}
