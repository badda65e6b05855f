use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::directory::{
    normalize_name, normalize_postal_code, Occupant, ResidenceUnit, UnitDirectory, UnitId,
    UnitKind,
};

use super::codes::CodeIssuer;
use super::matcher::{MatchCandidate, MatchSuggestion, RecipientMatcher};

/// Address reference accompanying a claimed recipient name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit_type", rename_all = "snake_case")]
pub enum RecipientQuery {
    House {
        postal_code: String,
    },
    Apartment {
        tower: Option<String>,
        number: Option<String>,
        /// Optional; only forwarded to the fuzzy matcher, and only when the
        /// apartment-postal-reference dial is on.
        postal_code: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub claimed_name: String,
    #[serde(flatten)]
    pub query: RecipientQuery,
}

/// Input problems reported to the caller before any lookup happens.
#[derive(Debug, thiserror::Error)]
pub enum ValidationInputError {
    #[error("recipient name is required")]
    EmptyName,
    #[error("postal code is required for house validation")]
    MissingPostalCode,
    #[error("postal code must contain exactly 8 digits")]
    InvalidPostalCode,
}

/// Mutually exclusive outcome kinds, ordered by decreasing confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationResultKind {
    Success,
    NotFound,
}

/// Contact data returned on a successful match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientDetails {
    pub occupant_name: String,
    pub contact_phone: String,
    pub unit_kind: &'static str,
    pub address: String,
    pub postal_code: Option<String>,
    pub unit_id: UnitId,
    pub occupant_id: String,
}

impl RecipientDetails {
    fn from_entry(unit: &ResidenceUnit, occupant: &Occupant) -> Self {
        Self {
            occupant_name: occupant.name.clone(),
            contact_phone: occupant.phone.clone(),
            unit_kind: unit.kind_label(),
            address: unit.address(),
            postal_code: unit.postal_code().map(str::to_string),
            unit_id: unit.id.clone(),
            occupant_id: occupant.id.0.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub matched: bool,
    pub kind: ValidationResultKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<RecipientDetails>,
    pub can_retry: bool,
    pub can_escalate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_token: Option<String>,
}

/// Agent-assisted outcome: the exact-match shape plus confidence and
/// alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistedValidationOutcome {
    pub matched: bool,
    pub confidence: u8,
    pub kind: ValidationResultKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<RecipientDetails>,
    pub suggestions: Vec<MatchSuggestion>,
    pub can_retry: bool,
    pub can_escalate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_token: Option<String>,
}

/// Policy dials for validation behavior.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    /// Minimum matcher confidence accepted as a validated recipient.
    pub confidence_threshold: u8,
    /// Forward an apartment's optional postal code to the matcher.
    pub apartment_postal_reference: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 70,
            apartment_postal_reference: false,
        }
    }
}

/// Matches claimed recipients against the unit directory. Pure read plus
/// delegation; no state is persisted here.
pub struct RecipientValidator {
    directory: Arc<dyn UnitDirectory>,
    matcher: Arc<dyn RecipientMatcher>,
    codes: Arc<dyn CodeIssuer>,
    policy: ValidationPolicy,
}

impl RecipientValidator {
    pub fn new(
        directory: Arc<dyn UnitDirectory>,
        matcher: Arc<dyn RecipientMatcher>,
        codes: Arc<dyn CodeIssuer>,
        policy: ValidationPolicy,
    ) -> Self {
        Self {
            directory,
            matcher,
            codes,
            policy,
        }
    }

    /// Exact-match validation.
    pub fn validate(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationOutcome, ValidationInputError> {
        let claimed = normalize_name(&request.claimed_name);
        if claimed.is_empty() {
            return Err(ValidationInputError::EmptyName);
        }

        match &request.query {
            RecipientQuery::House { postal_code } => {
                if postal_code.trim().is_empty() {
                    return Err(ValidationInputError::MissingPostalCode);
                }
                let wanted = normalize_postal_code(postal_code);
                if wanted.len() != 8 {
                    return Err(ValidationInputError::InvalidPostalCode);
                }
                Ok(self.match_house(&claimed, &wanted))
            }
            RecipientQuery::Apartment { tower, number, .. } => {
                let tower = tower.as_deref().map(str::trim).unwrap_or("");
                let number = number.as_deref().map(str::trim).unwrap_or("");
                if tower.is_empty() && number.is_empty() {
                    return Ok(ValidationOutcome {
                        matched: false,
                        kind: ValidationResultKind::NotFound,
                        message: "Provide the tower and apartment number for a precise validation."
                            .to_string(),
                        found: None,
                        can_retry: true,
                        can_escalate: true,
                        validation_token: None,
                    });
                }
                Ok(self.match_apartment(&claimed, tower, number))
            }
        }
    }

    fn match_house(&self, claimed: &str, wanted_postal: &str) -> ValidationOutcome {
        let hit = self.directory.entries().into_iter().find_map(|entry| {
            let (unit, occupant) = entry.occupied()?;
            let postal = unit.postal_code()?;
            (normalize_postal_code(postal) == wanted_postal
                && normalize_name(&occupant.name) == claimed)
                .then(|| RecipientDetails::from_entry(unit, occupant))
        });

        match hit {
            Some(details) => self.success_outcome(details),
            None => not_found_outcome(),
        }
    }

    fn match_apartment(&self, claimed: &str, tower: &str, number: &str) -> ValidationOutcome {
        let hit = self.directory.entries().into_iter().find_map(|entry| {
            let (unit, occupant) = entry.occupied()?;
            let UnitKind::Apartment {
                tower: unit_tower,
                apartment_number,
            } = &unit.kind
            else {
                return None;
            };

            let name_matches = normalize_name(&occupant.name) == claimed;
            let tower_matches =
                tower.is_empty() || unit_tower.trim().eq_ignore_ascii_case(tower);
            let number_matches =
                number.is_empty() || apartment_number.trim().eq_ignore_ascii_case(number);

            (name_matches && tower_matches && number_matches)
                .then(|| RecipientDetails::from_entry(unit, occupant))
        });

        match hit {
            Some(details) => self.success_outcome(details),
            None => not_found_outcome(),
        }
    }

    fn success_outcome(&self, details: RecipientDetails) -> ValidationOutcome {
        info!(unit = %details.unit_id.0, "recipient validated");
        ValidationOutcome {
            matched: true,
            kind: ValidationResultKind::Success,
            message: "Recipient validated. Proceed with the delivery.".to_string(),
            found: Some(details),
            can_retry: false,
            can_escalate: false,
            validation_token: Some(self.codes.validation_token()),
        }
    }

    /// Agent-assisted validation: delegates to the fuzzy matcher over the
    /// full candidate list; collaborator failures degrade to an unresolved
    /// outcome instead of propagating.
    pub fn validate_assisted(
        &self,
        request: &ValidationRequest,
    ) -> Result<AssistedValidationOutcome, ValidationInputError> {
        if normalize_name(&request.claimed_name).is_empty() {
            return Err(ValidationInputError::EmptyName);
        }

        let reference = self.reference_for(&request.query);
        let candidates = self.candidates();

        let report = match self
            .matcher
            .assess(&request.claimed_name, &reference, &candidates)
        {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "recipient matcher unavailable, degrading to not-found");
                return Ok(unresolved_assisted(
                    0,
                    format!("matching service unavailable: {err}"),
                    Vec::new(),
                ));
            }
        };

        if report.matched && report.confidence >= self.policy.confidence_threshold {
            if let Some(entry) = report
                .matched_unit
                .as_ref()
                .and_then(|unit_id| self.directory.entry(unit_id))
            {
                if let Some((unit, occupant)) = entry.occupied() {
                    let details = RecipientDetails::from_entry(unit, occupant);
                    info!(
                        unit = %details.unit_id.0,
                        confidence = report.confidence,
                        "recipient validated by matcher"
                    );
                    return Ok(AssistedValidationOutcome {
                        matched: true,
                        confidence: report.confidence,
                        kind: ValidationResultKind::Success,
                        message: format!(
                            "Recipient validated (confidence {}%): {}",
                            report.confidence, report.reason
                        ),
                        found: Some(details),
                        suggestions: Vec::new(),
                        can_retry: false,
                        can_escalate: false,
                        validation_token: Some(self.codes.validation_token()),
                    });
                }
            }

            // Matched unit id does not resolve to an occupied unit; treat the
            // report as malformed collaborator output.
            warn!(?report.matched_unit, "matcher pointed at an unknown or vacant unit");
            return Ok(unresolved_assisted(
                0,
                "matcher result did not resolve to a registered occupant".to_string(),
                Vec::new(),
            ));
        }

        Ok(unresolved_assisted(
            report.confidence,
            "Recipient not confidently identified.".to_string(),
            report.suggestions,
        ))
    }

    fn reference_for(&self, query: &RecipientQuery) -> String {
        match query {
            RecipientQuery::House { postal_code } => postal_code.clone(),
            RecipientQuery::Apartment {
                tower,
                number,
                postal_code,
            } => {
                let mut reference = format!(
                    "{} {}",
                    tower.as_deref().unwrap_or(""),
                    number.as_deref().unwrap_or("")
                );
                if self.policy.apartment_postal_reference {
                    if let Some(postal) = postal_code {
                        reference.push(' ');
                        reference.push_str(postal);
                    }
                }
                reference.trim().to_string()
            }
        }
    }

    fn candidates(&self) -> Vec<MatchCandidate> {
        self.directory
            .entries()
            .into_iter()
            .filter_map(|entry| {
                let (unit, occupant) = entry.occupied()?;
                Some(MatchCandidate {
                    unit_id: unit.id.clone(),
                    occupant_name: occupant.name.clone(),
                    postal_code: unit
                        .postal_code()
                        .map(normalize_postal_code)
                        .unwrap_or_default(),
                    address: unit.address(),
                })
            })
            .collect()
    }
}

fn not_found_outcome() -> ValidationOutcome {
    ValidationOutcome {
        matched: false,
        kind: ValidationResultKind::NotFound,
        message: "Recipient not found. You may retry or escalate to the front desk.".to_string(),
        found: None,
        can_retry: true,
        can_escalate: true,
        validation_token: None,
    }
}

fn unresolved_assisted(
    confidence: u8,
    message: String,
    suggestions: Vec<MatchSuggestion>,
) -> AssistedValidationOutcome {
    AssistedValidationOutcome {
        matched: false,
        confidence,
        kind: ValidationResultKind::NotFound,
        message,
        found: None,
        suggestions,
        can_retry: true,
        can_escalate: true,
        validation_token: None,
    }
}
