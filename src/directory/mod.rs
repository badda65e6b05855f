//! Residence-unit directory: the read-only lookup target for recipient
//! validation. Units are a tagged variant (house vs apartment) with the
//! shared fields lifted to [`ResidenceUnit`], so matching logic can switch
//! exhaustively on the kind instead of downcasting.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for residence units.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

/// Identifier wrapper for occupants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OccupantId(pub String);

/// Identifier wrapper for condominiums.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CondominiumId(pub String);

/// Top-level property grouping. A condominium is either a house development
/// or an apartment complex; its units follow the corresponding kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condominium {
    pub id: CondominiumId,
    pub name: String,
    pub kind: CondominiumKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondominiumKind {
    Houses,
    Apartments,
}

/// One house or apartment. Immutable after registration except for the
/// occupant link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidenceUnit {
    pub id: UnitId,
    pub condominium_id: CondominiumId,
    pub kind: UnitKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit_kind", rename_all = "snake_case")]
pub enum UnitKind {
    House {
        street: String,
        house_number: u32,
        postal_code: String,
    },
    Apartment {
        tower: String,
        apartment_number: String,
    },
}

impl ResidenceUnit {
    /// Human-facing address string stamped onto deliveries.
    pub fn address(&self) -> String {
        match &self.kind {
            UnitKind::House {
                street,
                house_number,
                ..
            } => format!("{street}, House {house_number}"),
            UnitKind::Apartment {
                tower,
                apartment_number,
            } => format!("Tower {tower}, Apt {apartment_number}"),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            UnitKind::House { .. } => "house",
            UnitKind::Apartment { .. } => "apartment",
        }
    }

    /// Postal code for houses; apartments carry none of their own.
    pub fn postal_code(&self) -> Option<&str> {
        match &self.kind {
            UnitKind::House { postal_code, .. } => Some(postal_code),
            UnitKind::Apartment { .. } => None,
        }
    }
}

/// A resident linked to at most one unit; the recipient-matching target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub id: OccupantId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub condominium_id: CondominiumId,
    pub unit_id: Option<UnitId>,
}

/// A unit together with its occupant, as the validator consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub unit: ResidenceUnit,
    pub occupant: Option<Occupant>,
}

impl DirectoryEntry {
    pub fn occupied(&self) -> Option<(&ResidenceUnit, &Occupant)> {
        self.occupant.as_ref().map(|occupant| (&self.unit, occupant))
    }
}

/// Lowercased, trimmed form used for every name comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Digits-only form used for every postal-code comparison.
pub fn normalize_postal_code(postal_code: &str) -> String {
    postal_code.chars().filter(char::is_ascii_digit).collect()
}

/// Read abstraction over the registered units so validation and notification
/// can be exercised against fixtures.
pub trait UnitDirectory: Send + Sync {
    /// Every registered unit, occupied or not.
    fn entries(&self) -> Vec<DirectoryEntry>;

    fn entry(&self, id: &UnitId) -> Option<DirectoryEntry>;

    fn occupant(&self, id: &OccupantId) -> Option<Occupant>;

    /// First occupant whose normalized name equals the given normalized name.
    fn occupant_by_name(&self, normalized_name: &str) -> Option<Occupant> {
        self.entries().into_iter().find_map(|entry| {
            entry
                .occupant
                .filter(|occupant| normalize_name(&occupant.name) == normalized_name)
        })
    }
}

/// Mutex-backed directory used by the server, the demo, and tests.
#[derive(Default, Clone)]
pub struct InMemoryUnitDirectory {
    inner: Arc<Mutex<DirectoryTables>>,
}

#[derive(Default)]
struct DirectoryTables {
    condominiums: BTreeMap<String, Condominium>,
    units: BTreeMap<UnitId, ResidenceUnit>,
    occupants: BTreeMap<OccupantId, Occupant>,
}

impl InMemoryUnitDirectory {
    pub fn register_condominium(&self, condominium: Condominium) {
        let mut tables = self.inner.lock().expect("directory mutex poisoned");
        tables
            .condominiums
            .insert(condominium.id.0.clone(), condominium);
    }

    pub fn register_unit(&self, unit: ResidenceUnit) {
        let mut tables = self.inner.lock().expect("directory mutex poisoned");
        tables.units.insert(unit.id.clone(), unit);
    }

    pub fn register_occupant(&self, occupant: Occupant) {
        let mut tables = self.inner.lock().expect("directory mutex poisoned");
        tables.occupants.insert(occupant.id.clone(), occupant);
    }

    /// Registers an occupant and links it to the given unit in one step.
    pub fn move_in(&self, unit_id: &UnitId, mut occupant: Occupant) {
        occupant.unit_id = Some(unit_id.clone());
        self.register_occupant(occupant);
    }
}

impl UnitDirectory for InMemoryUnitDirectory {
    fn entries(&self) -> Vec<DirectoryEntry> {
        let tables = self.inner.lock().expect("directory mutex poisoned");
        tables
            .units
            .values()
            .map(|unit| DirectoryEntry {
                unit: unit.clone(),
                occupant: tables
                    .occupants
                    .values()
                    .find(|occupant| occupant.unit_id.as_ref() == Some(&unit.id))
                    .cloned(),
            })
            .collect()
    }

    fn entry(&self, id: &UnitId) -> Option<DirectoryEntry> {
        let tables = self.inner.lock().expect("directory mutex poisoned");
        let unit = tables.units.get(id)?.clone();
        let occupant = tables
            .occupants
            .values()
            .find(|occupant| occupant.unit_id.as_ref() == Some(id))
            .cloned();
        Some(DirectoryEntry { unit, occupant })
    }

    fn occupant(&self, id: &OccupantId) -> Option<Occupant> {
        let tables = self.inner.lock().expect("directory mutex poisoned");
        tables.occupants.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house(id: &str, postal_code: &str) -> ResidenceUnit {
        ResidenceUnit {
            id: UnitId(id.to_string()),
            condominium_id: CondominiumId("condo-1".to_string()),
            kind: UnitKind::House {
                street: "Rua A".to_string(),
                house_number: 5,
                postal_code: postal_code.to_string(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn name_normalization_is_idempotent() {
        let once = normalize_name("  Maria SILVA  ");
        assert_eq!(once, "maria silva");
        assert_eq!(normalize_name(&once), once);
    }

    #[test]
    fn postal_normalization_strips_non_digits_and_is_idempotent() {
        let once = normalize_postal_code("12345-678");
        assert_eq!(once, "12345678");
        assert_eq!(normalize_postal_code(&once), once);
    }

    #[test]
    fn house_address_renders_street_and_number() {
        assert_eq!(house("u-1", "12345678").address(), "Rua A, House 5");
    }

    #[test]
    fn apartment_address_renders_tower_and_number() {
        let unit = ResidenceUnit {
            id: UnitId("u-2".to_string()),
            condominium_id: CondominiumId("condo-2".to_string()),
            kind: UnitKind::Apartment {
                tower: "T1".to_string(),
                apartment_number: "101".to_string(),
            },
            created_at: Utc::now(),
        };
        assert_eq!(unit.address(), "Tower T1, Apt 101");
    }

    #[test]
    fn entry_links_occupant_to_unit() {
        let directory = InMemoryUnitDirectory::default();
        let unit = house("u-1", "12345678");
        directory.register_unit(unit.clone());
        directory.move_in(
            &unit.id,
            Occupant {
                id: OccupantId("occ-1".to_string()),
                name: "Maria Silva".to_string(),
                phone: "+55 11 91234-0001".to_string(),
                email: Some("maria@example.com".to_string()),
                condominium_id: CondominiumId("condo-1".to_string()),
                unit_id: None,
            },
        );

        let entry = directory.entry(&unit.id).expect("unit registered");
        let (_, occupant) = entry.occupied().expect("unit occupied");
        assert_eq!(occupant.name, "Maria Silva");

        let by_name = directory
            .occupant_by_name(&normalize_name("MARIA silva"))
            .expect("lookup by normalized name");
        assert_eq!(by_name.id.0, "occ-1");
    }
}
