//! Demo dataset: two condominiums, a dozen occupants, and a twelve-door
//! locker bank. The server and the demo transcript both start from this
//! snapshot so the documented walkthroughs stay reproducible.

use chrono::Utc;

use crate::deliveries::domain::{Locker, LockerId, LockerStatus};
use crate::deliveries::repository::DeliveryRepository;
use crate::deliveries::RepositoryError;
use crate::directory::{
    Condominium, CondominiumId, CondominiumKind, InMemoryUnitDirectory, Occupant, OccupantId,
    ResidenceUnit, UnitId, UnitKind,
};

pub const LOCKER_BANK_SIZE: u32 = 12;

/// Builds the demo directory: one house development, one apartment complex.
pub fn demo_directory() -> InMemoryUnitDirectory {
    let directory = InMemoryUnitDirectory::default();

    let houses = CondominiumId("condo-jardim".to_string());
    directory.register_condominium(Condominium {
        id: houses.clone(),
        name: "Residencial Jardim das Rosas".to_string(),
        kind: CondominiumKind::Houses,
    });

    let towers = CondominiumId("condo-horizonte".to_string());
    directory.register_condominium(Condominium {
        id: towers.clone(),
        name: "Condominio Horizonte".to_string(),
        kind: CondominiumKind::Apartments,
    });

    let house_rows: &[(&str, &str, u32, &str, &str, &str, Option<&str>)] = &[
        (
            "unit-h-05",
            "Rua A",
            5,
            "12345-678",
            "Maria Silva",
            "+55 11 91234-0001",
            Some("maria.silva@example.com"),
        ),
        (
            "unit-h-07",
            "Rua A",
            7,
            "12345-679",
            "Carlos Souza",
            "+55 11 91234-0002",
            Some("carlos.souza@example.com"),
        ),
        (
            "unit-h-12",
            "Rua B",
            12,
            "12345-700",
            "Antonia Pereira",
            "+55 11 91234-0003",
            None,
        ),
        (
            "unit-h-15",
            "Rua B",
            15,
            "12345-701",
            "Joao da Silva",
            "+55 11 91234-0004",
            Some("joao.silva@example.com"),
        ),
    ];
    for (index, (unit_id, street, number, postal, name, phone, email)) in
        house_rows.iter().enumerate()
    {
        let unit_id = UnitId(unit_id.to_string());
        directory.register_unit(ResidenceUnit {
            id: unit_id.clone(),
            condominium_id: houses.clone(),
            kind: UnitKind::House {
                street: street.to_string(),
                house_number: *number,
                postal_code: postal.to_string(),
            },
            created_at: Utc::now(),
        });
        directory.move_in(
            &unit_id,
            Occupant {
                id: OccupantId(format!("occ-h-{:02}", index + 1)),
                name: name.to_string(),
                phone: phone.to_string(),
                email: email.map(str::to_string),
                condominium_id: houses.clone(),
                unit_id: None,
            },
        );
    }

    let apartment_rows: &[(&str, &str, &str, &str, &str, Option<&str>)] = &[
        (
            "unit-a-101",
            "T1",
            "101",
            "Fernanda Lima",
            "+55 11 91234-0011",
            Some("fernanda.lima@example.com"),
        ),
        (
            "unit-a-202",
            "T1",
            "202",
            "Ricardo Alves",
            "+55 11 91234-0012",
            Some("ricardo.alves@example.com"),
        ),
        (
            "unit-a-303",
            "T2",
            "303",
            "Beatriz Costa",
            "+55 11 91234-0013",
            None,
        ),
    ];
    for (index, (unit_id, tower, number, name, phone, email)) in
        apartment_rows.iter().enumerate()
    {
        let unit_id = UnitId(unit_id.to_string());
        directory.register_unit(ResidenceUnit {
            id: unit_id.clone(),
            condominium_id: towers.clone(),
            kind: UnitKind::Apartment {
                tower: tower.to_string(),
                apartment_number: number.to_string(),
            },
            created_at: Utc::now(),
        });
        directory.move_in(
            &unit_id,
            Occupant {
                id: OccupantId(format!("occ-a-{:02}", index + 1)),
                name: name.to_string(),
                phone: phone.to_string(),
                email: email.map(str::to_string),
                condominium_id: towers.clone(),
                unit_id: None,
            },
        );
    }

    // One unoccupied unit so vacant-unit lookups have real data behind them.
    directory.register_unit(ResidenceUnit {
        id: UnitId("unit-a-404".to_string()),
        condominium_id: towers,
        kind: UnitKind::Apartment {
            tower: "T2".to_string(),
            apartment_number: "404".to_string(),
        },
        created_at: Utc::now(),
    });

    directory
}

/// Registers the locker bank: doors `01` through `12`, all available.
pub fn seed_locker_bank(
    repository: &dyn DeliveryRepository,
    doors: u32,
) -> Result<(), RepositoryError> {
    for door in 1..=doors {
        repository.add_locker(Locker::available(LockerId(format!("{door:02}"))))?;
    }
    Ok(())
}

/// Same bank with a few doors out of rotation, for walkthroughs that need a
/// constrained pool.
pub fn seed_locker_bank_with_maintenance(
    repository: &dyn DeliveryRepository,
    doors: u32,
    under_maintenance: &[u32],
) -> Result<(), RepositoryError> {
    for door in 1..=doors {
        let mut locker = Locker::available(LockerId(format!("{door:02}")));
        if under_maintenance.contains(&door) {
            locker.status = LockerStatus::UnderMaintenance;
        }
        repository.add_locker(locker)?;
    }
    Ok(())
}
