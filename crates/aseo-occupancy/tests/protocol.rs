//! Integration tests for the occupancy transition protocol, including the
//! paired-write failure windows that only a fault-injecting store can reach.

mod support;

use chrono::{Duration, Utc};

use aseo_core::{ExitCondition, FacilityId, OccupancyState};
use aseo_occupancy::protocol::{
    register_entry, register_exit, EntryRequest, ExitRequest, TransitionError,
};
use aseo_occupancy::run_audit;
use aseo_store::{FacilityRegistry, MemoryStore, UsageLog};
use support::FaultStore;

fn entry(facility: FacilityId, name: &str) -> EntryRequest {
    EntryRequest {
        facility,
        student_name: name.to_string(),
        student_group: "1ESO A".to_string(),
        note: None,
    }
}

fn exit(facility: FacilityId, condition: ExitCondition) -> ExitRequest {
    ExitRequest {
        facility,
        condition,
        note: None,
    }
}

// -- Happy path ---------------------------------------------------------------

#[tokio::test]
async fn entry_then_exit_returns_the_facility_to_free() {
    let store = MemoryStore::new();
    let entered = Utc::now();
    let left = entered + Duration::minutes(4);
    let facility = store.seed_facility("Aseo Chicas 1", entered);

    let record = register_entry(
        &store,
        EntryRequest {
            facility,
            student_name: "Ana López".into(),
            student_group: "1ESO A".into(),
            note: Some("me siento mal".into()),
        },
        entered,
    )
    .await
    .unwrap();

    let occupied = store.get(facility).await.unwrap().unwrap();
    assert_eq!(occupied.state(), OccupancyState::Occupied);
    let occupant = occupied.occupancy.occupant().unwrap();
    assert_eq!(occupant.occupant_name, "Ana López");
    assert_eq!(occupant.occupant_group, "1ESO A");
    assert_eq!(occupant.entry_note.as_deref(), Some("me siento mal"));

    register_exit(
        &store,
        ExitRequest {
            facility,
            condition: ExitCondition::Fair,
            note: Some("falta papel".into()),
        },
        left,
    )
    .await
    .unwrap();

    // The facility is free again with no occupant remnants.
    let freed = store.get(facility).await.unwrap().unwrap();
    assert_eq!(freed.state(), OccupancyState::Free);
    assert!(freed.occupancy.occupant().is_none());
    assert_eq!(freed.last_change, left);

    // Exactly one record, fully closed, carrying the submitted values.
    assert_eq!(store.count_records().await.unwrap(), 1);
    let history = store
        .completed_today(entered - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    let cycle = &history[0].record;
    assert_eq!(cycle.id, record);
    assert_eq!(cycle.exit_time, Some(left));
    assert_eq!(cycle.exit_condition, Some(ExitCondition::Fair));
    assert_eq!(cycle.exit_note.as_deref(), Some("falta papel"));
    assert_eq!(history[0].facility_name, "Aseo Chicas 1");
}

#[tokio::test]
async fn second_cycle_on_the_same_facility_works() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let facility = store.seed_facility("Aseo Chicos 1", now);

    register_entry(&store, entry(facility, "Ana"), now).await.unwrap();
    register_exit(&store, exit(facility, ExitCondition::Good), now)
        .await
        .unwrap();
    register_entry(&store, entry(facility, "Luis"), now).await.unwrap();
    register_exit(&store, exit(facility, ExitCondition::Poor), now)
        .await
        .unwrap();

    assert_eq!(store.count_records().await.unwrap(), 2);
    assert!(store.open_records().await.unwrap().is_empty());
}

// -- Rejected transitions leave no trace --------------------------------------

#[tokio::test]
async fn entry_on_an_occupied_facility_is_a_conflict_and_writes_nothing() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let facility = store.seed_facility("Aseo Chicas 1", now);
    register_entry(&store, entry(facility, "Ana"), now).await.unwrap();

    let before = store.get(facility).await.unwrap().unwrap();
    let err = register_entry(&store, entry(facility, "Luis"), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Conflict { id } if id == facility));

    // Neither the facility row nor the log moved for the loser.
    assert_eq!(store.get(facility).await.unwrap().unwrap(), before);
    assert_eq!(store.count_records().await.unwrap(), 1);
}

#[tokio::test]
async fn entry_on_an_unknown_facility_is_not_found() {
    let store = MemoryStore::new();
    let err = register_entry(&store, entry(FacilityId::new(), "Ana"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::FacilityNotFound { .. }));
    assert_eq!(store.count_records().await.unwrap(), 0);
}

#[tokio::test]
async fn blank_student_name_fails_validation_before_any_write() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let facility = store.seed_facility("Aseo Chicas 1", now);

    let err = register_entry(&store, entry(facility, "   "), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Validation(_)));

    let untouched = store.get(facility).await.unwrap().unwrap();
    assert_eq!(untouched.state(), OccupancyState::Free);
    assert_eq!(store.count_records().await.unwrap(), 0);
}

#[tokio::test]
async fn exit_with_no_open_cycle_is_not_found_and_leaves_the_facility_alone() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let facility = store.seed_facility("Aseo Chicas 1", now);

    let err = register_exit(&store, exit(facility, ExitCondition::Good), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::NoOpenCycle { id } if id == facility));
    assert_eq!(
        store.get(facility).await.unwrap().unwrap().state(),
        OccupancyState::Free
    );
}

#[tokio::test]
async fn exit_with_multiple_open_records_reports_the_consistency_fault() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let facility = store.seed_facility("Aseo Chicas 1", now);
    // Break the invariant behind the protocol's back.
    store.open_record(facility, "Ana", "1ESO A", now).await.unwrap();
    store.open_record(facility, "Luis", "2ESO B", now).await.unwrap();

    let err = register_exit(&store, exit(facility, ExitCondition::Good), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Consistency { count: 2, .. }));
}

// -- Paired-write failure windows ---------------------------------------------

#[tokio::test]
async fn failed_entry_write_b_surfaces_the_partial_entry_fault() {
    let store = FaultStore::new(MemoryStore::new());
    let now = Utc::now();
    let facility = store.inner.seed_facility("Aseo Chicas 1", now);

    store.fail_next_open_record();
    let err = register_entry(&store, entry(facility, "Ana"), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::PartialEntry { id, .. } if id == facility));

    // The window: occupied facility, no backing record.
    let facility_row = store.get(facility).await.unwrap().unwrap();
    assert_eq!(facility_row.state(), OccupancyState::Occupied);
    assert!(store.open_records().await.unwrap().is_empty());

    // The audit sees exactly that residue.
    let findings = run_audit(&store).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert!(matches!(
        &findings[0],
        aseo_occupancy::AuditFinding::OccupiedWithoutOpenRecord { facility: f, .. } if *f == facility
    ));
}

#[tokio::test]
async fn failed_exit_write_b_surfaces_the_partial_exit_fault() {
    let store = FaultStore::new(MemoryStore::new());
    let now = Utc::now();
    let facility = store.inner.seed_facility("Aseo Chicas 1", now);
    let record = register_entry(&store, entry(facility, "Ana"), now)
        .await
        .unwrap();

    store.fail_next_set_free();
    let err = register_exit(&store, exit(facility, ExitCondition::Good), now)
        .await
        .unwrap_err();
    match err {
        TransitionError::PartialExit {
            id, record: closed, ..
        } => {
            assert_eq!(id, facility);
            assert_eq!(closed, record);
        }
        other => panic!("expected PartialExit, got {other:?}"),
    }

    // The inverse window: record closed, facility still occupied.
    assert!(store.open_records().await.unwrap().is_empty());
    let facility_row = store.get(facility).await.unwrap().unwrap();
    assert_eq!(facility_row.state(), OccupancyState::Occupied);

    let findings = run_audit(&store).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert!(matches!(
        &findings[0],
        aseo_occupancy::AuditFinding::OccupiedWithoutOpenRecord { facility: f, .. } if *f == facility
    ));
}

#[tokio::test]
async fn failed_exit_write_a_aborts_with_nothing_partial() {
    let store = FaultStore::new(MemoryStore::new());
    let now = Utc::now();
    let facility = store.inner.seed_facility("Aseo Chicas 1", now);
    register_entry(&store, entry(facility, "Ana"), now).await.unwrap();

    store.fail_next_close_record();
    let err = register_exit(&store, exit(facility, ExitCondition::Good), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Store(_)));

    // Write A failed, so nothing is partial: the facility stays occupied and
    // the record stays open; a plain retry can finish the cycle.
    assert_eq!(
        store.get(facility).await.unwrap().unwrap().state(),
        OccupancyState::Occupied
    );
    assert_eq!(store.open_records().await.unwrap().len(), 1);
    assert!(run_audit(&store).await.unwrap().is_empty());

    register_exit(&store, exit(facility, ExitCondition::Good), now)
        .await
        .unwrap();
    assert_eq!(
        store.get(facility).await.unwrap().unwrap().state(),
        OccupancyState::Free
    );
}

#[tokio::test]
async fn exit_racing_a_concurrent_close_reports_no_open_cycle() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let facility = store.seed_facility("Aseo Chicas 1", now);
    register_entry(&store, entry(facility, "Ana"), now).await.unwrap();

    // Another session closes the record between this session's lookup and
    // write; the conditional close turns that into a clean NoOpenCycle.
    let open = store.find_open_record(facility).await.unwrap().unwrap();
    store
        .close_record(open.id, ExitCondition::Good, None, now)
        .await
        .unwrap();

    let err = register_exit(&store, exit(facility, ExitCondition::Poor), now)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::NoOpenCycle { .. }));

    // The losing exit did not touch the facility.
    assert_eq!(
        store.get(facility).await.unwrap().unwrap().state(),
        OccupancyState::Occupied
    );
}
