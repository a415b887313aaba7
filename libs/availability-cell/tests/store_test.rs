use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use availability_cell::models::{NewSlot, UpdateSlotRequest};
use availability_cell::{AvailabilityStore, InMemoryAvailabilityStore};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

fn slot(d: &str, t: &str) -> NewSlot {
    NewSlot { date: date(d), time: time(t), is_available: None }
}

#[tokio::test]
async fn slots_are_listed_by_date_then_time() {
    let store = InMemoryAvailabilityStore::new();
    let doctor = Uuid::new_v4();

    store
        .bulk_create_slots(doctor, &[slot("2024-01-11", "09:00"), slot("2024-01-10", "11:00"), slot("2024-01-10", "10:00")])
        .await
        .unwrap();
    store.bulk_create_slots(Uuid::new_v4(), &[slot("2024-01-10", "10:00")]).await.unwrap();

    let all = store.find_slots_for_doctor(doctor, None).await.unwrap();
    let order: Vec<_> = all.iter().map(|s| (s.date, s.time)).collect();
    assert_eq!(
        order,
        vec![
            (date("2024-01-10"), time("10:00")),
            (date("2024-01-10"), time("11:00")),
            (date("2024-01-11"), time("09:00")),
        ]
    );

    let one_day = store.find_slots_for_doctor(doctor, Some(date("2024-01-11"))).await.unwrap();
    assert_eq!(one_day.len(), 1);
    assert!(store.find_slots_for_doctor(Uuid::new_v4(), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn claim_succeeds_once_per_slot() {
    let store = InMemoryAvailabilityStore::new();
    let doctor = Uuid::new_v4();
    store.bulk_create_slots(doctor, &[slot("2024-01-10", "10:00")]).await.unwrap();

    let first = Uuid::new_v4();
    assert!(store.claim_slot(doctor, date("2024-01-10"), time("10:00"), first).await.unwrap());
    assert!(!store.claim_slot(doctor, date("2024-01-10"), time("10:00"), Uuid::new_v4()).await.unwrap());
    assert!(!store.claim_slot(doctor, date("2024-01-10"), time("11:00"), Uuid::new_v4()).await.unwrap());

    let slots = store.find_slots_for_doctor(doctor, None).await.unwrap();
    assert!(!slots[0].is_available);
    assert_eq!(slots[0].appointment_id, Some(first));
}

#[tokio::test]
async fn unavailable_slots_cannot_be_claimed() {
    let store = InMemoryAvailabilityStore::new();
    let doctor = Uuid::new_v4();
    store
        .bulk_create_slots(doctor, &[NewSlot { is_available: Some(false), ..slot("2024-01-10", "10:00") }])
        .await
        .unwrap();

    assert!(!store.claim_slot(doctor, date("2024-01-10"), time("10:00"), Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn booked_state_is_idempotent_and_release_clears_link() {
    let store = InMemoryAvailabilityStore::new();
    let doctor = Uuid::new_v4();
    store.bulk_create_slots(doctor, &[slot("2024-01-10", "10:00")]).await.unwrap();
    store.claim_slot(doctor, date("2024-01-10"), time("10:00"), Uuid::new_v4()).await.unwrap();

    store.set_slot_booked_state(doctor, date("2024-01-10"), time("10:00"), true).await.unwrap();
    let once = store.find_slots_for_doctor(doctor, None).await.unwrap();
    store.set_slot_booked_state(doctor, date("2024-01-10"), time("10:00"), true).await.unwrap();
    let twice = store.find_slots_for_doctor(doctor, None).await.unwrap();

    assert!(once[0].is_open());
    assert_eq!(once[0].is_available, twice[0].is_available);
    assert_eq!(once[0].appointment_id, twice[0].appointment_id);

    // no matching slot is not an error
    store.set_slot_booked_state(doctor, date("2024-02-01"), time("08:00"), false).await.unwrap();
}

#[tokio::test]
async fn update_and_delete_report_missing_slots() {
    let store = InMemoryAvailabilityStore::new();
    let doctor = Uuid::new_v4();
    let created = store.bulk_create_slots(doctor, &[slot("2024-01-10", "10:00")]).await.unwrap();
    let id = created[0].id;

    let patch = UpdateSlotRequest { time: Some(time("10:30")), ..Default::default() };
    let updated = store.update_slot(id, &patch).await.unwrap().unwrap();
    assert_eq!(updated.time, time("10:30"));
    assert_eq!(updated.date, date("2024-01-10"));

    let unchanged = store.update_slot(id, &UpdateSlotRequest::default()).await.unwrap().unwrap();
    assert_eq!(unchanged, updated);

    assert!(store.update_slot(Uuid::new_v4(), &patch).await.unwrap().is_none());
    assert!(store.delete_slot(id).await.unwrap());
    assert!(!store.delete_slot(id).await.unwrap());
    assert!(store.find_slot(id).await.unwrap().is_none());
}

#[tokio::test]
async fn release_only_frees_a_slot_held_by_the_same_appointment() {
    let store = InMemoryAvailabilityStore::new();
    let doctor = Uuid::new_v4();
    store.bulk_create_slots(doctor, &[slot("2024-01-10", "10:00")]).await.unwrap();

    let holder = Uuid::new_v4();
    store.claim_slot(doctor, date("2024-01-10"), time("10:00"), holder).await.unwrap();

    assert!(!store.release_slot(doctor, date("2024-01-10"), time("10:00"), Uuid::new_v4()).await.unwrap());
    let slots = store.find_slots_for_doctor(doctor, None).await.unwrap();
    assert_eq!(slots[0].appointment_id, Some(holder));
    assert!(!slots[0].is_available);

    assert!(store.release_slot(doctor, date("2024-01-10"), time("10:00"), holder).await.unwrap());
    assert!(store.find_slots_for_doctor(doctor, None).await.unwrap()[0].is_open());
    assert!(!store.release_slot(doctor, date("2024-01-10"), time("10:00"), holder).await.unwrap());
}

#[tokio::test]
async fn booked_slots_are_neither_updated_nor_deleted() {
    let store = InMemoryAvailabilityStore::new();
    let doctor = Uuid::new_v4();
    let created = store.bulk_create_slots(doctor, &[slot("2024-01-10", "10:00")]).await.unwrap();
    let holder = Uuid::new_v4();
    store.claim_slot(doctor, date("2024-01-10"), time("10:00"), holder).await.unwrap();

    let reopen = UpdateSlotRequest { is_available: Some(true), ..Default::default() };
    assert!(store.update_slot(created[0].id, &reopen).await.unwrap().is_none());
    assert!(!store.delete_slot(created[0].id).await.unwrap());

    let kept = store.find_slot(created[0].id).await.unwrap().unwrap();
    assert!(!kept.is_available);
    assert_eq!(kept.appointment_id, Some(holder));
}
