mod common;

use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentSearchQuery};
use availability_cell::AvailabilityStore;
use common::Harness;

const CALLERS: usize = 24;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_of_one_slot_yield_one_success() {
    let h = Harness::new();
    h.open_slot("2024-01-10", "10:00").await;

    let attempts = (0..CALLERS).map(|_| {
        let engine = h.engine.clone();
        let request = h.booking(Uuid::new_v4(), "2024-01-10", "10:00");
        tokio::spawn(async move { engine.create_appointment(request).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(AppointmentError::SlotUnavailable(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, CALLERS - 1);

    let stored = h.engine.get_appointments(&AppointmentSearchQuery::default()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(h.slot_state("2024-01-10", "10:00").await, (false, Some(stored[0].id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_of_one_appointment_yield_one_success() {
    let h = Harness::new();
    h.open_slot("2024-01-10", "10:00").await;
    let booked = h.engine.create_appointment(h.booking(Uuid::new_v4(), "2024-01-10", "10:00")).await.unwrap();

    let attempts = (0..CALLERS).map(|_| {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.cancel_appointment(booked.id, None).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .all(|result| result.is_ok() || matches!(result, Err(AppointmentError::AlreadyCancelled))));
    assert_eq!(h.slot_state("2024-01-10", "10:00").await, (true, None));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reschedules_leave_one_slot_held() {
    let h = Harness::new();
    let hours = ["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"];
    for hour in hours {
        h.open_slot("2024-01-10", hour).await;
    }
    let booked = h.engine.create_appointment(h.booking(Uuid::new_v4(), "2024-01-10", "09:00")).await.unwrap();

    let attempts = hours[1..].iter().map(|hour| {
        let engine = h.engine.clone();
        let target = format!("2024-01-10T{}", hour);
        tokio::spawn(async move { engine.reschedule_appointment(booked.id, &target, None).await })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert!(results.iter().any(|result| result.is_ok()));
    assert!(results
        .iter()
        .all(|result| result.is_ok() || matches!(result, Err(AppointmentError::Conflict(_)))));

    let stored = h.engine.get_appointment_by_id(booked.id).await.unwrap().unwrap();
    let slots = h.slots.find_slots_for_doctor(h.doctor_id, None).await.unwrap();
    let held: Vec<_> = slots.iter().filter(|slot| !slot.is_open()).collect();

    assert_eq!(held.len(), 1);
    assert_eq!(held[0].appointment_id, Some(booked.id));
    assert!(held[0].matches(stored.appointment_date, stored.appointment_time));
}
