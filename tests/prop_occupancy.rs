//! Property-based tests for slot occupancy and conflict detection.

use proptest::prelude::*;
use ulid::Ulid;

use tableslot::engine::{detect_conflict, find_occupant, occupied_slots, OccupancyGrid, Cell};
use tableslot::model::*;
use tableslot::slots::SlotIndex;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn index() -> SlotIndex {
    SlotIndex::default()
}

/// Start label and duration that fit within the default dinner index.
fn arb_fitting() -> impl Strategy<Value = (usize, u32)> {
    let n = index().len();
    (0..n).prop_flat_map(move |start| {
        let max_minutes = ((n - start) as u32) * 30;
        (Just(start), 1u32..=max_minutes)
    })
}

fn details(resource_id: Ulid, day: &str, start: usize, minutes: u32) -> BookingDetails {
    BookingDetails {
        resource_id,
        day: day.into(),
        start_slot: index().label(start).unwrap().to_string(),
        duration_minutes: minutes,
        customer_name: "Prop".into(),
        customer_phone: "555-0000".into(),
        guest_count: 1,
        notes: None,
    }
}

fn booking(details: BookingDetails) -> Booking {
    Booking { id: Ulid::new(), details }
}

/// Greedily accept candidates that do not conflict, the way the ledger does.
fn commit_all(candidates: Vec<BookingDetails>) -> Vec<Booking> {
    let slots = index();
    let mut committed: Vec<Booking> = Vec::new();
    for c in candidates {
        if detect_conflict(&slots, &c, &committed, None).unwrap().is_free() {
            committed.push(booking(c));
        }
    }
    committed
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn range_is_contiguous_and_sized((start, minutes) in arb_fitting()) {
        let slots = index();
        let range = occupied_slots(&slots, &details(Ulid::nil(), "today", start, minutes)).unwrap();
        prop_assert_eq!(range.start, start);
        prop_assert_eq!(range.len(), minutes.div_ceil(30) as usize);
        prop_assert!(range.end <= slots.len());
    }

    #[test]
    fn runs_past_last_slot_is_rejected(start in 0usize..12, extra in 1u32..120) {
        let slots = index();
        let minutes = (12 - start) as u32 * 30 + extra;
        prop_assert!(occupied_slots(&slots, &details(Ulid::nil(), "today", start, minutes)).is_err());
    }

    #[test]
    fn conflict_is_symmetric(a in arb_fitting(), b in arb_fitting()) {
        let slots = index();
        let table = Ulid::new();
        let ba = booking(details(table, "today", a.0, a.1));
        let bb = booking(details(table, "today", b.0, b.1));
        let ab = detect_conflict(&slots, &ba.details, std::slice::from_ref(&bb), None).unwrap().is_free();
        let ba_free = detect_conflict(&slots, &bb.details, std::slice::from_ref(&ba), None).unwrap().is_free();
        prop_assert_eq!(ab, ba_free);
    }

    #[test]
    fn touching_ranges_never_conflict(start in 0usize..11, len_a in 1usize..6, len_b in 1usize..6) {
        let n = index().len();
        prop_assume!(start + len_a < n);
        let second = start + len_a;
        prop_assume!(second + len_b <= n);
        let table = Ulid::new();
        let first = booking(details(table, "today", start, len_a as u32 * 30));
        let next = details(table, "today", second, len_b as u32 * 30);
        prop_assert!(detect_conflict(&index(), &next, &[first], None).unwrap().is_free());
    }

    #[test]
    fn detection_is_idempotent(a in arb_fitting(), existing in prop::collection::vec(arb_fitting(), 0..8)) {
        let slots = index();
        let table = Ulid::new();
        let existing = commit_all(existing.into_iter().map(|(s, m)| details(table, "today", s, m)).collect());
        let candidate = details(table, "today", a.0, a.1);
        let first = detect_conflict(&slots, &candidate, &existing, None).unwrap();
        let second = detect_conflict(&slots, &candidate, &existing, None).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn committed_bookings_are_pairwise_disjoint(
        candidates in prop::collection::vec((arb_fitting(), 0usize..3, prop::bool::ANY), 1..30)
    ) {
        let slots = index();
        let tables = [Ulid::new(), Ulid::new(), Ulid::new()];
        let committed = commit_all(
            candidates
                .into_iter()
                .map(|((s, m), t, tomorrow)| {
                    details(tables[t], if tomorrow { "tomorrow" } else { "today" }, s, m)
                })
                .collect(),
        );

        for (i, x) in committed.iter().enumerate() {
            for y in &committed[i + 1..] {
                if x.resource_id() == y.resource_id() && x.day() == y.day() {
                    let rx = occupied_slots(&slots, &x.details).unwrap();
                    let ry = occupied_slots(&slots, &y.details).unwrap();
                    prop_assert!(!rx.overlaps(&ry), "{:?} overlaps {:?}", rx, ry);
                }
            }
        }
    }

    #[test]
    fn editing_never_conflicts_with_itself((start, minutes) in arb_fitting()) {
        let table = Ulid::new();
        let stored = booking(details(table, "today", start, minutes));
        let edited = stored.details.clone();
        let verdict = detect_conflict(&index(), &edited, std::slice::from_ref(&stored), Some(stored.id)).unwrap();
        prop_assert!(verdict.is_free());
    }

    #[test]
    fn grid_and_find_occupant_agree(candidates in prop::collection::vec(arb_fitting(), 0..12)) {
        let slots = index();
        let table = Resource { id: Ulid::new(), label: "1".into(), capacity: 4, location: None };
        let committed = commit_all(candidates.into_iter().map(|(s, m)| details(table.id, "today", s, m)).collect());
        let grid = OccupancyGrid::build(&slots, "today", std::slice::from_ref(&table), &committed).unwrap();

        for (i, label) in slots.labels().iter().enumerate() {
            let occupant = find_occupant(&slots, table.id, label, &committed).unwrap().map(|b| b.id);
            let cell = grid.cell(table.id, i).unwrap();
            prop_assert_eq!(occupant, cell.booking_id());
            if let Some(id) = occupant {
                let b = committed.iter().find(|b| b.id == id).unwrap();
                let starts_here = slots.index_of(b.start_slot()) == Some(i);
                prop_assert_eq!(starts_here, matches!(cell, Cell::Start(_)));
            }
        }
    }
}
