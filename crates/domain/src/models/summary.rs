//! Admission summary models.

use serde::Serialize;
use uuid::Uuid;

/// Raw per-event counts read from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionCounts {
    /// Number of confirmed registrations.
    pub confirmed: i64,
    /// Number of waitlisted registrations.
    pub waitlisted: i64,
    /// Number of check-ins.
    pub checked_in: i64,
    /// Sum of `guest_count` over confirmed registrations.
    pub reserved_slots: i64,
}

/// Host-facing view of an event's admission state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AdmissionSummary {
    pub event_id: Uuid,
    pub confirmed: i64,
    pub waitlisted: i64,
    pub checked_in: i64,
    pub capacity: Option<i32>,
    pub reserved_slots: i64,
    /// `None` when capacity is unlimited.
    pub available_slots: Option<i64>,
}

impl AdmissionSummary {
    pub fn new(event_id: Uuid, capacity: Option<i32>, counts: AdmissionCounts) -> Self {
        Self {
            event_id,
            confirmed: counts.confirmed,
            waitlisted: counts.waitlisted,
            checked_in: counts.checked_in,
            capacity,
            reserved_slots: counts.reserved_slots,
            available_slots: capacity.map(|c| (c as i64 - counts.reserved_slots).max(0)),
        }
    }
}
