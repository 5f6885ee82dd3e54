//! Capacity ledger: seat accounting inside an event transaction.

use crate::store::{EventTransaction, StoreError};

/// Outcome of a reservation attempt. A denial is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Granted,
    Denied,
}

/// Seat counter for one event, valid for the life of the transaction it
/// was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLedger {
    capacity: Option<i32>,
    reserved: i64,
}

impl CapacityLedger {
    pub fn new(capacity: Option<i32>, reserved: i64) -> Self {
        Self { capacity, reserved }
    }

    /// Reads the reserved total under the transaction's event lock.
    pub async fn open<T>(tx: &mut T) -> Result<Self, StoreError>
    where
        T: EventTransaction + ?Sized,
    {
        let capacity = tx.event().capacity;
        let reserved = tx.reserved_slots().await?;
        Ok(Self::new(capacity, reserved))
    }

    pub fn reserved_slots(&self) -> i64 {
        self.reserved
    }

    /// Seats still free, `None` when unlimited.
    pub fn available(&self) -> Option<i64> {
        self.capacity.map(|c| (c as i64 - self.reserved).max(0))
    }

    pub fn is_full(&self) -> bool {
        self.available() == Some(0)
    }

    /// Grants `guest_count` seats if they fit and records them.
    pub fn try_reserve(&mut self, guest_count: i32) -> Reservation {
        let wanted = guest_count as i64;
        match self.capacity {
            Some(capacity) if self.reserved + wanted > capacity as i64 => Reservation::Denied,
            _ => {
                self.reserved += wanted;
                Reservation::Granted
            }
        }
    }
}
