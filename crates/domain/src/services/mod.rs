//! Domain services for event admission.
//!
//! Services contain business logic that operates on domain models through
//! the [`AdmissionStore`](crate::store::AdmissionStore) port.

pub mod check_in;
pub mod events;
pub mod ledger;
pub mod promoter;
pub mod registration;
pub mod retry;

pub use check_in::CheckInTracker;
pub use events::EventService;
pub use ledger::{CapacityLedger, Reservation};
pub use promoter::WaitlistPromoter;
pub use registration::RegistrationService;
pub use retry::RetryPolicy;
