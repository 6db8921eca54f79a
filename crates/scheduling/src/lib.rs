//! Scheduling domain: booking events and their slots.

pub mod event;
pub mod expand;
pub mod slot;

pub use event::{BookingEvent, BookingEventStatus};
pub use expand::{AvailabilityWindow, SlotWindow, expand_slots};
pub use slot::{BookingSlot, SlotClaim, SlotStatus};
