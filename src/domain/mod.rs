//! Domain layer: booking model, pricing, availability and storage ports.
//!
//! Everything in here is transport-agnostic. The pricing engine and the
//! booking state machine are pure; availability and the stores are the only
//! parts that touch shared state.

pub mod availability;
pub mod booking;
pub mod booking_event;
pub mod booking_registry;
pub mod clock;
pub mod date_range;
pub mod event_bus;
pub mod ids;
pub mod ports;
pub mod pricing;
pub mod yacht;

pub use availability::AvailabilityChecker;
pub use booking::{
    Booking, BookingAction, BookingState, BookingStatus, ParseStatusError, PaymentMethod,
    PaymentStatus, TransitionError,
};
pub use booking_event::{BookingEvent, CancelReason};
pub use booking_registry::{InMemoryBookingStore, InMemoryYachtCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use date_range::{DateRange, InvalidRange};
pub use event_bus::EventBus;
pub use ids::{BookingId, UserId, YachtId};
pub use ports::{
    BookingFilter, BookingPage, BookingStore, PageRequest, StoreError, YachtCatalog,
};
pub use pricing::{Pricing, PricingError};
pub use yacht::Yacht;
