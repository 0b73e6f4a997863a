//! Multi-loan service: per-loan serialization, the injected business clock
//! and the outbox of committed domain events.

pub mod clock;
pub mod events;
pub mod loan_book;

pub use clock::{BusinessClock, FixedClock, ManualClock};
pub use events::LoanEvent;
pub use loan_book::LoanBook;
