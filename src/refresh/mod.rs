mod coordinator;
mod outcome;

pub use coordinator::RefreshCoordinator;
pub use outcome::{RenewalOutcome, RenewalTicket};
