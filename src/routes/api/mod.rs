// routes/api: JSON endpoints for professionals, appointments, settlements and
// cash transfers. Every handler is scoped to the session user's clinic.

mod helpers;
mod appointments;
mod cash_transfers;
mod professionals;
mod settlements;

pub use appointments::*;
pub use cash_transfers::*;
pub use helpers::ApiError;
pub use professionals::*;
pub use settlements::*;
