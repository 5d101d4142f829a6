//! Birth-data form: session state, validation, and the debounced controller.

pub mod controller;
pub mod session;

pub use controller::{Debouncer, FormController, Update};
pub use session::{FormError, FormSession, LocationInput, PendingSelection, Validation};
