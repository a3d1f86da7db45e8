//! Authentication gate for the admin area. Every login, logout and lockout is
//! recorded through the action log.

mod gate;

pub use gate::{AuthConfig, AuthGate, Credentials};
pub use site_types::{AuthError, LockoutState, Session};
