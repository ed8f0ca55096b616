pub mod authenticator;
pub mod verify;

pub use authenticator::{Authenticator, LoginState};
pub use verify::{verify_landing, LandingPage};
