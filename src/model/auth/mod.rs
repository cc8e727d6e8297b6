mod guard;
mod token;
mod user;

pub use guard::GuardFailure;
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::Rights;
