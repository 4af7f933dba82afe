pub mod error;
pub mod internal_auth;
pub mod logging;
