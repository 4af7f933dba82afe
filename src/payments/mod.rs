//! SSLCommerz gateway client: session initiation and payment validation

pub mod error;
pub mod provider;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentGateway;
