//! Services module for business logic and integrations

pub mod image_proxy;
pub mod payment_flow;

pub use image_proxy::{ImageProxyError, ImageProxyService, ImageQuery, ImageRequest};
pub use payment_flow::{InitiatePaymentRequest, PaymentFlowService};
