pub mod sslcommerz;

pub use sslcommerz::SslCommerzProvider;
