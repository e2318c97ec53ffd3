//! Error handling for the gateway.

mod types;

pub use types::{GatewayError, GatewayResult};
