pub mod api;
pub mod client;
pub mod color;
pub mod error;

pub use client::BridgeClient;
pub use error::{HueClientError, HueResult};
