//! owop whisk: function backend client (OpenWhisk REST) and Secret-based credentials.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod provider;

pub use client::{ClientBuildError, WhiskClient};
pub use config::{WhiskConfig, WhiskConfigError};
pub use provider::{SecretBackendProvider, DEFAULT_CREDENTIALS_SECRET};
