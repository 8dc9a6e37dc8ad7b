//! Backend API access.

pub mod client;

pub use client::{ApiClient, ApiConfig};
