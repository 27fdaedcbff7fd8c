//! Core traits and types for the ledger's external collaborators.
//!
//! This crate provides the shared interface between the token ledger and the
//! services it pays for or gets paid through. It defines:
//!
//! - [`LookupProvider`] - The trait every identity-data provider adapter implements
//! - [`LookupResponse`] / [`LookupError`] - Outcome of one provider call
//! - [`PaymentGateway`] - The trait a payment gateway client implements
//! - [`GatewayOrder`] / [`PaymentStatus`] / [`GatewayError`] - Gateway wire types
//!
//! # Example
//!
//! ```rust
//! use provider_core::{async_trait, LookupError, LookupProvider, LookupResponse};
//!
//! struct EchoProvider;
//!
//! #[async_trait]
//! impl LookupProvider for EchoProvider {
//!     async fn lookup(&self, query: &str) -> Result<LookupResponse, LookupError> {
//!         Ok(LookupResponse::new(serde_json::json!({ "query": query })))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//! }
//! ```

mod error;
mod gateway;
mod lookup;

pub use error::{GatewayError, LookupError};
pub use gateway::{GatewayOrder, PaymentGateway, PaymentStatus};
pub use lookup::{LookupProvider, LookupResponse};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
