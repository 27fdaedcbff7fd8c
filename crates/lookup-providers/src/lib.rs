//! [`LookupProvider`] adapters.
//!
//! - [`HttpJsonProvider`] - one GET returning a JSON envelope
//! - [`CallbackProvider`] - submit a job, then poll its callback URL
//! - [`Retrying`] - retry transient failures with a fixed backoff
//! - [`mock`] - canned providers for tests
//!
//! # Example
//!
//! ```no_run
//! use lookup_providers::{HttpJsonConfig, HttpJsonProvider, Retrying};
//! use provider_core::LookupProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let nik = Retrying::new(HttpJsonProvider::new(
//!     HttpJsonConfig::new("nik", "https://api.example.com/?apikey={key}&query={query}")
//!         .with_api_key("secret"),
//! )?);
//!
//! let response = nik.lookup("3171234567890001").await?;
//! println!("{}", response.payload);
//! # Ok(())
//! # }
//! ```

mod callback;
mod error;
mod http;
pub mod mock;
mod retry;

pub use callback::{CallbackConfig, CallbackProvider};
pub use error::ProviderError;
pub use http::{HttpJsonConfig, HttpJsonProvider};
pub use retry::Retrying;

pub use provider_core::{LookupError, LookupProvider, LookupResponse};
