//! Mock providers for tests.
//!
//! - [`StaticProvider`] always answers with the same payload
//! - [`FailingProvider`] always fails with the same error
//! - [`EmptyProvider`] always finds nothing
//! - [`PartialProvider`] answers with data marked partial
//! - [`DelayedProvider`] wraps another provider with a delay
//! - [`ScriptedProvider`] plays back a queue of answers and counts calls

mod delayed;
mod fixed;
mod scripted;

pub use delayed::DelayedProvider;
pub use fixed::{EmptyProvider, FailingProvider, PartialProvider, StaticProvider};
pub use scripted::ScriptedProvider;
