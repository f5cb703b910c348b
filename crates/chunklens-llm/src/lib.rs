//! Text-completion provider abstraction, HTTP backend, and token pricing.

pub mod any;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod pricing;
pub mod provider;
mod retry;

pub use error::LlmError;
pub use pricing::{CallCost, ModelPricing};
pub use provider::{Completion, CompletionRequest, LlmProvider};
