//! Model client adapters

pub mod anthropic;
pub mod mock;

pub use anthropic::AnthropicClient;
pub use mock::{MockCall, MockLlmClient};
