//! Streaming agent: the two-phase turn driver.

pub mod chat_agent;
pub mod prompts;
pub mod tool_buffer;
pub mod tools;

pub use chat_agent::{ChatAgent, FragmentStream};
pub use prompts::AgentContext;
pub use tool_buffer::{BufferedCall, ToolCallBuffer};
pub use tools::{ToolError, ToolInvocation};
