//! Server configuration from CLI flags and environment.

use std::path::PathBuf;

use clap::Parser;

/// `stackforge` binary configuration.
#[derive(Debug, Parser)]
#[command(name = "stackforge", about = "Session orchestrator for sandboxed dev chats")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1", env = "STACKFORGE_HOST")]
    pub host: String,

    /// Port to bind.
    #[arg(long, default_value_t = 8000, env = "STACKFORGE_PORT")]
    pub port: u16,

    /// Directory holding per-project sandbox directories.
    #[arg(long, default_value = "./sandboxes", env = "STACKFORGE_WORKSPACE_DIR")]
    pub workspace_dir: PathBuf,

    /// API key for the completion provider.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Base URL of the completion provider.
    #[arg(long, default_value = "https://api.openai.com/v1", env = "OPENAI_BASE_URL")]
    pub openai_base_url: String,

    /// Model for tool-augmented execution streams.
    #[arg(long, default_value = "gpt-4.1", env = "STACKFORGE_MODEL")]
    pub model: String,

    /// Model for plan streams and follow-up suggestions.
    #[arg(long, default_value = "gpt-4.1-mini", env = "STACKFORGE_FAST_MODEL")]
    pub fast_model: String,

    /// Stack guidance rendered into every system prompt.
    #[arg(
        long,
        default_value = "Next.js with TypeScript and Tailwind CSS",
        env = "STACKFORGE_STACK_PROMPT"
    )]
    pub stack_prompt: String,

    /// Seconds between idle-orchestrator sweeps.
    #[arg(long, default_value_t = 60, env = "STACKFORGE_SWEEP_INTERVAL")]
    pub sweep_interval_secs: u64,
}
