//! The agent's tool catalog.
//!
//! A closed set of tagged variants with explicit name → variant dispatch;
//! adding a tool means adding a variant, a parse arm, and an execute arm.
//! Tool failures are values fed back into the conversation, never turn
//! failures.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use stackforge_llm::ToolSpec;
use stackforge_sandbox::SandboxHandle;

/// Name of the shell-command tool.
pub const RUN_COMMAND: &str = "run_command";

/// Result returned for tool calls that arrive before the sandbox is up.
const BOOTING_MESSAGE: &str = "This environment is still booting up! Try again in a minute.";

/// Why a tool call could not be dispatched.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that does not exist.
    #[error("unknown tool: {0}")]
    Unknown(String),
    /// The accumulated argument JSON does not parse.
    #[error("malformed tool arguments: {0}")]
    Arguments(#[from] serde_json::Error),
}

/// The tools offered on every execution-phase request.
pub fn catalog() -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: RUN_COMMAND.to_string(),
        description: "Run a command in the project sandbox".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "workdir": {"type": "string"},
            },
            "required": ["command"],
        }),
    }]
}

/// One parsed, executable tool call.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolInvocation {
    /// Shell command in the sandbox.
    RunCommand {
        /// Command line, passed to the sandbox shell.
        command: String,
        /// Working directory override.
        workdir: Option<String>,
    },
}

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
    #[serde(default)]
    workdir: Option<String>,
}

impl ToolInvocation {
    /// Dispatch by name and parse the accumulated argument JSON.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolError> {
        match name {
            RUN_COMMAND => {
                let args: RunCommandArgs = serde_json::from_str(arguments)?;
                Ok(ToolInvocation::RunCommand {
                    command: args.command,
                    workdir: args.workdir,
                })
            }
            other => Err(ToolError::Unknown(other.to_string())),
        }
    }

    /// Execute against the sandbox, always producing result text.
    ///
    /// A missing sandbox means the environment is still booting — that is
    /// a normal answer, not a failure of the turn.
    pub async fn execute(self, sandbox: Option<Arc<dyn SandboxHandle>>) -> String {
        let Some(sandbox) = sandbox else {
            return BOOTING_MESSAGE.to_string();
        };
        match self {
            ToolInvocation::RunCommand { command, workdir } => {
                match sandbox.run_command(&command, workdir.as_deref()).await {
                    Ok(output) if output.is_empty() => "<empty response>".to_string(),
                    Ok(output) => {
                        debug!(command, "tool command ran");
                        output
                    }
                    Err(e) => format!("error running command: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn catalog_offers_run_command_only() {
        let tools = catalog();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, RUN_COMMAND);
        assert_eq!(tools[0].parameters["required"][0], "command");
    }

    #[test]
    fn parse_run_command() {
        let inv = ToolInvocation::parse(RUN_COMMAND, r#"{"command":"ls","workdir":"/app"}"#)
            .unwrap();
        assert_eq!(
            inv,
            ToolInvocation::RunCommand {
                command: "ls".into(),
                workdir: Some("/app".into()),
            }
        );
    }

    #[test]
    fn parse_without_workdir() {
        let inv = ToolInvocation::parse(RUN_COMMAND, r#"{"command":"npm test"}"#).unwrap();
        assert_matches!(inv, ToolInvocation::RunCommand { workdir: None, .. });
    }

    #[test]
    fn unknown_tool_is_an_error_value() {
        let err = ToolInvocation::parse("write_file", "{}").unwrap_err();
        assert_matches!(err, ToolError::Unknown(name) if name == "write_file");
    }

    #[test]
    fn malformed_arguments_fail_that_call() {
        let err = ToolInvocation::parse(RUN_COMMAND, "{\"command\": ").unwrap_err();
        assert_matches!(err, ToolError::Arguments(_));
    }

    #[tokio::test]
    async fn execute_without_sandbox_reports_booting() {
        let inv = ToolInvocation::RunCommand {
            command: "ls".into(),
            workdir: None,
        };
        let result = inv.execute(None).await;
        assert!(result.contains("still booting"));
    }
}
