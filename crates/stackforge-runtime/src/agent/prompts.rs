//! System prompts for the three completion calls an agent makes.
//!
//! Prompt *content* engineering is out of scope; these templates carry the
//! structural contract the turn driver depends on: the plan phase answers
//! in markdown headings only, the execution phase writes file changes as
//! path-commented code blocks, and follow-ups come back as a dash list.

/// Per-project context rendered into every system prompt.
#[derive(Clone, Debug, Default)]
pub struct AgentContext {
    /// Project display name.
    pub project_name: String,
    /// Free-form instructions attached to the project.
    pub custom_instructions: String,
    /// Stack-specific guidance (framework, conventions, tips).
    pub stack_prompt: String,
}

impl AgentContext {
    /// The `<project>` block shared by all prompts.
    pub fn project_text(&self, sandbox_ready: bool) -> String {
        format!(
            "Name: {}\nSandbox Status: {}\nCustom Instructions: {}",
            self.project_name,
            if sandbox_ready { "Ready" } else { "Booting..." },
            self.custom_instructions,
        )
        .trim()
        .to_string()
    }
}

/// Plan-phase system prompt: advice only, no code, markdown `###` headings.
pub fn plan_system_prompt(project_text: &str, stack_text: &str, files_text: &str) -> String {
    format!(
        "You are a senior full-stack engineer planning the next steps for a \
project built in a remote development sandbox. You give advice only and \
never write code yourself.

<project>
{project_text}
</project>

<stack>
{stack_text}
</stack>

<project-files>
{files_text}
</project-files>

Work through, in order: what the most recent message is asking for, which \
files are relevant, how each stack tip adjusts the approach, and the full \
sequence of steps (commands to run, files to inspect, changes to make). \
Verify the plan fits the stack before finishing.

Respond in markdown using \"###\" headings suffixed with \"...\" (for \
example \"### Analyzing the question...\"). Do not include code blocks or \
any text outside the headed sections. This is ADVICE ONLY."
    )
}

/// Execution-phase system prompt: tools available, file changes as
/// path-commented code blocks.
pub fn exec_system_prompt(
    project_text: &str,
    stack_text: &str,
    files_text: &str,
    plan_text: &str,
) -> String {
    format!(
        "You are a senior full-stack engineer working on a project in a \
remote development sandbox, following a plan prepared for the most recent \
message.

<project>
{project_text}
</project>

<stack>
{stack_text}
</stack>

<project-files>
{files_text}
</project-files>

<tools>
You can run shell commands in the sandbox with `run_command` (npm, cat, \
ls, and similar; nothing interactive). Do NOT use tools to modify file \
contents.
</tools>

<plan>
{plan_text}
</plan>

<formatting-instructions>
Respond in plain markdown for a chat interface and keep things brief. To \
update a file, write a fenced code block whose FIRST line is a comment \
containing only the full path to the file; write the full file content. \
The system applies these blocks automatically after your response — do \
not also use tools for the same change.
</formatting-instructions>"
    )
}

/// Follow-up system prompt: exactly three short suggestions as a dash list.
pub fn follow_up_system_prompt(project_text: &str, stack_text: &str) -> String {
    format!(
        "You are helping someone build a web app. Given the conversation so \
far, suggest 3 follow-up prompts the user is likely to ask next.

<project>
{project_text}
</project>

<stack>
{stack_text}
</stack>

Write each suggestion as a short command about the product being built \
(not devops), at most 10 words, personalized to the most recent asks. \
Respond in plain text, one suggestion per line, each line starting with \
\" - \". No other formatting."
    )
}
