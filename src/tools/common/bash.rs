//! Bash tool: gated, time-boxed, cancellable command execution
//!
//! The pipeline is parse → external-path check → permission gate → risk
//! gate → spawn → stream → finalize. Every check runs before the process
//! exists; timeout and abort degrade to a successful partial result because
//! partial output is still useful context for the model.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::config::ExecConfig;
use crate::core::context::{Ask, ToolContext};
use crate::core::error::{CoreError, CoreResult};
use crate::permissions::PermissionAction;
use crate::risk::{self, RiskAssessment};
use crate::shell::parser::{parse_command_line, SimpleCommand};
use crate::tools::tool::{Tool, ToolOutput};

/// Command heads whose path arguments get the external-directory check
const PATH_MUTATING_HEADS: &[&str] = &["cd", "rm", "cp", "mv", "mkdir", "touch", "chmod", "chown"];

/// Characters of the command shown in sensitive-command approvals
const RISK_PREVIEW_LEN: usize = 160;

/// Bash tool for executing shell commands under supervision
pub struct BashTool {
    project_root: PathBuf,
    shell: String,
    default_timeout: Duration,
    max_output: usize,
}

/// Input for the bash tool
#[derive(Debug, Deserialize)]
struct BashInput {
    /// The command to execute
    command: String,
    /// Optional timeout in milliseconds
    timeout: Option<u64>,
    /// Working directory; defaults to the project root
    workdir: Option<String>,
    /// Short description of what the command does
    description: Option<String>,
}

impl BashTool {
    pub fn new(project_root: impl Into<PathBuf>, exec: &ExecConfig) -> Self {
        Self {
            project_root: normalize(&project_root.into()),
            shell: exec.shell(),
            default_timeout: exec.timeout(),
            max_output: exec.max_output(),
        }
    }

    /// Gate a path that escapes the project root through the
    /// `external_directory` policy
    async fn check_external_directory(
        &self,
        ctx: &ToolContext,
        path: &Path,
        command: &str,
    ) -> CoreResult<()> {
        if path.starts_with(&self.project_root) {
            return Ok(());
        }
        let subject = path.display().to_string();
        match ctx.rules.evaluate("external_directory", &subject) {
            PermissionAction::Allow => Ok(()),
            PermissionAction::Ask => {
                ctx.ask(Ask {
                    kind: "external_directory".into(),
                    patterns: vec![subject.clone(), format!("{subject}/*")],
                    always: Vec::new(),
                    title: format!(
                        "This command references paths outside of {}",
                        self.project_root.display()
                    ),
                    metadata: json!({ "command": command }),
                })
                .await
            }
            PermissionAction::Deny => Err(CoreError::ExternalDirectory {
                path: subject,
                command: command.to_string(),
            }),
        }
    }

    /// Resolve every path argument of path-mutating commands and gate the
    /// ones that leave the project root
    async fn check_command_paths(
        &self,
        ctx: &ToolContext,
        commands: &[SimpleCommand],
        cwd: &Path,
        command: &str,
    ) -> CoreResult<()> {
        for cmd in commands {
            if !PATH_MUTATING_HEADS.contains(&cmd.head.as_str()) {
                continue;
            }
            for arg in &cmd.args {
                if arg.starts_with('-') || (cmd.head == "chmod" && arg.starts_with('+')) {
                    continue;
                }
                let resolved = resolve(cwd, arg);
                tracing::debug!(arg = %arg, resolved = %resolved.display(), "resolved path");
                self.check_external_directory(ctx, &resolved, command).await?;
            }
        }
        Ok(())
    }

    /// Evaluate every simple command against the bash rules; deny aborts,
    /// ask verdicts batch into one approval for the whole line
    async fn gate_permissions(
        &self,
        ctx: &ToolContext,
        commands: &[SimpleCommand],
        command: &str,
    ) -> CoreResult<()> {
        let mut ask_patterns = std::collections::BTreeSet::new();
        for cmd in commands {
            // cd already passed the external-directory check; keeping it out
            // of the pattern gate keeps relative-directory workflows usable.
            if cmd.head == "cd" {
                continue;
            }
            match ctx.rules.evaluate_command(&cmd.head, &cmd.args) {
                PermissionAction::Allow => {}
                PermissionAction::Deny => {
                    return Err(CoreError::PermissionDenied {
                        command: cmd.joined(),
                        rules: ctx.rules.rules_dump("bash"),
                    });
                }
                PermissionAction::Ask => {
                    ask_patterns.insert(generalize(cmd));
                }
            }
        }
        if !ask_patterns.is_empty() {
            let patterns: Vec<String> = ask_patterns.into_iter().collect();
            ctx.ask(Ask {
                kind: "bash".into(),
                patterns: patterns.clone(),
                always: patterns.clone(),
                title: command.to_string(),
                metadata: json!({ "command": command, "patterns": patterns }),
            })
            .await?;
        }
        Ok(())
    }

    /// Layer the independent risk approval on top of the permission gate
    async fn gate_risk(&self, ctx: &ToolContext, command: &str) -> CoreResult<()> {
        let RiskAssessment::Sensitive {
            key,
            reason,
            description,
        } = risk::classify(command)
        else {
            return Ok(());
        };
        match ctx.rules.evaluate("bash_sensitive", key) {
            PermissionAction::Allow => Ok(()),
            PermissionAction::Deny => Err(CoreError::PermissionDenied {
                command: command.to_string(),
                rules: ctx.rules.rules_dump("bash_sensitive"),
            }),
            PermissionAction::Ask => {
                let preview: String = command.chars().take(RISK_PREVIEW_LEN).collect();
                ctx.ask(Ask {
                    kind: "bash_sensitive".into(),
                    patterns: vec![key.to_string()],
                    always: Vec::new(),
                    title: format!("Sensitive command: {reason}"),
                    metadata: json!({
                        "rule": key,
                        "reason": reason,
                        "description": description,
                        "command": preview,
                        "agent": ctx.agent.name,
                        "engagement": ctx.workspace.as_ref().map(|w| w.engagement_id.clone()),
                    }),
                })
                .await
            }
        }
    }
}

/// Generalize an ask verdict into a pattern covering the command family
///
/// `head subcommand *` when a non-flag second token exists, else `head *`.
fn generalize(cmd: &SimpleCommand) -> String {
    match cmd.args.iter().find(|arg| !arg.starts_with('-')) {
        Some(sub) => format!("{} {} *", cmd.head, sub),
        None => format!("{} *", cmd.head),
    }
}

/// Lexically normalize a path (no filesystem access: deletion targets may
/// not exist yet, creation targets never do)
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve an argument to an absolute path relative to the working directory
fn resolve(cwd: &Path, arg: &str) -> PathBuf {
    let candidate = Path::new(arg);
    if candidate.is_absolute() {
        normalize(candidate)
    } else {
        normalize(&cwd.join(candidate))
    }
}

/// Kill the spawned process and, on Unix, its whole process group
async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
    let _ = child.start_kill();
}

/// Truncate at a char boundary at or below `max`
fn truncate_chars(output: &mut String, max: usize) {
    let mut end = max;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    output.truncate(end);
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the project directory with optional timeout. Use for terminal operations like git, build tools, and scanners."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": "Optional timeout in milliseconds"
                },
                "workdir": {
                    "type": "string",
                    "description": "The working directory to run the command in. Use this instead of 'cd' commands."
                },
                "description": {
                    "type": "string",
                    "description": "Clear, concise description of what this command does in 5-10 words"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> CoreResult<ToolOutput> {
        let input: BashInput = serde_json::from_value(input)?;
        let timeout = input
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);
        let cwd = match &input.workdir {
            Some(dir) => resolve(&self.project_root, dir),
            None => self.project_root.clone(),
        };

        // Parse first: unparseable input fails before any check runs.
        let commands = parse_command_line(&input.command)?;

        self.check_external_directory(ctx, &cwd, &input.command).await?;
        self.check_command_paths(ctx, &commands, &cwd, &input.command).await?;
        self.gate_permissions(ctx, &commands, &input.command).await?;
        self.gate_risk(ctx, &input.command).await?;

        tracing::info!(command = %input.command, cwd = %cwd.display(), "executing command");

        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&input.command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn()?;

        ctx.push_metadata(
            input.description.clone(),
            json!({ "output": "", "description": input.description }),
        );

        let buffer: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
        let mut readers = Vec::new();
        let streams: Vec<Option<Box<dyn tokio::io::AsyncRead + Send + Unpin>>> = vec![
            child
                .stdout
                .take()
                .map(|s| Box::new(s) as Box<dyn tokio::io::AsyncRead + Send + Unpin>),
            child
                .stderr
                .take()
                .map(|s| Box::new(s) as Box<dyn tokio::io::AsyncRead + Send + Unpin>),
        ];
        for stream in streams.into_iter().flatten() {
            let buffer = buffer.clone();
            let ctx = ctx.clone();
            let description = input.description.clone();
            let max_output = self.max_output;
            readers.push(tokio::spawn(async move {
                let mut stream = stream;
                let mut chunk = [0u8; 8192];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let snapshot = {
                                let mut buffer = buffer.lock().unwrap();
                                // Stop accumulating once past the ceiling;
                                // the trailer notes the cut.
                                if buffer.len() <= max_output {
                                    buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
                                    Some(buffer.clone())
                                } else {
                                    None
                                }
                            };
                            if let Some(snapshot) = snapshot {
                                ctx.push_metadata(
                                    description.clone(),
                                    json!({ "output": snapshot, "description": description }),
                                );
                            }
                        }
                    }
                }
            }));
        }

        let mut timed_out = false;
        let mut aborted = false;
        let mut exit = -1;
        let mut exited = false;

        tokio::select! {
            status = child.wait() => {
                exit = status?.code().unwrap_or(-1);
                exited = true;
            }
            _ = tokio::time::sleep(timeout + Duration::from_millis(100)) => {
                timed_out = true;
            }
            _ = ctx.abort.cancelled() => {
                aborted = true;
            }
        }
        if !exited {
            kill_tree(&mut child).await;
            if let Ok(status) = child.wait().await {
                exit = status.code().unwrap_or(-1);
            }
        }
        for reader in readers {
            let _ = reader.await;
        }

        let mut output = buffer.lock().unwrap().clone();
        let mut notes = Vec::new();
        if output.len() > self.max_output {
            truncate_chars(&mut output, self.max_output);
            notes.push(format!(
                "bash tool truncated output as it exceeded {} char limit",
                self.max_output
            ));
        }
        if timed_out {
            notes.push(format!(
                "bash tool terminated command after exceeding timeout {} ms",
                timeout.as_millis()
            ));
        }
        if aborted {
            notes.push("User aborted the command".to_string());
        }
        if !notes.is_empty() {
            output.push_str("\n\n<bash_metadata>\n");
            output.push_str(&notes.join("\n"));
            output.push_str("\n</bash_metadata>");
        }

        tracing::debug!(exit, timed_out, aborted, len = output.len(), "command finished");

        let title = input
            .description
            .clone()
            .unwrap_or_else(|| input.command.clone());
        Ok(ToolOutput::new(
            title,
            output.clone(),
            json!({ "output": output, "exit": exit, "description": input.description }),
        ))
    }
}
