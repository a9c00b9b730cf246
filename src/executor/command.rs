//! Executor that runs configured external programs.

use super::{ExecutionError, Executor, TemplateContext};
use crate::config::ToolConfig;
use crate::queue::{JobOutput, JobPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Runs one `[[tools]]` entry per job.
///
/// Each job gets a fresh output path under the storage directory so
/// concurrent conversions of same-named uploads never collide. The child
/// process is killed if the job is cancelled or its future is dropped.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    tools: HashMap<String, ToolConfig>,
    output_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new(tools: &[ToolConfig], output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools: tools
                .iter()
                .map(|tool| (tool.name.clone(), tool.clone()))
                .collect(),
            output_dir: output_dir.into(),
        }
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn output_path(&self, tool: &ToolConfig, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "output".to_string());
        let extension = tool.output_extension.trim_start_matches('.');
        self.output_dir
            .join(format!("{stem}-{}.{extension}", Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(
        &self,
        tool: &str,
        payload: &JobPayload,
        cancel: CancellationToken,
    ) -> Result<JobOutput, ExecutionError> {
        let config = self
            .tools
            .get(tool)
            .ok_or_else(|| ExecutionError::UnknownTool(tool.to_string()))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output_path = self.output_path(config, &payload.input);

        // Options go in first so the path variables always win.
        let mut ctx = TemplateContext::new();
        for (key, value) in &payload.options {
            ctx.set(key, value);
        }
        let ctx = ctx.with_paths(&payload.input, &output_path, &self.output_dir);
        let args = ctx.substitute_all(&config.args);

        tracing::debug!(tool, program = ?config.program, ?args, "Spawning conversion");

        let child = Command::new(&config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::Spawn {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;

        let output = tokio::select! {
            result = child.wait_with_output() => result?,
            _ = cancel.cancelled() => {
                tracing::debug!(tool, "Conversion cancelled, killing process");
                return Err(ExecutionError::Cancelled);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ExecutionError::NonZeroExit {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "no error output".to_string()
                } else {
                    stderr
                },
            });
        }

        let metadata = tokio::fs::metadata(&output_path).await.map_err(|_| {
            ExecutionError::MissingOutput {
                tool: tool.to_string(),
                path: output_path.display().to_string(),
            }
        })?;

        Ok(JobOutput {
            path: output_path,
            size_bytes: metadata.len(),
        })
    }

    fn timeout_for(&self, tool: &str) -> Option<Duration> {
        self.tools.get(tool).and_then(ToolConfig::timeout)
    }

    fn supports(&self, tool: &str) -> bool {
        self.has_tool(tool)
    }
}
