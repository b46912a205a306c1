//! Text-completion backends.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{instrument, warn};

use super::config::{CompletionConfig, SYSTEM_PLACEHOLDER};
use super::process::run_with_timeout;

/// A service that turns a prompt into completion text.
///
/// Implementations block until the reply is available; this is the only
/// suspension point of a step.
pub trait CompletionService {
    fn complete(&self, prompt: &str, system: &str) -> Result<String>;
}

/// Completion through an external CLI.
///
/// The prompt is written to stdin and stdout is the reply. Any argument equal
/// to `{system}` is replaced by the system prompt.
#[derive(Debug, Clone)]
pub struct CommandCompletion {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandCompletion {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }

    pub fn from_config(cfg: &CompletionConfig) -> Self {
        Self::new(cfg.command.clone(), cfg.timeout(), cfg.output_limit_bytes)
    }

    fn build_command(&self, system: &str) -> Result<Command> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("completion command is empty");
        };
        let mut cmd = Command::new(program);
        cmd.args(args.iter().map(|arg| {
            if arg == SYSTEM_PLACEHOLDER {
                system
            } else {
                arg.as_str()
            }
        }));
        Ok(cmd)
    }
}

impl CompletionService for CommandCompletion {
    #[instrument(skip_all, fields(program = self.command.first().map(String::as_str), prompt_len = prompt.len()))]
    fn complete(&self, prompt: &str, system: &str) -> Result<String> {
        let cmd = self.build_command(system)?;
        let output = run_with_timeout(
            cmd,
            Some(prompt.as_bytes().to_vec()),
            self.timeout,
            self.output_limit_bytes,
        )
        .context("run completion command")?;
        if output.timed_out {
            bail!(
                "completion command timed out after {}s",
                self.timeout.as_secs()
            );
        }
        if !output.status.success() {
            bail!(
                "completion command exited with {:?}: {}",
                output.status.code(),
                output.stderr_text()
            );
        }
        String::from_utf8(output.stdout).context("completion output is not UTF-8")
    }
}

/// Completion text, or empty text if the service failed.
///
/// Empty text flows into the output validator's failure path like any other
/// unusable reply.
pub fn complete_or_empty<C: CompletionService + ?Sized>(
    completion: &C,
    prompt: &str,
    system: &str,
) -> String {
    match completion.complete(prompt, system) {
        Ok(text) => text,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "completion failed; treating reply as empty");
            String::new()
        }
    }
}
