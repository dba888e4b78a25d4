/// Command execution utilities for the external layout engine
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};

/// Result from command execution with captured output
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Create from tokio Command output
    fn from_output(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Builder for executing external commands with common patterns
pub struct CommandBuilder {
    command: Command,
    stdin: Option<Vec<u8>>,
    context_msg: Option<String>,
}

impl CommandBuilder {
    /// Create a new command builder
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        let mut command = Command::new(program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Self {
            command,
            stdin: None,
            context_msg: None,
        }
    }

    /// Add a single argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.command.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    /// Feed bytes to the child's stdin, then close it
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.command.stdin(Stdio::piped());
        self.stdin = Some(input.into());
        self
    }

    /// Set context message for error reporting
    pub fn context<S: Into<String>>(mut self, msg: S) -> Self {
        self.context_msg = Some(msg.into());
        self
    }

    async fn execute(mut self) -> std::io::Result<std::process::Output> {
        let mut child = self.command.spawn()?;

        // stdin is fed while stdout and stderr are drained, so a chatty child cannot block us
        let writer = match (self.stdin.take(), child.stdin.take()) {
            (Some(input), Some(stdin)) => Some(tokio::spawn(feed_stdin(stdin, input))),
            _ => None,
        };

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            writer.await.map_err(std::io::Error::other)??;
        }
        Ok(output)
    }

    /// Execute and return raw output
    pub async fn output(self) -> Result<CommandOutput> {
        let context_msg = self.context_msg.clone();
        let output = match context_msg {
            Some(ctx) => self.execute().await.context(ctx)?,
            None => self.execute().await?,
        };
        Ok(CommandOutput::from_output(output))
    }
}

async fn feed_stdin(mut stdin: ChildStdin, input: Vec<u8>) -> std::io::Result<()> {
    let result = async {
        stdin.write_all(&input).await?;
        stdin.shutdown().await
    }
    .await;

    match result {
        // a child that exits without reading its input reports through its status
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

/// Check if a command-line tool is installed
pub async fn check_tool_installed(
    tool_name: &OsStr,
    version_args: &[&str],
    install_url: &str,
) -> Result<()> {
    let output = CommandBuilder::new(tool_name)
        .args(version_args)
        .output()
        .await;

    match output {
        Ok(out) if out.success => Ok(()),
        _ => anyhow::bail!(
            "{} is not installed or not in PATH. Please install from {}",
            tool_name.to_string_lossy(),
            install_url
        ),
    }
}
