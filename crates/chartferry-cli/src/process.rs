//! External tool invocation
//!
//! Every helm and gpg call goes through [`CommandRunner`], so the pipeline
//! can be driven against a recording fake in tests. A call is awaited to
//! completion; there is no cancellation once a tool has started.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One invocation of an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Written to the tool's stdin, which is then closed
    pub stdin: Option<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// First argument, the helm/gpg subcommand or flag
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Shell-like rendering for logs; stdin content is never shown
impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the tool was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code for messages, `signal` when there is none
    pub fn describe_exit(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "signal".to_string(),
        }
    }
}

/// Runs external tools. Spawn failures are `Err`, non-zero exits are not.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput>;
}

/// Runs tools as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        tracing::debug!(command = %command, "running");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (&command.stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let output = ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %command, status = %output.describe_exit(), "finished");
        Ok(output)
    }
}

/// Locations of the external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub helm: String,
    pub gpg: String,
}

impl ToolPaths {
    pub fn new(helm: impl Into<String>, gpg: impl Into<String>) -> Self {
        Self {
            helm: helm.into(),
            gpg: gpg.into(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self::new("helm", "gpg")
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording runner for tests

    use super::*;
    use std::sync::Mutex;

    type Handler = Box<dyn Fn(&ToolCommand) -> std::io::Result<ToolOutput> + Send + Sync>;

    /// Records every command and answers through a handler
    pub struct RecordingRunner {
        handler: Handler,
        calls: Mutex<Vec<ToolCommand>>,
    }

    impl RecordingRunner {
        pub fn new<F>(handler: F) -> Self
        where
            F: Fn(&ToolCommand) -> std::io::Result<ToolOutput> + Send + Sync + 'static,
        {
            Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Every command succeeds with no output
        pub fn succeeding() -> Self {
            Self::new(|_| Ok(ok("")))
        }

        pub fn calls(&self) -> Vec<ToolCommand> {
            self.calls.lock().unwrap().clone()
        }

        /// Commands rendered as text
        pub fn rendered(&self) -> Vec<String> {
            self.calls().iter().map(ToString::to_string).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
            self.calls.lock().unwrap().push(command.clone());
            (self.handler)(command)
        }
    }

    pub fn ok(stdout: &str) -> ToolOutput {
        ToolOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> ToolOutput {
        ToolOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}
