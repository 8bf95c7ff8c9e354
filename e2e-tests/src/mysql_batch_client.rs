use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

/// One invocation of the mysql_batch binary.
#[derive(Debug, Clone)]
pub struct MysqlBatchInstance {
    pub binary_path: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub stdin: Option<String>,
}

#[derive(Debug)]
pub struct RunOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn expect_exit(&self, code: i32) -> Result<()> {
        if self.exit_code != Some(code) {
            return Err(anyhow::anyhow!(
                "expected exit code {}, got {:?}\nstdout:\n{}\nstderr:\n{}",
                code,
                self.exit_code,
                self.stdout,
                self.stderr
            ));
        }
        Ok(())
    }
}

impl MysqlBatchInstance {
    pub fn new(binary_path: &str) -> Self {
        Self {
            binary_path: binary_path.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            stdin: None,
        }
    }

    pub fn args<'a>(mut self, args: impl IntoIterator<Item = &'a str>) -> Self {
        self.args.extend(args.into_iter().map(str::to_string));
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Text piped to the confirmation prompt. Without it stdin is closed, which declines.
    pub fn with_stdin(mut self, input: &str) -> Self {
        self.stdin = Some(input.to_string());
        self
    }

    fn resolve_binary(&self) -> Result<PathBuf> {
        let binary_path = if self.binary_path.starts_with("../") {
            let current_dir = std::env::current_dir()?;
            current_dir.join(&self.binary_path).canonicalize()?
        } else {
            PathBuf::from(&self.binary_path)
        };

        if !binary_path.exists() {
            return Err(anyhow::anyhow!(
                "mysql_batch binary not found at: {}",
                binary_path.display()
            ));
        }
        Ok(binary_path)
    }

    /// Runs the binary to completion and captures its output.
    pub async fn run(&self) -> Result<RunOutput> {
        let binary_path = self.resolve_binary()?;

        let mut cmd = TokioCommand::new(&binary_path);
        cmd.args(&self.args)
            .envs(self.env.clone())
            .stdin(if self.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Executing command: {:?}", cmd);
        let mut child = cmd.spawn().context("Client: Failed to start mysql_batch")?;

        if let (Some(input), Some(mut stdin)) = (&self.stdin, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await.context("Client: Failed to write stdin")?;
            // Dropping the handle closes stdin so unanswered prompts see EOF.
            drop(stdin);
        }

        let output = child.wait_with_output().await.context("Client: mysql_batch did not finish")?;
        let run = RunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("mysql_batch exited with {:?}", run.exit_code);

        Ok(run)
    }
}
