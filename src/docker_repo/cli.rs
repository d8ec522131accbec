// Engine CLI invocations that have no convenient API equivalent

use crate::error::EngineError;
use tokio::process::Command;

/// `docker stats` template producing `CPU%|MemUsage`.
pub const POLL_FORMAT: &str = "{{.CPUPerc}}|{{.MemUsage}}";

#[derive(Debug, Clone)]
pub struct DockerCli {
    path: String,
}

impl DockerCli {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Run the CLI with `args` (no shell) and return stdout.
    /// The child is killed if the returned future is dropped.
    pub async fn run(&self, args: &[&str]) -> Result<String, EngineError> {
        let output = Command::new(&self.path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(EngineError::Command {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// First line of a non-streaming stats query scoped to one container.
    pub async fn stats_line(&self, container_id: &str) -> Result<String, EngineError> {
        let out = self
            .run(&["stats", "--no-stream", "--format", POLL_FORMAT, container_id])
            .await?;
        Ok(first_line(&out))
    }

    /// Contents of a file inside a running container.
    pub async fn read_file(&self, container_id: &str, path: &str) -> Result<String, EngineError> {
        self.run(&["exec", container_id, "cat", path]).await
    }
}

fn first_line(out: &str) -> String {
    out.trim().lines().next().unwrap_or("").trim().to_string()
}
