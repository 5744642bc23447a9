use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

/// Seam between the pipeline adapters and the real external tools. Tests
/// substitute scripted executors; production code uses the system one.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output>;
}

#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
        command.kill_on_drop(true);
        command.output().await
    }
}
