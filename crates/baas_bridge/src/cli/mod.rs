//! BaaS 命令行工具的封装
//!
//! 只允许白名单中的子命令，参数直接传给子进程，不经过 shell。

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// 单条命令的最长执行时间
const CLI_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// 允许执行的子命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CliCommand {
    DbDiff,
    DbDump,
    GenTypes,
    MigrationList,
    FunctionsDeploy,
    Status,
}

impl CliCommand {
    fn argv(&self) -> &'static [&'static str] {
        match self {
            CliCommand::DbDiff => &["db", "diff"],
            CliCommand::DbDump => &["db", "dump"],
            CliCommand::GenTypes => &["gen", "types", "typescript"],
            CliCommand::MigrationList => &["migration", "list"],
            CliCommand::FunctionsDeploy => &["functions", "deploy"],
            CliCommand::Status => &["status"],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CliOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct BaasCli {
    program: String,
    workdir: Option<PathBuf>,
}

impl BaasCli {
    pub fn new(program: impl Into<String>, workdir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            workdir,
        }
    }

    fn build_args(command: CliCommand, extra: &[String]) -> Result<Vec<String>, CliError> {
        if let Some(bad) = extra.iter().find(|a| a.contains('\0')) {
            return Err(CliError::InvalidArgument(format!("{:?}", bad)));
        }
        let mut args: Vec<String> = command.argv().iter().map(|s| s.to_string()).collect();
        args.extend(extra.iter().cloned());
        Ok(args)
    }

    /// 执行子命令；非零退出码不视为错误，由调用方检查 `success`
    pub async fn run(&self, command: CliCommand, extra: &[String]) -> Result<CliOutput, CliError> {
        let args = Self::build_args(command, extra)?;
        let rendered = format!("{} {}", self.program, args.join(" "));
        info!("执行命令: {}", rendered);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| CliError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let output = tokio::time::timeout(CLI_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| CliError::Timeout(CLI_TIMEOUT))?
            .map_err(|source| CliError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        debug!("命令 {} 退出码: {:?}", rendered, output.status.code());
        Ok(CliOutput {
            command: rendered,
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
