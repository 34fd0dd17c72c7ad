use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, SignError};

/// How the signers reach the outside world.
///
/// Arguments are passed straight to the program without a shell, so paths
/// with spaces need no quoting.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion. A non-zero exit is an error.
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<Output>;

    /// Resolve an executable on `PATH`.
    fn locate(&self, name: &str) -> Result<PathBuf> {
        which::which(name).map_err(|source| SignError::ToolNotFound {
            name: name.to_string(),
            source,
        })
    }
}

/// Runs real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[OsString]) -> Result<Output> {
        let name = program_name(program);
        tracing::debug!("Running {} {}", program.display(), redact(args).join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| SignError::Spawn {
                program: name.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            tracing::info!("{}: {}", name, line);
        }

        if !output.status.success() {
            return Err(SignError::CommandFailed {
                program: name,
                code: output.status.code(),
                output: failure_output(&stdout, &String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(output)
    }
}

/// zipalign reports verification failures on stdout, apksigner on stderr.
fn failure_output(stdout: &str, stderr: &str) -> String {
    match (stdout.trim(), stderr.trim()) {
        (out, "") => out.to_string(),
        ("", err) => err.to_string(),
        (out, err) => format!("{}\n{}", err, out),
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

const SECRET_FLAGS: &[&str] = &["--ks-pass", "--key-pass", "-storepass", "-keypass"];

/// Render arguments for logging with password values masked.
pub fn redact(args: &[OsString]) -> Vec<String> {
    let mut rendered = Vec::with_capacity(args.len());
    let mut hide_next = false;

    for arg in args {
        let arg = arg.to_string_lossy();
        if hide_next {
            rendered.push("***".to_string());
            hide_next = false;
            continue;
        }

        if SECRET_FLAGS.iter().any(|flag| *flag == arg) {
            hide_next = true;
        }

        if arg.starts_with("pass:") {
            rendered.push("pass:***".to_string());
        } else {
            rendered.push(arg.into_owned());
        }
    }

    rendered
}
