use std::path::PathBuf;

/// Everything that can stop a signing run. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("Android SDK not found. Set ANDROID_HOME")]
    AndroidHomeUnset,

    #[error("Android build-tools directory not found @ {}", .0.display())]
    BuildToolsMissing(PathBuf),

    #[error("No build-tools versions found in {}", .0.display())]
    NoBuildToolsVersions(PathBuf),

    #[error("Unable to locate executable file: {name}")]
    ToolNotFound {
        name: String,
        #[source]
        source: which::Error,
    },

    /// `output` is the tool's stderr, or its stdout when stderr is empty.
    #[error("{program} failed with {}: {output}", exit_code_display(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Release directory not found @ {}", .0.display())]
    ReleaseDirMissing(PathBuf),

    #[error("No release files (.apk or .aab) found in {}", .0.display())]
    NoReleaseFiles(PathBuf),

    #[error("Signing key is not valid base64")]
    InvalidSigningKey(#[from] base64::DecodeError),

    #[error("Invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

pub type Result<T, E = SignError> = std::result::Result<T, E>;
