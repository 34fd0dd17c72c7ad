use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SignError};

/// Optional `release-signer.toml`.
///
/// Only non-secret settings live here; passwords and keys come from the
/// command line or the CI environment.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SignerConfig {
    pub sdk: SdkConfig,
    pub signing: SigningConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SdkConfig {
    pub android_home: Option<PathBuf>,
    pub build_tools_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SigningConfig {
    pub alias: Option<String>,
    pub release_directory: Option<PathBuf>,
}

impl SignerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SignError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SignError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
