use std::cmp::Ordering;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Result, SignError};

/// A `build-tools/<version>` directory name, compared as a numeric tuple.
///
/// Components are split on `.`; anything that does not parse as a number
/// counts as 0, and a shorter tuple is padded with zeros, so `"30"` and
/// `"30.0.0"` compare equal numerically. Ties fall back to the raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildToolsVersion {
    name: String,
    parts: Vec<u64>,
}

impl BuildToolsVersion {
    pub fn parse(name: &str) -> Self {
        let parts = name
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect();

        Self {
            name: name.to_string(),
            parts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn compare_numeric(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| {
                let a = self.parts.get(i).copied().unwrap_or(0);
                let b = other.parts.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl Ord for BuildToolsVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_numeric(other)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for BuildToolsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for BuildToolsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Where to look for the SDK, before anything is checked on disk.
///
/// APK signing resolves this lazily so that signing only bundles works
/// without an SDK installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkLocation {
    pub android_home: Option<PathBuf>,
    pub build_tools_version: Option<String>,
}

impl SdkLocation {
    /// Read `ANDROID_HOME` and `BUILD_TOOLS_VERSION`. Empty values count as unset.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var_os(name))
    }

    fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> Self {
        Self {
            android_home: var("ANDROID_HOME")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            build_tools_version: var("BUILD_TOOLS_VERSION")
                .and_then(|v| v.into_string().ok())
                .filter(|v| !v.is_empty()),
        }
    }

    pub fn resolve(&self) -> Result<AndroidSdk> {
        let android_home = self
            .android_home
            .as_ref()
            .ok_or(SignError::AndroidHomeUnset)?;
        AndroidSdk::resolve(android_home, self.build_tools_version.as_deref())
    }
}

/// An Android SDK with one build-tools version picked out.
#[derive(Debug, Clone)]
pub struct AndroidSdk {
    pub sdk_path: PathBuf,
    pub build_tools_version: String,
}

impl AndroidSdk {
    /// Find the SDK from `ANDROID_HOME`, honouring `BUILD_TOOLS_VERSION`.
    pub fn find() -> Result<Self> {
        SdkLocation::from_env().resolve()
    }

    /// Pick a build-tools version under `sdk_path`.
    ///
    /// `preferred` wins whenever its directory exists, even if a numerically
    /// higher version is installed. Otherwise the highest version is used.
    pub fn resolve(sdk_path: impl Into<PathBuf>, preferred: Option<&str>) -> Result<Self> {
        let sdk_path = sdk_path.into();
        let build_tools_dir = sdk_path.join("build-tools");

        if let Some(version) = preferred.filter(|v| !v.is_empty()) {
            if build_tools_dir.join(version).is_dir() {
                tracing::debug!("Using requested build-tools version: {}", version);
                return Ok(Self {
                    sdk_path,
                    build_tools_version: version.to_string(),
                });
            }
            tracing::debug!(
                "Requested build-tools {} not installed, falling back to highest",
                version
            );
        }

        let version = highest_build_tools_version(&build_tools_dir)?;
        tracing::debug!("Using highest build-tools version: {}", version);

        Ok(Self {
            sdk_path,
            build_tools_version: version.name().to_string(),
        })
    }

    pub fn build_tools_dir(&self) -> PathBuf {
        self.sdk_path
            .join("build-tools")
            .join(&self.build_tools_version)
    }

    /// Get path to a build tool
    pub fn tool_path(&self, tool: &str) -> PathBuf {
        self.build_tools_dir().join(tool)
    }

    pub fn zipalign(&self) -> PathBuf {
        self.tool_path("zipalign")
    }

    pub fn apksigner(&self) -> PathBuf {
        self.tool_path("apksigner")
    }
}

/// Highest version among the subdirectories of `build_tools_dir`.
pub fn highest_build_tools_version(build_tools_dir: &Path) -> Result<BuildToolsVersion> {
    if !build_tools_dir.is_dir() {
        return Err(SignError::BuildToolsMissing(build_tools_dir.to_path_buf()));
    }

    let mut highest: Option<BuildToolsVersion> = None;
    for entry in std::fs::read_dir(build_tools_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() && !entry.path().is_dir() {
            continue;
        }

        let version = BuildToolsVersion::parse(&entry.file_name().to_string_lossy());
        if highest.as_ref().is_none_or(|current| version > *current) {
            highest = Some(version);
        }
    }

    highest.ok_or_else(|| SignError::NoBuildToolsVersions(build_tools_dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn v(name: &str) -> BuildToolsVersion {
        BuildToolsVersion::parse(name)
    }

    fn sdk_with(versions: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for version in versions {
            fs::create_dir_all(dir.path().join("build-tools").join(version)).unwrap();
        }
        dir
    }

    #[test]
    fn numeric_ordering() {
        assert!(v("30.0.3") > v("29.0.2"));
        assert!(v("29.0.2") > v("9"));
        assert!(v("10.0.0") > v("9.9.9"));
        assert!(v("34.0.0") > v("34"));
        assert_eq!(v("34").compare_numeric(&v("34.0.0")), Ordering::Equal);
    }

    #[test]
    fn non_numeric_components_count_as_zero() {
        assert_eq!(v("34.0.0-rc1").compare_numeric(&v("34.0.0")), Ordering::Equal);
        assert!(v("34.0.1-rc1") > v("34.0.0"));
        assert_eq!(v("latest").compare_numeric(&v("0")), Ordering::Equal);
    }

    #[test]
    fn picks_highest_installed() {
        let sdk = sdk_with(&["29.0.2", "30.0.3", "9", "30.0.2"]);
        let resolved = AndroidSdk::resolve(sdk.path(), None).unwrap();
        assert_eq!(resolved.build_tools_version, "30.0.3");
        assert_eq!(
            resolved.zipalign(),
            sdk.path().join("build-tools/30.0.3/zipalign")
        );
    }

    #[test]
    fn preferred_version_wins_over_higher() {
        let sdk = sdk_with(&["29.0.2", "34.0.0"]);
        let resolved = AndroidSdk::resolve(sdk.path(), Some("29.0.2")).unwrap();
        assert_eq!(resolved.build_tools_version, "29.0.2");
    }

    #[test]
    fn missing_preferred_version_falls_back() {
        let sdk = sdk_with(&["29.0.2", "34.0.0"]);
        let resolved = AndroidSdk::resolve(sdk.path(), Some("31.0.0")).unwrap();
        assert_eq!(resolved.build_tools_version, "34.0.0");

        let resolved = AndroidSdk::resolve(sdk.path(), Some("")).unwrap();
        assert_eq!(resolved.build_tools_version, "34.0.0");
    }

    #[test]
    fn files_are_not_versions() {
        let sdk = sdk_with(&["29.0.2"]);
        fs::write(sdk.path().join("build-tools/99.0.0"), b"not a dir").unwrap();
        let resolved = AndroidSdk::resolve(sdk.path(), None).unwrap();
        assert_eq!(resolved.build_tools_version, "29.0.2");
    }

    #[test]
    fn missing_build_tools_dir() {
        let sdk = TempDir::new().unwrap();
        let err = AndroidSdk::resolve(sdk.path(), None).unwrap_err();
        assert!(matches!(err, SignError::BuildToolsMissing(_)));
        assert!(err.to_string().contains("build-tools directory not found"));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let pairs: Vec<(String, OsString)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn empty_env_values_are_unset() {
        let location = SdkLocation::from_vars(vars(&[
            ("ANDROID_HOME", ""),
            ("BUILD_TOOLS_VERSION", ""),
        ]));
        assert_eq!(location, SdkLocation::default());
        assert!(matches!(location.resolve(), Err(SignError::AndroidHomeUnset)));
    }

    #[test]
    fn env_values_are_read() {
        let location = SdkLocation::from_vars(vars(&[
            ("ANDROID_HOME", "/opt/android-sdk"),
            ("BUILD_TOOLS_VERSION", "34.0.0"),
        ]));
        assert_eq!(location.android_home, Some(PathBuf::from("/opt/android-sdk")));
        assert_eq!(location.build_tools_version.as_deref(), Some("34.0.0"));

        let location = SdkLocation::from_vars(vars(&[("ANDROID_HOME", "/opt/android-sdk")]));
        assert!(location.build_tools_version.is_none());
    }

    #[test]
    fn location_without_android_home() {
        let err = SdkLocation::default().resolve().unwrap_err();
        assert!(matches!(err, SignError::AndroidHomeUnset));
    }

    #[test]
    fn location_resolves_preferred() {
        let sdk = sdk_with(&["33.0.1", "34.0.0"]);
        let location = SdkLocation {
            android_home: Some(sdk.path().to_path_buf()),
            build_tools_version: Some("33.0.1".into()),
        };
        let resolved = location.resolve().unwrap();
        assert_eq!(resolved.build_tools_dir(), sdk.path().join("build-tools/33.0.1"));
    }

    #[test]
    fn empty_build_tools_dir() {
        let sdk = TempDir::new().unwrap();
        fs::create_dir(sdk.path().join("build-tools")).unwrap();
        let err = AndroidSdk::resolve(sdk.path(), None).unwrap_err();
        assert!(matches!(err, SignError::NoBuildToolsVersions(_)));
    }
}
