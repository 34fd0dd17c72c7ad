//! Signing everything a CI build left in its release directory.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Result, SignError};
use crate::runner::CommandRunner;
use crate::signing::{Signer, SigningKey};

/// File name the decoded keystore is written to inside the release directory.
pub const SIGNING_KEY_FILE_NAME: &str = "signingKey.jks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    Apk,
    Aab,
}

impl ReleaseKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "apk" => Some(Self::Apk),
            "aab" => Some(Self::Aab),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFile {
    pub path: PathBuf,
    pub kind: ReleaseKind,
}

impl ReleaseFile {
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = ReleaseKind::from_path(&path)?;
        Some(Self { path, kind })
    }
}

/// `*.apk` and `*.aab` files directly inside `dir`, sorted by path.
pub fn find_release_files(dir: &Path) -> Result<Vec<ReleaseFile>> {
    if !dir.is_dir() {
        return Err(SignError::ReleaseDirMissing(dir.to_path_buf()));
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();
    for extension in ["apk", "aab"] {
        let pattern = format!("{}/*.{}", escaped, extension);
        let entries = glob::glob(&pattern).map_err(|e| SignError::Config {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        for entry in entries {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if !path.is_file() {
                continue;
            }
            if let Some(file) = ReleaseFile::new(path) {
                files.push(file);
            }
        }
    }

    if files.is_empty() {
        return Err(SignError::NoReleaseFiles(dir.to_path_buf()));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("Found {} release file(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// A keystore decoded onto disk. The file is deleted on drop.
#[derive(Debug)]
pub struct KeystoreFile {
    path: PathBuf,
}

impl KeystoreFile {
    /// Decode `encoded` (whitespace allowed, as pasted CI secrets often wrap)
    /// and write it to `dir/signingKey.jks`.
    pub fn materialize(dir: &Path, encoded: &str) -> Result<Self> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(compact)?;

        let path = dir.join(SIGNING_KEY_FILE_NAME);
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options.open(&path)?.write_all(&bytes)?;
        tracing::debug!("Wrote signing key to {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for KeystoreFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Credentials for a release run whose keystore arrives base64-encoded.
#[derive(Clone)]
pub struct ReleaseRequest {
    pub release_dir: PathBuf,
    pub signing_key_base64: String,
    pub alias: String,
    pub store_password: String,
    pub key_password: Option<String>,
}

impl std::fmt::Debug for ReleaseRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseRequest")
            .field("release_dir", &self.release_dir)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

impl<R: CommandRunner> Signer<R> {
    /// Sign one artifact with the signer matching its kind.
    pub async fn sign_release_file(&self, file: &ReleaseFile, key: &SigningKey) -> Result<PathBuf> {
        match file.kind {
            ReleaseKind::Apk => self.sign_apk_file(&file.path, key).await,
            ReleaseKind::Aab => self.sign_aab_file(&file.path, key).await,
        }
    }

    /// Sign every release file in the directory, stopping at the first failure.
    ///
    /// The decoded keystore only exists for the duration of this call.
    pub async fn sign_release_directory(&self, request: &ReleaseRequest) -> Result<Vec<PathBuf>> {
        let files = find_release_files(&request.release_dir)?;
        let keystore =
            KeystoreFile::materialize(&request.release_dir, &request.signing_key_base64)?;
        let key = SigningKey::new(
            keystore.path(),
            request.alias.clone(),
            request.store_password.clone(),
            request.key_password.clone(),
        );

        let mut signed = Vec::with_capacity(files.len());
        for file in &files {
            signed.push(self.sign_release_file(file, &key).await?);
        }

        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn kind_from_extension() {
        assert_eq!(ReleaseKind::from_path(Path::new("a/app.apk")), Some(ReleaseKind::Apk));
        assert_eq!(ReleaseKind::from_path(Path::new("app.aab")), Some(ReleaseKind::Aab));
        assert_eq!(ReleaseKind::from_path(Path::new("mapping.txt")), None);
        assert_eq!(ReleaseKind::from_path(Path::new("apk")), None);
    }

    #[test]
    fn finds_only_release_files_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b.apk", "a.aab", "c.apk", "output-metadata.json", "mapping.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.apk")).unwrap();

        let files = find_release_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.aab", "b.apk", "c.apk"]);
        assert_eq!(files[0].kind, ReleaseKind::Aab);
    }

    #[test]
    fn empty_directory_has_no_release_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let err = find_release_files(dir.path()).unwrap_err();
        assert!(matches!(err, SignError::NoReleaseFiles(_)));
    }

    #[test]
    fn directory_with_glob_characters() {
        let dir = TempDir::new().unwrap();
        let odd = dir.path().join("build [release]");
        fs::create_dir(&odd).unwrap();
        fs::write(odd.join("app.apk"), b"x").unwrap();

        let files = find_release_files(&odd).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn keystore_is_decoded_and_removed() {
        let dir = TempDir::new().unwrap();
        let path = {
            let keystore = KeystoreFile::materialize(dir.path(), "aGVs\nbG8=\n").unwrap();
            assert_eq!(fs::read(keystore.path()).unwrap(), b"hello");
            keystore.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn keystore_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let keystore = KeystoreFile::materialize(dir.path(), "aGVsbG8=").unwrap();
        let mode = fs::metadata(keystore.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_directory_is_not_an_empty_one() {
        let dir = TempDir::new().unwrap();
        let err = find_release_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, SignError::ReleaseDirMissing(_)));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = KeystoreFile::materialize(dir.path(), "not base64!").unwrap_err();
        assert!(matches!(err, SignError::InvalidSigningKey(_)));
        assert!(!dir.path().join(SIGNING_KEY_FILE_NAME).exists());
    }
}
