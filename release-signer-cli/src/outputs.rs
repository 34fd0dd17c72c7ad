use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Step outputs describing what was signed.
#[derive(Debug)]
pub struct SignedOutputs {
    pub signed_release_file: String,
    pub signed_release_files: String,
    pub nof_signed_release_files: usize,
    pub files: Vec<String>,
}

impl SignedOutputs {
    pub fn new(files: &[PathBuf]) -> Self {
        let files: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        Self {
            signed_release_file: files.first().cloned().unwrap_or_default(),
            signed_release_files: files.join(":"),
            nof_signed_release_files: files.len(),
            files,
        }
    }

    /// `key=value` pairs in publishing order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (
                "signedReleaseFile".to_string(),
                self.signed_release_file.clone(),
            ),
            (
                "signedReleaseFiles".to_string(),
                self.signed_release_files.clone(),
            ),
            (
                "nofSignedReleaseFiles".to_string(),
                self.nof_signed_release_files.to_string(),
            ),
        ];

        for (index, file) in self.files.iter().enumerate() {
            pairs.push((format!("signedReleaseFile{}", index), file.clone()));
        }

        pairs
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::Map::new();
        for (key, file) in self.pairs() {
            let entry = if key == "nofSignedReleaseFiles" {
                serde_json::Value::from(self.nof_signed_release_files)
            } else {
                serde_json::Value::from(file)
            };
            value.insert(key, entry);
        }
        serde_json::Value::Object(value)
    }

    /// Append to the `GITHUB_OUTPUT` file.
    pub fn append_to(&self, output_file: &Path) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_file)?;

        for (key, value) in self.pairs() {
            writeln!(file, "{}={}", key, value)?;
        }

        Ok(())
    }
}
