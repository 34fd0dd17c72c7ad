use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::android_sdk::SdkLocation;
use crate::error::Result;
use crate::runner::{CommandRunner, SystemRunner};

/// Alignment checked by `zipalign -c`, in bytes.
const ZIPALIGN_BOUNDARY: &str = "4";

/// Keystore and credentials used for one signing run.
#[derive(Clone)]
pub struct SigningKey {
    pub keystore: PathBuf,
    pub alias: String,
    pub store_password: String,
    pub key_password: Option<String>,
}

impl SigningKey {
    pub fn new(
        keystore: impl Into<PathBuf>,
        alias: impl Into<String>,
        store_password: impl Into<String>,
        key_password: Option<String>,
    ) -> Self {
        Self {
            keystore: keystore.into(),
            alias: alias.into(),
            store_password: store_password.into(),
            key_password: key_password.filter(|p| !p.is_empty()),
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

/// Aligns, signs and verifies release artifacts through a [`CommandRunner`].
pub struct Signer<R = SystemRunner> {
    runner: R,
    sdk: SdkLocation,
}

impl Signer<SystemRunner> {
    pub fn new(sdk: SdkLocation) -> Self {
        Self::with_runner(SystemRunner, sdk)
    }
}

impl<R: CommandRunner> Signer<R> {
    pub fn with_runner(runner: R, sdk: SdkLocation) -> Self {
        Self { runner, sdk }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Check alignment, sign in place and verify an APK.
    ///
    /// apksigner writes to `<stem>-signed.apk` next to the input, which is
    /// then moved over the original. Returns `apk` itself.
    pub async fn sign_apk_file(&self, apk: &Path, key: &SigningKey) -> Result<PathBuf> {
        let sdk = self.sdk.resolve()?;

        tracing::debug!("Zipaligning APK file");
        let zipalign = sdk.zipalign();
        tracing::debug!("Found 'zipalign' @ {}", zipalign.display());
        let align_args: Vec<OsString> = vec![
            "-c".into(),
            "-v".into(),
            ZIPALIGN_BOUNDARY.into(),
            apk.into(),
        ];
        self.runner.run(&zipalign, &align_args).await?;

        tracing::debug!("Signing APK file");
        let apksigner = sdk.apksigner();
        tracing::debug!("Found 'apksigner' @ {}", apksigner.display());

        let signed_apk = signed_output_path(apk);
        let mut args: Vec<OsString> = vec![
            "sign".into(),
            "--ks".into(),
            key.keystore.clone().into(),
            "--ks-key-alias".into(),
            key.alias.clone().into(),
            "--ks-pass".into(),
            format!("pass:{}", key.store_password).into(),
            "--out".into(),
            signed_apk.clone().into(),
        ];
        if let Some(key_password) = &key.key_password {
            args.push("--key-pass".into());
            args.push(format!("pass:{}", key_password).into());
        }
        args.push(apk.into());
        self.runner.run(&apksigner, &args).await?;

        let move_args: Vec<OsString> = vec![signed_apk.into(), apk.into()];
        self.runner.run(Path::new("mv"), &move_args).await?;

        tracing::debug!("Verifying Signed APK");
        let verify_args: Vec<OsString> = vec!["verify".into(), apk.into()];
        self.runner.run(&apksigner, &verify_args).await?;

        tracing::info!("Signed {}", apk.display());
        Ok(apk.to_path_buf())
    }

    /// Sign an app bundle with `jarsigner` from `PATH`. Returns `aab` unchanged.
    pub async fn sign_aab_file(&self, aab: &Path, key: &SigningKey) -> Result<PathBuf> {
        tracing::debug!("Signing AAB file");
        let jarsigner = self.runner.locate("jarsigner")?;
        tracing::debug!("Found 'jarsigner' @ {}", jarsigner.display());

        let mut args: Vec<OsString> = vec![
            "-keystore".into(),
            key.keystore.clone().into(),
            "-storepass".into(),
            key.store_password.clone().into(),
        ];
        if let Some(key_password) = &key.key_password {
            args.push("-keypass".into());
            args.push(key_password.clone().into());
        }
        args.push(aab.into());
        args.push(key.alias.clone().into());

        self.runner.run(&jarsigner, &args).await?;

        tracing::info!("Signed {}", aab.display());
        Ok(aab.to_path_buf())
    }
}

/// `dir/app.apk` -> `dir/app-signed.apk`
fn signed_output_path(apk: &Path) -> PathBuf {
    let stem = apk
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    apk.with_file_name(format!("{}-signed.apk", stem))
}
