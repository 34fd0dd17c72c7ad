use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use release_signer::{
    AndroidSdk, ReleaseFile, ReleaseKind, ReleaseRequest, SdkLocation, Signer, SignerConfig,
    SigningKey,
};

mod outputs;

use outputs::SignedOutputs;

const DEFAULT_LOG_FILTER: &str = "release_signer=info";
const VERBOSE_LOG_FILTER: &str = "release_signer=debug";

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "release-signer")]
#[command(about = "Align and sign Android APKs and app bundles in CI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Android SDK root
    #[arg(long, env = "ANDROID_HOME", global = true)]
    android_home: Option<PathBuf>,

    /// Build-tools version to prefer over the highest installed one
    #[arg(long, env = "BUILD_TOOLS_VERSION", global = true)]
    build_tools_version: Option<String>,

    /// TOML file with defaults for the SDK and signing settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log every tool invocation
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct KeyArgs {
    /// Key alias inside the keystore
    #[arg(long, env = "INPUT_ALIAS")]
    alias: Option<String>,

    /// Keystore password
    #[arg(long, env = "INPUT_KEYSTOREPASSWORD", hide_env_values = true)]
    key_store_password: String,

    /// Key password, if different from the keystore password
    #[arg(long, env = "INPUT_KEYPASSWORD", hide_env_values = true)]
    key_password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign every .apk and .aab in a release directory with a base64 keystore
    Release {
        /// Directory holding the unsigned artifacts
        #[arg(long, env = "INPUT_RELEASEDIRECTORY")]
        release_dir: Option<PathBuf>,
        /// Base64-encoded keystore
        #[arg(long, env = "INPUT_SIGNINGKEYBASE64", hide_env_values = true)]
        signing_key_base64: String,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Align-check, sign and verify a single APK in place
    Apk {
        file: PathBuf,
        /// Keystore file
        #[arg(long)]
        keystore: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Sign a single app bundle with jarsigner
    Aab {
        file: PathBuf,
        /// Keystore file
        #[arg(long)]
        keystore: PathBuf,
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Print the build-tools directory that would be used
    BuildTools,
}

/// Settings after layering flags and env over the config file.
struct Settings {
    sdk: SdkLocation,
    alias: Option<String>,
    release_dir: Option<PathBuf>,
    json: bool,
}

impl Settings {
    fn resolve(cli: &Cli) -> CliResult<Self> {
        let config = match &cli.config {
            Some(path) => SignerConfig::load(path)?,
            None => SignerConfig::default(),
        };

        let sdk = SdkLocation {
            android_home: non_empty_path(cli.android_home.clone()).or(config.sdk.android_home),
            build_tools_version: non_empty(cli.build_tools_version.clone())
                .or(config.sdk.build_tools_version),
        };

        Ok(Self {
            sdk,
            alias: config.signing.alias,
            release_dir: config.signing.release_directory,
            json: cli.json,
        })
    }

    fn alias(&self, key: &KeyArgs) -> CliResult<String> {
        let alias = non_empty(key.alias.clone())
            .or_else(|| self.alias.clone())
            .ok_or("Key alias not set. Pass --alias, set INPUT_ALIAS or add it to the config")?;
        Ok(alias)
    }

    fn signing_key(&self, keystore: &Path, key: &KeyArgs) -> CliResult<SigningKey> {
        Ok(SigningKey::new(
            keystore,
            self.alias(key)?,
            key.key_store_password.clone(),
            key.key_password.clone(),
        ))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|v| !v.as_os_str().is_empty())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match Settings::resolve(&cli) {
        Ok(settings) => run(cli.command, settings).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("❌ {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("   caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, settings: Settings) -> CliResult<()> {
    match command {
        Commands::Release {
            release_dir,
            signing_key_base64,
            key,
        } => sign_release(&settings, release_dir, signing_key_base64, &key).await,
        Commands::Apk {
            file,
            keystore,
            key,
        } => sign_single(&settings, &file, ReleaseKind::Apk, &keystore, &key).await,
        Commands::Aab {
            file,
            keystore,
            key,
        } => sign_single(&settings, &file, ReleaseKind::Aab, &keystore, &key).await,
        Commands::BuildTools => show_build_tools(&settings),
    }
}

async fn sign_release(
    settings: &Settings,
    release_dir: Option<PathBuf>,
    signing_key_base64: String,
    key: &KeyArgs,
) -> CliResult<()> {
    let release_dir = non_empty_path(release_dir)
        .or_else(|| settings.release_dir.clone())
        .ok_or("Release directory not set. Pass --release-dir or set INPUT_RELEASEDIRECTORY")?;

    let request = ReleaseRequest {
        release_dir,
        signing_key_base64,
        alias: settings.alias(key)?,
        store_password: key.key_store_password.clone(),
        key_password: non_empty(key.key_password.clone()),
    };

    println!("🔏 Signing release files in {}", request.release_dir.display());

    let signer = Signer::new(settings.sdk.clone());
    let signed = signer.sign_release_directory(&request).await?;

    publish(settings, &signed)
}

async fn sign_single(
    settings: &Settings,
    file: &Path,
    expected: ReleaseKind,
    keystore: &Path,
    key: &KeyArgs,
) -> CliResult<()> {
    let release = ReleaseFile::new(file)
        .filter(|release| release.kind == expected)
        .ok_or_else(|| format!("{} is not an .{} file", file.display(), extension(expected)))?;

    if !release.path.is_file() {
        return Err(format!("{} not found", release.path.display()).into());
    }
    if !keystore.is_file() {
        return Err(format!("Keystore {} not found", keystore.display()).into());
    }

    let signing_key = settings.signing_key(keystore, key)?;

    println!("🔏 Signing {}", release.path.display());
    let signer = Signer::new(settings.sdk.clone());
    let signed = signer.sign_release_file(&release, &signing_key).await?;

    publish(settings, &[signed])
}

fn extension(kind: ReleaseKind) -> &'static str {
    match kind {
        ReleaseKind::Apk => "apk",
        ReleaseKind::Aab => "aab",
    }
}

fn show_build_tools(settings: &Settings) -> CliResult<()> {
    let sdk: AndroidSdk = settings.sdk.resolve()?;
    let dir = sdk.build_tools_dir();

    if settings.json {
        let value = serde_json::json!({
            "buildToolsVersion": sdk.build_tools_version,
            "buildToolsDir": dir.to_string_lossy(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", dir.display());
    }

    Ok(())
}

fn publish(settings: &Settings, signed: &[PathBuf]) -> CliResult<()> {
    let outputs = SignedOutputs::new(signed);

    if let Some(output_file) = std::env::var_os("GITHUB_OUTPUT").filter(|v| !v.is_empty()) {
        outputs.append_to(Path::new(&output_file))?;
        tracing::debug!("Wrote step outputs to {}", Path::new(&output_file).display());
    }

    if settings.json {
        println!("{}", serde_json::to_string_pretty(&outputs.to_json())?);
    } else {
        for file in &outputs.files {
            println!("✅ Signed {}", file);
        }
        println!("📦 {} release file(s) signed", outputs.nof_signed_release_files);
    }

    Ok(())
}
