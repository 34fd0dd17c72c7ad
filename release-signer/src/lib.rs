//! Align and sign Android release artifacts with the tools the SDK and JDK
//! already ship: `zipalign` and `apksigner` for APKs, `jarsigner` for AABs.

pub mod android_sdk;
pub mod config;
pub mod error;
pub mod release;
pub mod runner;
pub mod signing;

pub use android_sdk::{AndroidSdk, BuildToolsVersion, SdkLocation};
pub use config::SignerConfig;
pub use error::{Result, SignError};
pub use release::{KeystoreFile, ReleaseFile, ReleaseKind, ReleaseRequest, find_release_files};
pub use runner::{CommandRunner, SystemRunner};
pub use signing::{Signer, SigningKey};
