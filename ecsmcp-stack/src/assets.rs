//! Container image assets
//!
//! Each build context is content-hashed when the stack is built. The hash
//! becomes the image tag in the bootstrap asset repository; building and
//! pushing the image happens outside this tool, driven by the asset manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use ecsmcp_core::resource::Value;

use crate::config::Environment;
use crate::error::StackError;

/// Qualifier of the bootstrap resources the images are pushed to
pub const BOOTSTRAP_QUALIFIER: &str = "hnb659fds";
pub const ASSET_MANIFEST_VERSION: &str = "36.0.0";

fn repository_prefix() -> String {
    format!("cdk-{}-container-assets-", BOOTSTRAP_QUALIFIER)
}

/// A Docker build context and its content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    /// Construct path of the asset
    pub id: String,
    pub directory: PathBuf,
    pub hash: String,
}

impl ImageAsset {
    pub fn from_directory(id: impl Into<String>, directory: &Path) -> Result<Self, StackError> {
        let hash = hash_directory(directory)?;
        let id = id.into();
        log::debug!("Asset {} hashed to {}", id, hash);
        Ok(Self {
            id,
            directory: directory.to_path_buf(),
            hash,
        })
    }

    /// `<account>.dkr.ecr.<region>.<suffix>/<repository>:<hash>`
    pub fn image_uri(&self) -> Value {
        Value::Join(vec![
            Value::pseudo("AccountId"),
            Value::string(".dkr.ecr."),
            Value::pseudo("Region"),
            Value::string("."),
            Value::pseudo("URLSuffix"),
            Value::string(format!("/{}", repository_prefix())),
            Value::pseudo("AccountId"),
            Value::string("-"),
            Value::pseudo("Region"),
            Value::string(format!(":{}", self.hash)),
        ])
    }

    /// ARN of the asset repository, for pull permissions
    pub fn repository_arn() -> Value {
        Value::Join(vec![
            Value::string("arn:"),
            Value::pseudo("Partition"),
            Value::string(":ecr:"),
            Value::pseudo("Region"),
            Value::string(":"),
            Value::pseudo("AccountId"),
            Value::string(format!(":repository/{}", repository_prefix())),
            Value::pseudo("AccountId"),
            Value::string("-"),
            Value::pseudo("Region"),
        ])
    }
}

/// Image a container runs
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerImage {
    pub uri: Value,
    /// Asset repository the execution role must be able to pull from
    pub repository_arn: Option<Value>,
}

impl ContainerImage {
    pub fn from_asset(asset: &ImageAsset) -> Self {
        Self {
            uri: asset.image_uri(),
            repository_arn: Some(ImageAsset::repository_arn()),
        }
    }

    /// Public image, e.g. `public.ecr.aws/docker/library/nginx:latest`
    pub fn from_registry(name: impl Into<String>) -> Self {
        Self {
            uri: Value::string(name),
            repository_arn: None,
        }
    }
}

/// SHA-256 over the sorted relative paths and bytes of every file
pub fn hash_directory(directory: &Path) -> Result<String, StackError> {
    if !directory.is_dir() {
        return Err(StackError::MissingBuildContext(directory.to_path_buf()));
    }

    let mut files: Vec<(String, PathBuf)> = WalkDir::new(directory)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(directory).ok()?;
            // Separators are normalized so the hash is the same on every platform
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((key, entry.path().to_path_buf()))
        })
        .collect();
    files.sort();

    let mut hasher = Sha256::new();
    for (relative, path) in &files {
        let bytes = std::fs::read(path).map_err(|source| StackError::Io {
            path: path.clone(),
            source,
        })?;
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(&bytes);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetManifest {
    pub version: String,
    #[serde(rename = "dockerImages")]
    pub docker_images: BTreeMap<String, DockerImageEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DockerImageEntry {
    pub source: ImageSource,
    pub destinations: BTreeMap<String, ImageDestination>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSource {
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDestination {
    pub repository_name: String,
    pub image_tag: String,
    pub region: String,
}

impl AssetManifest {
    /// Describe what to build and where to push it
    ///
    /// Without a known account the destination keeps the `${AWS::AccountId}`
    /// placeholder for the publisher to substitute.
    pub fn new(assets: &[ImageAsset], environment: &Environment) -> Self {
        let account = environment
            .account
            .clone()
            .unwrap_or_else(|| "${AWS::AccountId}".to_string());
        let destination_key = format!("{}-{}", account, environment.region);

        let docker_images = assets
            .iter()
            .map(|asset| {
                let destination = ImageDestination {
                    repository_name: format!(
                        "{}{}-{}",
                        repository_prefix(),
                        account,
                        environment.region
                    ),
                    image_tag: asset.hash.clone(),
                    region: environment.region.clone(),
                };
                let entry = DockerImageEntry {
                    source: ImageSource {
                        directory: asset.directory.display().to_string(),
                    },
                    destinations: BTreeMap::from([(destination_key.clone(), destination)]),
                };
                (asset.hash.clone(), entry)
            })
            .collect();

        Self {
            version: ASSET_MANIFEST_VERSION.to_string(),
            docker_images,
        }
    }
}
