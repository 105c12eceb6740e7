//! Configuration providers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{ConfigError, ConfigResult, PdpConfiguration};

/// File name looked up when a provider points at a directory.
pub const CONFIG_FILE_NAME: &str = "pdp.json";

/// Source of decision point configuration.
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    /// Loads and validates the current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration cannot be read, parsed
    /// or validated.
    async fn load(&self) -> ConfigResult<PdpConfiguration>;
}

/// Provider returning a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigurationProvider {
    config: PdpConfiguration,
}

impl StaticConfigurationProvider {
    /// Creates the provider.
    #[must_use]
    pub fn new(config: PdpConfiguration) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigurationProvider for StaticConfigurationProvider {
    async fn load(&self) -> ConfigResult<PdpConfiguration> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

/// Provider reading `pdp.json` from the file system.
///
/// A path naming a directory resolves to `pdp.json` inside it. A missing
/// file yields the default configuration. A leading `~/` expands to the
/// home directory.
#[derive(Debug, Clone)]
pub struct FileConfigurationProvider {
    path: PathBuf,
}

impl FileConfigurationProvider {
    /// Creates the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HomeDirectory`] when the path starts with `~`
    /// and cannot be expanded.
    pub fn new(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Ok(Self {
            path: expand_home(path.as_ref())?,
        })
    }

    /// Configured path after home expansion.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn resolve(&self) -> PathBuf {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_dir() => self.path.join(CONFIG_FILE_NAME),
            _ => self.path.clone(),
        }
    }
}

#[async_trait]
impl ConfigurationProvider for FileConfigurationProvider {
    async fn load(&self) -> ConfigResult<PdpConfiguration> {
        let path = self.resolve().await;
        let document = match tokio::fs::read_to_string(&path).await {
            Ok(document) => document,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no configuration file; using defaults");
                return Ok(PdpConfiguration::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        let config = PdpConfiguration::from_json(&document)?;
        debug!(
            path = %path.display(),
            algorithm = %config.algorithm(),
            index = %config.index(),
            variables = config.variables().len(),
            "configuration loaded"
        );
        Ok(config)
    }
}

fn expand_home(path: &Path) -> ConfigResult<PathBuf> {
    let Some(raw) = path.to_str() else {
        return Ok(path.to_path_buf());
    };
    if !raw.starts_with('~') {
        return Ok(path.to_path_buf());
    }
    let unexpandable = || ConfigError::HomeDirectory {
        path: raw.to_owned(),
    };
    let rest = match raw.strip_prefix("~") {
        Some("") => "",
        Some(rest) => rest.strip_prefix('/').ok_or_else(unexpandable)?,
        None => return Ok(path.to_path_buf()),
    };
    let home = std::env::var_os("HOME").ok_or_else(unexpandable)?;
    Ok(PathBuf::from(home).join(rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdp_combinators::CombiningAlgorithm;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pdp-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_pdp_json_from_a_directory() {
        let dir = scratch_dir();
        tokio::fs::write(
            dir.join(CONFIG_FILE_NAME),
            r#"{"algorithm": "permit-overrides"}"#,
        )
        .await
        .unwrap();

        let config = FileConfigurationProvider::new(&dir).unwrap().load().await.unwrap();
        assert_eq!(config.algorithm(), CombiningAlgorithm::PermitOverrides);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = scratch_dir();
        let config = FileConfigurationProvider::new(dir.join("absent.json"))
            .unwrap()
            .load()
            .await
            .unwrap();
        assert_eq!(config, PdpConfiguration::default());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = scratch_dir();
        let file = dir.join("broken.json");
        tokio::fs::write(&file, "{ not json").await.unwrap();

        let err = FileConfigurationProvider::new(&file)
            .unwrap()
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn static_provider_validates() {
        let provider = StaticConfigurationProvider::new(
            PdpConfiguration::new().with_variable("action", serde_json::json!(1)),
        );
        assert!(matches!(
            provider.load().await,
            Err(ConfigError::Variable { .. })
        ));
    }

    #[test]
    fn home_expansion() {
        assert_eq!(
            expand_home(Path::new("/etc/pdp")).unwrap(),
            PathBuf::from("/etc/pdp")
        );
        assert!(matches!(
            expand_home(Path::new("~other/pdp")),
            Err(ConfigError::HomeDirectory { .. })
        ));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                expand_home(Path::new("~/policies")).unwrap(),
                PathBuf::from(home).join("policies")
            );
        }
    }
}
