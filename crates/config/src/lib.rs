//! Layered configuration for quire.
//!
//! Values come from (later sources win):
//! 1. built-in defaults,
//! 2. an optional config file, in whichever format its extension names,
//! 3. `QUIRE_`-prefixed environment variables, with `__` separating nested
//!    keys (`QUIRE_PRELOAD__RANGE=3`).

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "QUIRE_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the extracted-chapter library. Defaults to the platform data
    /// directory, see [`Config::library_root()`].
    pub library: Option<PathBuf>,
    pub cache: CacheConfig,
    pub preload: PreloadConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Parsed chapters held in memory.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { memory_capacity: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    pub range: usize,
    pub prediction_threshold: usize,
    pub extended_span: usize,
    pub throttle_ms: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            range: 2,
            prediction_threshold: 3,
            extended_span: 4,
            throttle_ms: 50,
        }
    }
}

impl PreloadConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Config {
    /// Load and validate configuration from defaults, `file` (if any) and
    /// the environment.
    #[tracing::instrument(level = "debug")]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?)
    }

    /// The layered provider stack, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::Invalid(format!(
                    "unsupported config file format: {}",
                    path.display()
                ))),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.memory_capacity == 0 {
            exn::bail!(ErrorKind::Invalid("cache.memory_capacity must be at least 1".to_string()));
        }
        if self.preload.range == 0 {
            exn::bail!(ErrorKind::Invalid("preload.range must be at least 1".to_string()));
        }
        if self.preload.prediction_threshold == 0 {
            exn::bail!(ErrorKind::Invalid("preload.prediction_threshold must be at least 1".to_string()));
        }
        if let Some(library) = &self.library
            && !library.is_absolute()
        {
            exn::bail!(ErrorKind::Invalid(format!("library must be an absolute path: {}", library.display())));
        }
        Ok(())
    }

    /// The configured library, or `<platform data dir>/books`.
    pub fn library_root(&self) -> Result<PathBuf> {
        if let Some(library) = &self.library {
            return Ok(library.clone());
        }
        directories::ProjectDirs::from("", "", "quire")
            .map(|dirs| dirs.data_dir().join("books"))
            .ok_or_else(|| ErrorKind::NoHomeDirectory.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn with_string<F: Format>(source: &str) -> Result<Config> {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(F::string(source));
        Config::from_figment(figment)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.preload.throttle(), Duration::from_millis(50));
        assert_eq!(config.cache.memory_capacity, 5);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = with_string::<Toml>("[preload]\nrange = 3\n").unwrap();
        assert_eq!(config.preload.range, 3);
        assert_eq!(config.preload.extended_span, 4);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_yaml() {
        let config = with_string::<Yaml>("library: /srv/books\ncache:\n  memory_capacity: 9\n").unwrap();
        assert_eq!(config.library.as_deref(), Some(Path::new("/srv/books")));
        assert_eq!(config.cache.memory_capacity, 9);
    }

    #[rstest]
    #[case::zero_capacity("[cache]\nmemory_capacity = 0\n")]
    #[case::zero_range("[preload]\nrange = 0\n")]
    #[case::zero_threshold("[preload]\nprediction_threshold = 0\n")]
    #[case::relative_library("library = \"books\"\n")]
    fn test_invalid(#[case] source: &str) {
        let err = with_string::<Toml>(source).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)), "{err:?}");
    }

    #[test]
    fn test_malformed() {
        let err = with_string::<Toml>("[preload]\nrange = \"lots\"\n").unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[rstest]
    #[case("config.toml", "[preload]\nthrottle_ms = 5\n")]
    #[case("config.yml", "preload:\n  throttle_ms: 5\n")]
    #[case("config.json", "{\"preload\": {\"throttle_ms\": 5}}")]
    fn test_file_format_by_extension(#[case] name: &str, #[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
        let config = Config::from_figment(Config::figment(Some(&path)).unwrap()).unwrap();
        assert_eq!(config.preload.throttle_ms, 5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert_eq!(*err, ErrorKind::Load);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Config::figment(Some(Path::new("/etc/quire.ini"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_configured_library_wins() {
        let config = Config { library: Some(PathBuf::from("/srv/books")), ..Default::default() };
        assert_eq!(config.library_root().unwrap(), PathBuf::from("/srv/books"));
    }
}
