//! Configuration for the replay tool.
//!
//! Evaluation order:
//! 1) `$GEOTRACK_CONFIG_PATH` (TOML or JSON file),
//! 2) `$GEOTRACK_CONFIG_JSON` (inline JSON),
//! 3) the first of `geotrack.toml`, `geotrack.json`, `config/geotrack.toml`
//!    found under the working directory,
//! 4) defaults.
//!
//! `$GEOTRACK_TENANT_ID` overrides `tenant_id` from whichever source won.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use geotrack_core::tracking::TrackingConfig;

use crate::error::ConfigLoadError;

pub const CONFIG_PATH_VAR: &str = "GEOTRACK_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "GEOTRACK_CONFIG_JSON";
pub const TENANT_VAR: &str = "GEOTRACK_TENANT_ID";

const CANDIDATES: &[&str] = &["geotrack.toml", "geotrack.json", "config/geotrack.toml"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => f.write_str("defaults"),
            ConfigSource::EnvPath(path) => write!(f, "${CONFIG_PATH_VAR} ({})", path.display()),
            ConfigSource::EnvInline => write!(f, "${CONFIG_JSON_VAR}"),
            ConfigSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtlConfig {
    /// Dealer whose documents are tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub tracking: TrackingConfig,
}

impl CtlConfig {
    /// Resolve configuration from the process environment and the working
    /// directory, reading `.env` first when present.
    pub fn load_from_env() -> Result<(Self, ConfigSource), ConfigLoadError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(|key| std::env::var(key).ok(), &cwd)
    }

    /// Same as [`CtlConfig::load_from_env`] with an injectable variable lookup
    /// and base directory.
    pub fn load_with(
        lookup: impl Fn(&str) -> Option<String>,
        base_dir: &Path,
    ) -> Result<(Self, ConfigSource), ConfigLoadError> {
        let set = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let (mut config, source) = if let Some(path) = set(CONFIG_PATH_VAR) {
            let path = PathBuf::from(path);
            (Self::load_from_file(&path)?, ConfigSource::EnvPath(path))
        } else if let Some(raw) = set(CONFIG_JSON_VAR) {
            (Self::parse_json(&raw, CONFIG_JSON_VAR)?, ConfigSource::EnvInline)
        } else if let Some(path) = Self::find_default_file(base_dir) {
            (Self::load_from_file(&path)?, ConfigSource::File(path))
        } else {
            (Self::default(), ConfigSource::Default)
        };

        if let Some(tenant) = set(TENANT_VAR) {
            config.tenant_id = Some(tenant);
        }
        Ok((config, source))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents, &origin),
            Some("toml") => toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                origin,
                message: err.to_string(),
            }),
            _ => Self::parse_from_str(&contents, &origin),
        }
    }

    /// Try TOML first, then JSON.
    pub fn parse_from_str(contents: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| ConfigLoadError::Parse {
                origin: origin.to_string(),
                message: format!("toml error: {toml_err}; json error: {json_err}"),
            })
        })
    }

    pub fn parse_json(raw: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        serde_json::from_str(raw).map_err(|err| ConfigLoadError::Parse {
            origin: origin.to_string(),
            message: err.to_string(),
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigLoadError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn find_default_file(base_dir: &Path) -> Option<PathBuf> {
        CANDIDATES
            .iter()
            .map(|candidate| base_dir.join(candidate))
            .find(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_configured() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = CtlConfig::load_with(vars(&[]), dir.path()).unwrap();
        assert_eq!(source, ConfigSource::Default);
        assert_eq!(config, CtlConfig::default());
    }

    #[test]
    fn default_file_is_discovered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("config")).unwrap();
        let path = dir.path().join("config/geotrack.toml");
        fs::write(
            &path,
            "tenant_id = \"dealer-7\"\n\n[tracking]\nassignments_collection = \"jobs\"\n",
        )
        .unwrap();

        let (config, source) = CtlConfig::load_with(vars(&[]), dir.path()).unwrap();
        assert_eq!(source, ConfigSource::File(path));
        assert_eq!(config.tenant_id.as_deref(), Some("dealer-7"));
        assert_eq!(config.tracking.assignments_collection, "jobs");
        assert_eq!(config.tracking.workers_collection, "users");
    }

    #[test]
    fn env_path_beats_inline_json_and_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("geotrack.toml"), "tenant_id = \"from-file\"\n").unwrap();
        let explicit = dir.path().join("custom.conf");
        fs::write(&explicit, r#"{"tenant_id": "from-path"}"#).unwrap();

        let (config, source) = CtlConfig::load_with(
            vars(&[
                (CONFIG_PATH_VAR, explicit.to_str().unwrap()),
                (CONFIG_JSON_VAR, r#"{"tenant_id": "inline"}"#),
            ]),
            dir.path(),
        )
        .unwrap();
        assert_eq!(source, ConfigSource::EnvPath(explicit));
        assert_eq!(config.tenant_id.as_deref(), Some("from-path"));
    }

    #[test]
    fn inline_json_and_tenant_override() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = CtlConfig::load_with(
            vars(&[
                (CONFIG_JSON_VAR, r#"{"tracking": {"worker_type": "technician"}}"#),
                (TENANT_VAR, "dealer-9"),
            ]),
            dir.path(),
        )
        .unwrap();
        assert_eq!(source, ConfigSource::EnvInline);
        assert_eq!(config.tracking.worker_type, "technician");
        assert_eq!(config.tenant_id.as_deref(), Some("dealer-9"));
    }

    #[test]
    fn malformed_file_reports_origin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("geotrack.json"), "{not json").unwrap();
        let err = CtlConfig::load_with(vars(&[]), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse { ref origin, .. } if origin.ends_with("geotrack.json")));
    }

    #[test]
    fn renders_as_toml() {
        let config = CtlConfig {
            tenant_id: Some("dealer-7".into()),
            ..CtlConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("tenant_id = \"dealer-7\""));
        assert!(text.contains("[tracking]"));
        assert_eq!(toml::from_str::<CtlConfig>(&text).unwrap(), config);
    }
}
