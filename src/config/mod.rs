use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::schema::FieldSpec;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub csrf_token: Option<String>,
    pub csrf_cookie: Option<String>,
    /// `cookie` (default), `form` to scrape the hidden form field, or `none`.
    pub csrf_mode: Option<String>,
    /// Page fetched to obtain the CSRF cookie or form field, relative to `base_url`.
    pub csrf_page: Option<String>,
    pub timeout: Option<usize>,
    pub proxy: Option<String>,
    #[serde(alias = "page_size_store")]
    pub storage_path: Option<String>,
    pub date_format: Option<String>,
    pub datetime_format: Option<String>,
    /// `+HH:MM`, `-HH:MM` or `UTC`; unset shows datetimes in local time.
    pub utc_offset: Option<String>,
    pub no_color: Option<bool>,
    /// Per-table field kinds, merged over the built-in schemas.
    pub schemas: Option<HashMap<String, Vec<FieldSpec>>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found '{path}'")]
    NotFound { path: String },

    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config path '{path}'")]
    InvalidPath { path: String },

    #[error("failed to write config file '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".tablecrud").join("config.yml"))
}

pub fn default_storage_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".tablecrud").join("page_sizes.json"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

pub fn load_config(path: &Path, allow_missing: bool) -> Result<ConfigFile, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents).map_err(|e| ConfigError::Parse {
            path: display(path),
            source: e,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound {
            path: display(path),
        }),
        Err(e) => Err(ConfigError::Read {
            path: display(path),
            source: e,
        }),
    }
}

fn default_config_yaml() -> String {
    r#"# tablecrud config
#
# Location (default):
#   ~/.tablecrud/config.yml

# Backend
base_url: http://127.0.0.1:8000/json_app/
timeout: 10
# proxy: http://127.0.0.1:8080

# CSRF (pick one; a literal token wins over the cookie)
# csrf_token: abc123
csrf_cookie: csrftoken
# csrf_mode: cookie        # cookie | form | none
# Page fetched to receive the cookie, relative to base_url
csrf_page: ""

# Page sizes chosen per table are kept here
# storage_path: ~/.tablecrud/page_sizes.json

# Cell formatting (chrono patterns)
date_format: "%-m/%-d/%Y"
datetime_format: "%-m/%-d/%Y, %-I:%M:%S %p"
# utc_offset: "+00:00"

# Output styling
no_color: false

# Extra table schemas, merged over the built-in ones
# schemas:
#   table4:
#     - name: owner
#       kind:
#         relation:
#           label: Table2
#           display: positive_small_int
#           options: table2_options
#     - name: archived
#       kind: boolean
"#
    .to_string()
}

/// Writes the commented default config. Returns `false` if the file already existed.
pub fn ensure_default_config_file(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path.parent().ok_or_else(|| ConfigError::InvalidPath {
        path: display(path),
    })?;
    std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
        path: display(parent),
        source: e,
    })?;
    std::fs::write(path, default_config_yaml()).map_err(|e| ConfigError::Write {
        path: display(path),
        source: e,
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    #[test]
    fn default_yaml_parses() {
        let cfg: ConfigFile = serde_yaml::from_str(&default_config_yaml()).unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://127.0.0.1:8000/json_app/"));
        assert_eq!(cfg.timeout, Some(10));
        assert_eq!(cfg.csrf_cookie.as_deref(), Some("csrftoken"));
        assert!(cfg.schemas.is_none());
    }

    #[test]
    fn missing_file_is_allowed_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yml");
        assert!(load_config(&path, true).unwrap().base_url.is_none());
        assert!(matches!(
            load_config(&path, false),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn schemas_are_read_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "schemas:\n  table4:\n    - name: archived\n      kind: boolean\n",
        )
        .unwrap();
        let cfg = load_config(&path, false).unwrap();
        let schemas = cfg.schemas.unwrap();
        assert_eq!(schemas["table4"][0].kind, FieldKind::Boolean);
    }

    #[test]
    fn init_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");
        assert!(ensure_default_config_file(&path).unwrap());
        assert!(!ensure_default_config_file(&path).unwrap());
        assert!(load_config(&path, false).is_ok());
    }
}
