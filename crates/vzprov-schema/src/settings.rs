use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "VZPROV_CONFIG";
/// Host-wide settings file, used when present and no explicit path is given.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/vzprov/vzprov.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Host settings: where the backend tools live and the default table used
/// when provisioning with defaulting enabled.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub defaults: Defaults,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BackendSettings {
    #[serde(default = "default_vzctl")]
    pub vzctl: String,
    #[serde(default = "default_vzlist")]
    pub vzlist: String,
    /// Directory holding `<ctid>.conf` container configuration files.
    #[serde(default = "default_conf_dir")]
    pub conf_dir: PathBuf,
}

fn default_vzctl() -> String {
    "vzctl".to_owned()
}

fn default_vzlist() -> String {
    "vzlist".to_owned()
}

fn default_conf_dir() -> PathBuf {
    PathBuf::from("/etc/vz/conf")
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            vzctl: default_vzctl(),
            vzlist: default_vzlist(),
            conf_dir: default_conf_dir(),
        }
    }
}

/// Values filled into every unset provisioning attribute.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct Defaults {
    pub ostemplate: String,
    pub ram: String,
    pub swap: String,
    pub diskspace: String,
    pub nameserver: Vec<String>,
    pub searchdomain: Vec<String>,
    pub onboot: bool,
    /// Interface name given to a network change that does not name one.
    pub ifname: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            ostemplate: "centos-6-x86_64".to_owned(),
            ram: "512M".to_owned(),
            swap: "512M".to_owned(),
            diskspace: "10G".to_owned(),
            nameserver: vec!["8.8.8.8".to_owned(), "8.8.4.4".to_owned()],
            searchdomain: Vec::new(),
            onboot: true,
            ifname: "eth0".to_owned(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve settings from an explicit path, `$VZPROV_CONFIG`, or the
    /// system file, falling back to built-in defaults when none exist.
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        let system = Path::new(SYSTEM_CONFIG_PATH);
        if system.exists() {
            return Self::load(system);
        }
        Ok(Self::default())
    }

    pub fn conf_path(&self, ctid: crate::Ctid) -> PathBuf {
        self.backend.conf_dir.join(format!("{ctid}.conf"))
    }
}
