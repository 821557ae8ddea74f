use std::{
    fs::{create_dir_all, File},
    io::{Read, Write},
    path::Path,
    time::Duration,
};

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    csr::dn::SubjectName,
    soap::{Endpoints, DEFAULT_TIMEOUT, PRODUCTION_ENDPOINT, TEST_ENDPOINT},
};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    pub applicant: Option<String>,
    pub mail: Option<String>,
    pub unit: Option<String>,

    #[serde(default)]
    pub subject: SubjectName,

    #[serde(default)]
    pub ca: CaConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaConfig {
    /// Registration authority id.
    pub raid: u32,
    /// Certificate profile requested from the CA.
    pub profile: String,
    pub production_endpoint: String,
    pub test_endpoint: String,
    pub timeout_secs: u64,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            raid: 3810,
            profile: "Web Server".into(),
            production_endpoint: PRODUCTION_ENDPOINT.into(),
            test_endpoint: TEST_ENDPOINT.into(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl CaConfig {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            production: self.production_endpoint.clone(),
            test: self.test_endpoint.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn create_default_config() -> Config {
    Config {
        applicant: None,
        mail: None,
        unit: None,
        subject: SubjectName::default(),
        ca: CaConfig::default(),
    }
}

/// A filled in config, printed by the `config` command as a starting point.
pub fn example_config() -> Config {
    Config {
        applicant: Some("John Doe".into()),
        mail: Some("john.doe@stud.example.com".into()),
        unit: Some("Department of Computer Science".into()),
        ..create_default_config()
    }
}

/// Reads `user_config_path`, or the default config file, which is created
/// with default values when it doesn't exist yet.
pub fn read_config(
    app: &ProjectDirs,
    user_config_path: Option<&Path>,
) -> anyhow::Result<Config> {
    if let Some(user_config_path) = user_config_path {
        if !user_config_path.exists() {
            anyhow::bail!("can't find config file {user_config_path:?}");
        }
        read_config_file(user_config_path)
    } else {
        load_or_create(&app.config_dir().join(CONFIG_FILE_NAME))
    }
}

pub fn load_or_create(config_path: &Path) -> anyhow::Result<Config> {
    if config_path.exists() {
        return read_config_file(config_path);
    }

    let config = create_default_config();
    if let Some(dir) = config_path.parent() {
        create_dir_all(dir).context("Can't create config dir")?;
    }
    File::create(config_path)
        .with_context(|| format!("Can't create file {config_path:?}"))?
        .write_all(toml::to_string_pretty(&config)?.as_bytes())
        .with_context(|| format!("Can't write file {config_path:?}"))?;
    info!(path = ?config_path, "created default config");
    Ok(config)
}

pub fn read_config_file(config_path: &Path) -> anyhow::Result<Config> {
    let mut str = String::new();
    File::open(config_path)
        .with_context(|| format!("can't open {config_path:?}"))?
        .read_to_string(&mut str)
        .with_context(|| format!("Can't read {config_path:?}"))?;
    toml::from_str::<Config>(&str)
        .with_context(|| format!("Can't parse file {config_path:?}"))
}
