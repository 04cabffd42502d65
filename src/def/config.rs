use crate::provision::{PasswordPolicy, Strength, DEFAULT_PASSWORD_LENGTH};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_PROXY_NAME: &str = "XRAY_VPN";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub xray_config: PathBuf,
    pub clash_template: PathBuf,
    pub clash_output: PathBuf,
    pub link_output: PathBuf,
    pub domain_file: PathBuf,
    pub server: Server,
    pub password: Password,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Server {
    pub ip: Option<String>,
    pub domain: Option<String>,
    pub prefer_domain_for_sni: bool,
    pub name: String,
    pub skip_cert_verify: bool,
    pub detect_ip: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Password {
    pub length: usize,
    pub strong: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            xray_config: PathBuf::from("/usr/local/etc/xray/config.json"),
            clash_template: PathBuf::from("/usr/local/xrayconverter/template.yaml"),
            clash_output: PathBuf::from("/usr/local/xrayconverter/clash"),
            link_output: PathBuf::from("/usr/local/xrayconverter/xray"),
            domain_file: PathBuf::from("/usr/local/xrayconverter/domain.txt"),
            server: Server::default(),
            password: Password::default(),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            ip: None,
            domain: None,
            prefer_domain_for_sni: true,
            name: DEFAULT_PROXY_NAME.to_string(),
            skip_cert_verify: true,
            detect_ip: true,
        }
    }
}

impl Default for Password {
    fn default() -> Self {
        Self {
            length: DEFAULT_PASSWORD_LENGTH,
            strong: false,
        }
    }
}

impl Password {
    pub fn policy(&self) -> PasswordPolicy {
        PasswordPolicy {
            length: self.length,
            strength: if self.strong {
                Strength::Strong
            } else {
                Strength::Default
            },
        }
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
