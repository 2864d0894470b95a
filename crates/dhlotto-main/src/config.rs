// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of DhLotto.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub portal: PortalConfig,
}

/// Portal account configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal account id. Falls back to the DHLOTTO_USERNAME environment
    /// variable when unset.
    #[serde(default)]
    pub username: Option<String>,

    /// Portal account password. Falls back to DHLOTTO_PASSWORD.
    #[serde(default)]
    pub password: Option<String>,

    /// Whether the Lotto 6/45 coordinator and buy service are enabled.
    #[serde(default = "default_lotto_645")]
    pub lotto_645: bool,
}

fn default_lotto_645() -> bool {
    true
}

impl PortalConfig {
    fn apply_env_fallback(&mut self) {
        if self.username.is_none() {
            self.username = std::env::var("DHLOTTO_USERNAME").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("DHLOTTO_PASSWORD").ok();
        }
    }

    /// Resolved credentials; errors when neither config nor environment
    /// provides them.
    pub fn credentials(&self) -> Result<(String, String)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok((username.clone(), password.clone())),
            _ => bail!(
                "portal credentials not configured; set [portal] username/password \
                 in config.toml or the DHLOTTO_USERNAME/DHLOTTO_PASSWORD environment variables"
            ),
        }
    }
}

/// Loads the configuration from `path`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config.portal.apply_env_fallback();
    Ok(config)
}

/// Loads the configuration from the path in DHLOTTO_CONFIG (default
/// `./config.toml`). A missing file is not an error: the configuration is
/// then assembled from environment variables alone.
pub fn load_config_with_fallback() -> Result<AppConfig> {
    let path = std::env::var("DHLOTTO_CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
    let path = Path::new(&path);
    if path.exists() {
        load_config(path)
    } else {
        let mut config = AppConfig::default();
        config.portal.lotto_645 = default_lotto_645();
        config.portal.apply_env_fallback();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_a_full_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[portal]\nusername = \"user\"\npassword = \"pw\"\nlotto_645 = false"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        let (username, password) = config.portal.credentials().unwrap();
        assert_eq!(username, "user");
        assert_eq!(password, "pw");
        assert!(!config.portal.lotto_645);
    }

    #[test]
    fn lotto_645_defaults_to_enabled() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[portal]\nusername = \"user\"\npassword = \"pw\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.portal.lotto_645);
    }

    #[test]
    fn missing_credentials_are_reported() {
        let config = PortalConfig {
            username: Some("user".to_owned()),
            password: None,
            lotto_645: true,
        };
        assert!(config.credentials().is_err());
    }

    #[test]
    fn unreadable_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/config.toml")).is_err());
    }
}
