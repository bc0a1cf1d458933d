use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::traits::ThumbnailFit;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub avatar: AvatarConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Public scheme/host/port of the site. Empty means "use the Host header".
    #[serde(default)]
    pub base_url: String,
}

impl ServerConfig {
    /// The parsed `base_url`, if one is configured.
    pub fn base_url(&self) -> Option<Url> {
        if self.base_url.is_empty() {
            None
        } else {
            Url::parse(&self.base_url).ok()
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// JSON snapshot loaded by the in-memory host.
    pub snapshot: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AvatarConfig {
    #[serde(default = "default_avatar_size")]
    pub width: u32,
    #[serde(default = "default_avatar_size")]
    pub height: u32,
    #[serde(default)]
    pub fit: ThumbnailFit,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            width: default_avatar_size(),
            height: default_avatar_size(),
            fit: ThumbnailFit::Contain,
        }
    }
}

fn default_avatar_size() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccessConfig {
    /// Show records restricted with `RESN privacy`.
    #[serde(default)]
    pub show_private: bool,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.avatar.width == 0 || config.avatar.height == 0 {
        anyhow::bail!("avatar.width and avatar.height must be > 0");
    }

    if !config.server.base_url.is_empty() {
        let url = Url::parse(&config.server.base_url)
            .with_context(|| format!("server.base_url is not a URL: {}", config.server.base_url))?;
        if url.host_str().is_none() {
            anyhow::bail!("server.base_url must include a host");
        }
    }

    // Relative snapshot paths are relative to the config file.
    if config.data.snapshot.is_relative() {
        if let Some(dir) = path.parent() {
            config.data.snapshot = dir.join(&config.data.snapshot);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(tmp: &TempDir, body: &str) -> PathBuf {
        let path = tmp.path().join("fc.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            r#"
[server]
bind = "127.0.0.1:0"

[data]
snapshot = "tree.json"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.avatar.width, 200);
        assert_eq!(cfg.avatar.fit, ThumbnailFit::Contain);
        assert!(!cfg.access.show_private);
        assert!(cfg.server.base_url().is_none());
        assert_eq!(cfg.data.snapshot, tmp.path().join("tree.json"));
    }

    #[test]
    fn zero_avatar_size_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            r#"
[server]
bind = "127.0.0.1:0"

[data]
snapshot = "tree.json"

[avatar]
width = 0
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_fit_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            r#"
[server]
bind = "127.0.0.1:0"

[data]
snapshot = "tree.json"

[avatar]
fit = "stretch"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn base_url_must_be_absolute() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            r#"
[server]
bind = "127.0.0.1:0"
base_url = "not a url"

[data]
snapshot = "tree.json"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
