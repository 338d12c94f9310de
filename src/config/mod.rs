//! Configuration and identity storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::IdentityStore;
use crate::models::{Identity, UserId};

/// Backend used when neither the flag, the environment nor the config file names one.
pub const DEFAULT_BACKEND_URL: &str = "https://chatbackend-1-w5o6.onrender.com";

/// Application configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL override
    pub backend_url: Option<String>,
    /// Last selected chat partner, re-selected on the next chat start
    pub chat_with: Option<UserId>,
    /// Logged-in identity (set by `login`, cleared by `logout`).
    /// Kept last: TOML tables must follow plain values.
    pub chat_user: Option<Identity>,
    /// Where this config was loaded from; `save` writes back there.
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "duochat", "duochat")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        match self.path {
            Some(ref path) => self.save_to(path),
            None => self.save_to(&Self::config_path()?),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: Self = if path.exists() {
            let content = fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // The file identifies the logged-in user; keep it private.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Resolve the backend URL: explicit override, then config file, then default.
    pub fn backend_url(&self, flag: Option<&str>) -> String {
        flag.or(self.backend_url.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL)
            .trim()
            .trim_end_matches('/')
            .to_string()
    }
}

impl IdentityStore for Config {
    fn identity(&self) -> Option<Identity> {
        self.chat_user.clone()
    }

    fn set_identity(&mut self, identity: Identity) {
        self.chat_user = Some(identity);
    }

    fn resume_partner(&self) -> Option<UserId> {
        self.chat_with
    }

    fn set_resume_partner(&mut self, partner: Option<UserId>) {
        self.chat_with = partner;
    }

    fn clear_identity(&mut self) {
        self.chat_user = None;
        self.chat_with = None;
    }

    fn persist(&self) -> Result<()> {
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_resolution() {
        let mut config = Config::default();
        assert_eq!(config.backend_url(None), DEFAULT_BACKEND_URL);

        config.backend_url = Some("http://localhost:3000/".into());
        assert_eq!(config.backend_url(None), "http://localhost:3000");
        assert_eq!(
            config.backend_url(Some("https://other.example")),
            "https://other.example"
        );
        assert_eq!(config.backend_url(Some("  ")), DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set_identity(Identity {
            id: UserId(3),
            username: "cy".into(),
        });
        config.set_resume_partner(Some(UserId(4)));
        config.save_to(&path).unwrap();

        let mut loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.identity().map(|i| i.id), Some(UserId(3)));
        assert_eq!(loaded.resume_partner(), Some(UserId(4)));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[chat_user]"));

        // persist() writes back to the file it was loaded from.
        loaded.clear_identity();
        loaded.persist().unwrap();
        assert!(Config::load_from(&path).unwrap().identity().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.identity().is_none());
        assert!(config.backend_url.is_none());
    }

    #[test]
    fn test_clear_identity_drops_resume_partner() {
        let mut config = Config::default();
        config.set_identity(Identity {
            id: UserId(1),
            username: "ana".into(),
        });
        config.set_resume_partner(Some(UserId(2)));
        config.clear_identity();
        assert!(config.identity().is_none());
        assert!(config.resume_partner().is_none());
    }
}
