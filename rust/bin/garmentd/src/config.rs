//! Server configuration, read from a TOML file.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//!
//! [storage]
//! data_dir = "/var/lib/garment"
//!
//! [jwt]
//! secret = "..."
//! expire_secs = 86400
//!
//! [root]
//! password_hash = "$argon2id$..."
//!
//! [log]
//! filter = "info,garment_inventory=debug"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Directory searched when `-c` is given a bare name.
pub const CONFIG_DIR: &str = "/etc/garment";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    pub root: RootConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,
}

fn default_expire_secs() -> u64 {
    86400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// argon2id PHC string.
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// A bare name resolves to `/etc/garment/<name>.toml`; anything with a
    /// `/` or `.` is used as a path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            Path::new(CONFIG_DIR).join(format!("{name_or_path}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn sqlite_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join("garment.sqlite")
    }

    pub fn auth_config(&self) -> garment_auth::AuthConfig {
        garment_auth::AuthConfig {
            jwt_secret: self.jwt.secret.clone(),
            expire_secs: self.jwt.expire_secs,
            root_password_hash: Some(self.root.password_hash.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_and_paths() {
        assert_eq!(ServerConfig::resolve_path("plant-a"), PathBuf::from("/etc/garment/plant-a.toml"));
        assert_eq!(ServerConfig::resolve_path("./dev.toml"), PathBuf::from("./dev.toml"));
        assert_eq!(ServerConfig::resolve_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn optional_sections_default() {
        let cfg: ServerConfig = toml::from_str(
            r#"
            [storage]
            data_dir = "/var/lib/garment"
            [jwt]
            secret = "s"
            [root]
            password_hash = "h"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
        assert_eq!(cfg.jwt.expire_secs, 86400);
        assert_eq!(cfg.log.filter, "info");
        assert_eq!(cfg.sqlite_path(), PathBuf::from("/var/lib/garment/garment.sqlite"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/dev.toml");
        let cfg = ServerConfig {
            server: ServerSection { listen: "127.0.0.1:9000".into() },
            storage: StorageConfig { data_dir: "/data".into() },
            jwt: JwtConfig { secret: "abc".into(), expire_secs: 60 },
            root: RootConfig { password_hash: "$argon2id$x".into() },
            log: LogConfig::default(),
        };
        cfg.save(&path).unwrap();
        let back = ServerConfig::load(&path).unwrap();
        assert_eq!(back.server.listen, "127.0.0.1:9000");
        assert_eq!(back.jwt.expire_secs, 60);
        assert_eq!(back.root.password_hash, "$argon2id$x");
    }
}
