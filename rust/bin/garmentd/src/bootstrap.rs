//! Startup checks and store opening.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use garment_sql::SqliteStore;

use crate::config::ServerConfig;
use crate::registry;

/// Refuse to start on a config that would leave the server unusable.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.root.password_hash.is_empty() {
        anyhow::bail!(
            "No root password hash found in configuration.\n\
             Run `garment init-config <name>` to set up the server first."
        );
    }
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    Ok(())
}

/// Open the store under `data_dir` and bring its schema up to date.
pub fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<SqliteStore>> {
    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("creating data dir {}", config.storage.data_dir))?;
    let path = config.sqlite_path();
    let db = SqliteStore::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let applied = registry::migrate_all(&db)?;
    info!(path = %path.display(), applied = applied.len(), "store ready");
    Ok(Arc::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, LogConfig, RootConfig, ServerSection, StorageConfig};

    fn config(data_dir: &str, hash: &str) -> ServerConfig {
        ServerConfig {
            server: ServerSection::default(),
            storage: StorageConfig { data_dir: data_dir.into() },
            jwt: JwtConfig { secret: "test".into(), expire_secs: 3600 },
            root: RootConfig { password_hash: hash.into() },
            log: LogConfig::default(),
        }
    }

    #[test]
    fn empty_root_hash_is_refused() {
        assert!(verify_config(&config("/tmp", "")).is_err());
        assert!(verify_config(&config("", "h")).is_err());
        assert!(verify_config(&config("/tmp", "h")).is_ok());
    }

    #[test]
    fn opening_twice_applies_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path().join("data").to_str().unwrap(), "h");
        let db = open_store(&cfg).unwrap();
        let first = garment_store::migrate::applied(db.as_ref()).unwrap().len();
        drop(db);
        let db = open_store(&cfg).unwrap();
        assert_eq!(garment_store::migrate::applied(db.as_ref()).unwrap().len(), first);
        assert!(registry::migrate_all(db.as_ref()).unwrap().is_empty());
    }
}
