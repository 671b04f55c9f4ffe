//! `garment init-config`: write a server config for a new deployment.

use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::Rng;

use garment_auth::password::hash_password;
use garmentd::config::{JwtConfig, LogConfig, RootConfig, ServerSection, StorageConfig};
use garmentd::ServerConfig;

pub struct InitOptions<'a> {
    pub name: &'a str,
    pub config_dir: &'a str,
    pub data_dir: &'a str,
    pub listen: &'a str,
    pub root_password: &'a str,
    pub force: bool,
}

/// 32 random bytes, hex encoded.
pub fn random_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..32).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// Write `<config_dir>/<name>.toml` and create the data directory.
pub fn init_config(opts: &InitOptions<'_>) -> Result<PathBuf> {
    let path = Path::new(opts.config_dir).join(format!("{}.toml", opts.name));
    if path.exists() && !opts.force {
        anyhow::bail!("{} already exists; pass --force to overwrite it", path.display());
    }

    let password_hash = hash_password(opts.root_password).map_err(|e| anyhow::anyhow!("{e}"))?;
    let config = ServerConfig {
        server: ServerSection { listen: opts.listen.to_string() },
        storage: StorageConfig { data_dir: opts.data_dir.to_string() },
        jwt: JwtConfig { secret: random_secret(), expire_secs: 86400 },
        root: RootConfig { password_hash },
        log: LogConfig::default(),
    };
    config.save(&path)?;
    std::fs::create_dir_all(opts.data_dir)?;

    println!("Config \"{}\" created.", opts.name);
    println!("  Config: {}", path.display());
    println!("  Data:   {}", opts.data_dir);
    Ok(path)
}
