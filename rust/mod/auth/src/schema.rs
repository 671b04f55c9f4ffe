use garment_core::ServiceError;
use garment_sql::SQLStore;
use garment_store::{migrate, AppliedMigration, Migration};

pub const USERS: &str = "auth_users";
pub const ROLES: &str = "auth_roles";
pub const GRANTS: &str = "auth_grants";

pub const TRANSACTIONAL_TABLES: &[&str] = &[];
/// Roles are left alone by resets; built-in ones are re-seeded on migrate.
pub const MASTER_TABLES: &[&str] = &[GRANTS, USERS];

pub const MIGRATIONS: &[Migration] = &[Migration {
    module: "auth",
    version: 1,
    name: "users, roles and grants",
    sql: "
CREATE TABLE IF NOT EXISTS auth_users (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    username TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    department TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT,
    updated_at TEXT
);
CREATE TABLE IF NOT EXISTS auth_roles (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    builtin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT
);
CREATE TABLE IF NOT EXISTS auth_grants (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    user_id TEXT NOT NULL REFERENCES auth_users(id),
    role_id TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT,
    UNIQUE (user_id, role_id)
);
CREATE INDEX IF NOT EXISTS idx_auth_grants_role ON auth_grants(role_id);
",
}];

/// Apply the auth migrations and seed the built-in roles.
pub fn migrate(db: &dyn SQLStore) -> Result<Vec<AppliedMigration>, ServiceError> {
    let applied = migrate::apply(db, MIGRATIONS)?;
    crate::service::roles::seed_builtin_roles(db)?;
    Ok(applied)
}
