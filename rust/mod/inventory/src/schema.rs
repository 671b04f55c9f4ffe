use garment_store::Migration;

pub const ITEMS: &str = "items";
pub const BALANCES: &str = "stock_balances";
pub const MOVEMENTS: &str = "stock_movements";

/// Transactional tables, children first, cleared by `garment reset`.
pub const TRANSACTIONAL_TABLES: &[&str] = &[MOVEMENTS, BALANCES];

/// Master data, cleared only by a full reset.
pub const MASTER_TABLES: &[&str] = &[ITEMS];

pub const MIGRATIONS: &[Migration] = &[Migration {
    module: "inventory",
    version: 1,
    name: "items, balances and movements",
    sql: "
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    category TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);

CREATE TABLE IF NOT EXISTS stock_balances (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    item_id TEXT NOT NULL REFERENCES items(id),
    location TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT,
    UNIQUE (item_id, location)
);

CREATE TABLE IF NOT EXISTS stock_movements (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    item_id TEXT NOT NULL REFERENCES items(id),
    location TEXT NOT NULL,
    kind TEXT NOT NULL,
    reference_id TEXT,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_stock_movements_item ON stock_movements(item_id, location);
CREATE INDEX IF NOT EXISTS idx_stock_movements_reference ON stock_movements(reference_id);
",
}];
