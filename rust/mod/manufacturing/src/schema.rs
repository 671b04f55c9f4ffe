use garment_store::Migration;

pub const PRODUCTION_ORDERS: &str = "production_orders";
pub const STAGES: &str = "production_stages";
pub const MRNS: &str = "material_requests";
pub const DISPATCHES: &str = "material_dispatches";
pub const RECEIPTS: &str = "material_receipts";
pub const VERIFICATIONS: &str = "material_verifications";

pub const TRANSACTIONAL_TABLES: &[&str] = &[VERIFICATIONS, RECEIPTS, DISPATCHES, MRNS, STAGES, PRODUCTION_ORDERS];
pub const MASTER_TABLES: &[&str] = &[];

pub const MIGRATIONS: &[Migration] = &[Migration {
    module: "manufacturing",
    version: 1,
    name: "production orders, stages and material requests",
    sql: "
CREATE TABLE IF NOT EXISTS production_orders (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    sales_order_id TEXT,
    product_item_id TEXT NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_production_orders_so ON production_orders(sales_order_id);
CREATE INDEX IF NOT EXISTS idx_production_orders_status ON production_orders(status);

CREATE TABLE IF NOT EXISTS production_stages (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    production_order_id TEXT NOT NULL REFERENCES production_orders(id),
    sequence INTEGER NOT NULL,
    status TEXT NOT NULL,
    vendor_id TEXT,
    created_at TEXT,
    updated_at TEXT,
    UNIQUE (production_order_id, sequence)
);

CREATE TABLE IF NOT EXISTS material_requests (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    production_order_id TEXT REFERENCES production_orders(id),
    department TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_material_requests_order ON material_requests(production_order_id);

CREATE TABLE IF NOT EXISTS material_dispatches (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    mrn_id TEXT NOT NULL REFERENCES material_requests(id),
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS material_receipts (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    mrn_id TEXT NOT NULL REFERENCES material_requests(id),
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS material_verifications (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    mrn_id TEXT NOT NULL REFERENCES material_requests(id),
    created_at TEXT,
    updated_at TEXT
);
",
}];
