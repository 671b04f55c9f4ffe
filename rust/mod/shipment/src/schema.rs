use garment_store::Migration;

pub const SHIPMENTS: &str = "shipments";

pub const TRANSACTIONAL_TABLES: &[&str] = &[SHIPMENTS];
pub const MASTER_TABLES: &[&str] = &[];

pub const MIGRATIONS: &[Migration] = &[Migration {
    module: "shipment",
    version: 1,
    name: "shipments",
    sql: "
CREATE TABLE IF NOT EXISTS shipments (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    sales_order_id TEXT NOT NULL,
    customer_id TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_shipments_so ON shipments(sales_order_id);
CREATE INDEX IF NOT EXISTS idx_shipments_status ON shipments(status);
",
}];
