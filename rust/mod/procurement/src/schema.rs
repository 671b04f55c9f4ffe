use garment_store::Migration;

pub const VENDORS: &str = "vendors";
pub const PURCHASE_ORDERS: &str = "purchase_orders";
pub const GRNS: &str = "goods_receipt_notes";
pub const VENDOR_REQUESTS: &str = "vendor_requests";

pub const TRANSACTIONAL_TABLES: &[&str] = &[VENDOR_REQUESTS, GRNS, PURCHASE_ORDERS];
pub const MASTER_TABLES: &[&str] = &[VENDORS];

pub const MIGRATIONS: &[Migration] = &[Migration {
    module: "procurement",
    version: 1,
    name: "vendors, purchase orders, receipts and vendor requests",
    sql: "
CREATE TABLE IF NOT EXISTS vendors (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS purchase_orders (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    vendor_id TEXT NOT NULL REFERENCES vendors(id),
    sales_order_id TEXT,
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_purchase_orders_vendor ON purchase_orders(vendor_id);
CREATE INDEX IF NOT EXISTS idx_purchase_orders_status ON purchase_orders(status);

CREATE TABLE IF NOT EXISTS goods_receipt_notes (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    purchase_order_id TEXT NOT NULL REFERENCES purchase_orders(id),
    vendor_id TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_grn_po ON goods_receipt_notes(purchase_order_id);

CREATE TABLE IF NOT EXISTS vendor_requests (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    vendor_id TEXT NOT NULL,
    purchase_order_id TEXT NOT NULL,
    grn_id TEXT NOT NULL REFERENCES goods_receipt_notes(id),
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_vendor_requests_vendor ON vendor_requests(vendor_id);
",
}];
