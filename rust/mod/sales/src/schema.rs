use garment_store::Migration;

pub const CUSTOMERS: &str = "customers";
pub const ORDERS: &str = "sales_orders";

pub const TRANSACTIONAL_TABLES: &[&str] = &[ORDERS];
pub const MASTER_TABLES: &[&str] = &[CUSTOMERS];

pub const MIGRATIONS: &[Migration] = &[Migration {
    module: "sales",
    version: 1,
    name: "customers and sales orders",
    sql: "
CREATE TABLE IF NOT EXISTS customers (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    name TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS sales_orders (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    customer_id TEXT NOT NULL REFERENCES customers(id),
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_sales_orders_customer ON sales_orders(customer_id);
CREATE INDEX IF NOT EXISTS idx_sales_orders_status ON sales_orders(status);
",
}];
