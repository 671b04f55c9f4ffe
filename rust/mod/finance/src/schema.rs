use garment_store::Migration;

pub const CREDIT_NOTES: &str = "credit_notes";

pub const TRANSACTIONAL_TABLES: &[&str] = &[CREDIT_NOTES];
pub const MASTER_TABLES: &[&str] = &[];

pub const MIGRATIONS: &[Migration] = &[Migration {
    module: "finance",
    version: 1,
    name: "credit notes",
    sql: "
CREATE TABLE IF NOT EXISTS credit_notes (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    number TEXT NOT NULL UNIQUE,
    party TEXT NOT NULL,
    party_id TEXT NOT NULL,
    vendor_request_id TEXT UNIQUE,
    sales_order_id TEXT,
    status TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_credit_notes_party ON credit_notes(party, party_id);
CREATE INDEX IF NOT EXISTS idx_credit_notes_status ON credit_notes(status);
",
}];
