//! Physical storage layout of the document store.
//!
//! These steps shape the SQLite tables that hold documents. They are applied
//! on open and are unrelated to the document migrations run by
//! `ims-migrate`, which only ever touch document bodies.

/// A versioned step of the physical storage layout.
#[derive(Debug)]
pub struct LayoutStep {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const LAYOUT_001: &str = r#"
-- Documents of every collection. `seq` keeps insertion order.
CREATE TABLE IF NOT EXISTS documents (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    UNIQUE (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq);
"#;

pub const LAYOUT: &[LayoutStep] = &[LayoutStep {
    version: 1,
    name: "documents",
    sql: LAYOUT_001,
}];
