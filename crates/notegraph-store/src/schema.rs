//! Database schema SQL.

/// Chunk table: one row per embedded text segment, tagged with its
/// owner, workspace, and page scope. The vector column holds the
/// bracketed comma-separated literal form.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS text_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    owner_id INTEGER NOT NULL,
    workspace_id INTEGER NOT NULL,
    page_id INTEGER NOT NULL,
    vector TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_text_chunks_owner ON text_chunks(owner_id);
CREATE INDEX IF NOT EXISTS idx_text_chunks_owner_page ON text_chunks(owner_id, page_id);
CREATE INDEX IF NOT EXISTS idx_text_chunks_page ON text_chunks(page_id);
CREATE INDEX IF NOT EXISTS idx_text_chunks_workspace ON text_chunks(workspace_id);
"#;
