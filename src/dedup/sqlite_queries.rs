pub const QUERY_CREATE_DEDUP_KEYS: &str = r#"
CREATE TABLE IF NOT EXISTS dedup_keys (
    dedup_key TEXT PRIMARY KEY NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

/// Inserts the key, or revives it when the stored entry already expired.
/// One row changed means the caller won the key.
pub const QUERY_CHECK_AND_MARK: &str = r#"
INSERT INTO dedup_keys(dedup_key,expires_at) VALUES($1,$2)
ON CONFLICT(dedup_key) DO UPDATE SET expires_at=excluded.expires_at
WHERE dedup_keys.expires_at <= $3;
"#;

pub const QUERY_DELETE_EXPIRED: &str = r#"
DELETE FROM dedup_keys WHERE expires_at <= $1;
"#;
