//! Ordered, idempotent schema migrations (§4.5).
//!
//! Each migration is gated by a row in `_meta` so re-running `migrate`
//! against an already-current database is a no-op. Migrations run
//! inside the writer connection's exclusive lock; none of them are
//! reordered or combined once shipped.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, StorageError};

fn meta_get(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM _meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .map_err(StorageError::from)
}

fn meta_set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO _meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;
    Ok(())
}

/// Run every migration below, in order, against `conn`. Safe to call on
/// every process start.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS _meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)")?;

    create_base_table(conn)?;
    add_decay_columns(conn)?;
    convert_millis_to_seconds(conn)?;
    rebuild_fts_with_search_tags(conn)?;
    enforce_entity_key_uniqueness(conn)?;
    backfill_null_expiry(conn)?;
    rebuild_case_insensitive_entity_index(conn)?;
    create_secondary_indexes(conn)?;

    Ok(())
}

fn create_base_table(conn: &Connection) -> Result<()> {
    if meta_get(conn, "base_table")?.is_some() {
        return Ok(());
    }
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'fact',
            importance REAL NOT NULL DEFAULT 0.5,
            entity TEXT,
            key TEXT,
            value TEXT,
            source TEXT,
            created_at INTEGER NOT NULL,
            last_confirmed_at INTEGER NOT NULL
        )",
    )?;
    meta_set(conn, "base_table", "1")?;
    Ok(())
}

fn add_decay_columns(conn: &Connection) -> Result<()> {
    if meta_get(conn, "decay_columns")?.is_some() {
        return Ok(());
    }
    let has_column = |name: &str| -> Result<bool> {
        let mut stmt = conn.prepare("PRAGMA table_info(memories)")?;
        let exists = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .filter_map(std::result::Result::ok)
            .any(|col| col == name);
        Ok(exists)
    };
    if !has_column("decay_class")? {
        conn.execute_batch("ALTER TABLE memories ADD COLUMN decay_class TEXT NOT NULL DEFAULT 'stable'")?;
    }
    if !has_column("expires_at")? {
        conn.execute_batch("ALTER TABLE memories ADD COLUMN expires_at INTEGER")?;
    }
    if !has_column("confidence")? {
        conn.execute_batch("ALTER TABLE memories ADD COLUMN confidence REAL NOT NULL DEFAULT 1.0")?;
    }
    if !has_column("search_tags")? {
        conn.execute_batch("ALTER TABLE memories ADD COLUMN search_tags TEXT NOT NULL DEFAULT ''")?;
    }
    meta_set(conn, "decay_columns", "1")?;
    Ok(())
}

/// Earlier schema revisions stored `created_at`/`last_confirmed_at` in
/// milliseconds; every operation in this crate works in whole seconds.
fn convert_millis_to_seconds(conn: &Connection) -> Result<()> {
    if meta_get(conn, "timestamp_unit")?.is_some() {
        return Ok(());
    }
    // A millisecond timestamp for any plausible memory creation date is
    // always > 10^12; a seconds timestamp never is. Used as the one-time
    // detection heuristic rather than trusting a version marker that
    // predates this migration's existence.
    conn.execute_batch(
        "UPDATE memories SET created_at = created_at / 1000 WHERE created_at > 100000000000;
         UPDATE memories SET last_confirmed_at = last_confirmed_at / 1000 WHERE last_confirmed_at > 100000000000;
         UPDATE memories SET expires_at = expires_at / 1000 WHERE expires_at > 100000000000;",
    )?;
    meta_set(conn, "timestamp_unit", "seconds")?;
    Ok(())
}

fn rebuild_fts_with_search_tags(conn: &Connection) -> Result<()> {
    if meta_get(conn, "fts_version")?.as_deref() == Some("3") {
        return Ok(());
    }
    conn.execute_batch(
        "DROP TABLE IF EXISTS memories_fts;
         CREATE VIRTUAL TABLE memories_fts USING fts5(
            id UNINDEXED,
            text,
            entity,
            key,
            value,
            search_tags,
            tokenize = 'porter unicode61 remove_diacritics 2'
         );

         DROP TRIGGER IF EXISTS memories_ai;
         DROP TRIGGER IF EXISTS memories_ad;
         DROP TRIGGER IF EXISTS memories_au;

         CREATE TRIGGER memories_ai AFTER INSERT ON memories BEGIN
            INSERT INTO memories_fts (id, text, entity, key, value, search_tags)
            VALUES (new.id, new.text, new.entity, new.key, new.value, new.search_tags);
         END;

         CREATE TRIGGER memories_ad AFTER DELETE ON memories BEGIN
            DELETE FROM memories_fts WHERE id = old.id;
         END;

         CREATE TRIGGER memories_au AFTER UPDATE ON memories BEGIN
            DELETE FROM memories_fts WHERE id = old.id;
            INSERT INTO memories_fts (id, text, entity, key, value, search_tags)
            VALUES (new.id, new.text, new.entity, new.key, new.value, new.search_tags);
         END;

         INSERT INTO memories_fts (id, text, entity, key, value, search_tags)
            SELECT id, text, entity, key, value, search_tags FROM memories;",
    )?;
    meta_set(conn, "fts_version", "3")?;
    Ok(())
}

/// Two rows sharing a non-null (entity, key) case-insensitively are a
/// write race or a pre-constraint duplicate; keep the most recently
/// confirmed row of each group and drop the rest before the unique index
/// can be created. The index itself is built on the lowercased columns
/// so the constraint matches the case-insensitive lookup/upsert path.
fn enforce_entity_key_uniqueness(conn: &Connection) -> Result<()> {
    if meta_get(conn, "entity_key_unique")?.is_some() {
        return Ok(());
    }
    conn.execute_batch(
        "DELETE FROM memories
         WHERE entity IS NOT NULL AND key IS NOT NULL AND id NOT IN (
            SELECT id FROM (
                SELECT id, ROW_NUMBER() OVER (
                    PARTITION BY lower(entity), lower(key)
                    ORDER BY last_confirmed_at DESC, created_at DESC
                ) AS rn
                FROM memories
                WHERE entity IS NOT NULL AND key IS NOT NULL
            )
            WHERE rn = 1
         );

         CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_entity_key
            ON memories(lower(entity), lower(key)) WHERE entity IS NOT NULL AND key IS NOT NULL;",
    )?;
    meta_set(conn, "entity_key_unique", "1")?;
    Ok(())
}

fn backfill_null_expiry(conn: &Connection) -> Result<()> {
    if meta_get(conn, "expiry_backfill")?.is_some() {
        return Ok(());
    }
    conn.execute_batch(
        "UPDATE memories SET expires_at = created_at + 90 * 86400
            WHERE expires_at IS NULL AND decay_class != 'permanent';",
    )?;
    meta_set(conn, "expiry_backfill", "1")?;
    Ok(())
}

fn rebuild_case_insensitive_entity_index(conn: &Connection) -> Result<()> {
    if meta_get(conn, "nocase_index")?.as_deref() == Some("1") {
        return Ok(());
    }
    conn.execute_batch(
        "DROP INDEX IF EXISTS idx_memories_entity_nocase;
         CREATE INDEX idx_memories_entity_nocase ON memories(entity COLLATE NOCASE);",
    )?;
    meta_set(conn, "nocase_index", "1")?;
    Ok(())
}

/// Remaining lookup-path indexes: category (tool/CLI filtering),
/// decay_class (maintenance-pass scans), and a partial index over
/// expires_at restricted to rows that can actually expire.
fn create_secondary_indexes(conn: &Connection) -> Result<()> {
    if meta_get(conn, "secondary_indexes")?.is_some() {
        return Ok(());
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category);
         CREATE INDEX IF NOT EXISTS idx_memories_decay_class ON memories(decay_class);
         CREATE INDEX IF NOT EXISTS idx_memories_expires_at ON memories(expires_at)
            WHERE expires_at IS NOT NULL;",
    )?;
    meta_set(conn, "secondary_indexes", "1")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory_db() -> Connection {
        Connection::open_in_memory().expect("open in-memory db")
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = open_memory_db();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn fts_mirror_stays_in_sync_on_insert_update_delete() {
        let conn = open_memory_db();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO memories (id, text, created_at, last_confirmed_at, search_tags)
             VALUES ('1', 'hello world', 100, 100, '')",
            [],
        )
        .unwrap();
        let fts_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories_fts WHERE text MATCH 'hello'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fts_count, 1);

        conn.execute("UPDATE memories SET text = 'goodbye' WHERE id = '1'", []).unwrap();
        let stale: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories_fts WHERE text MATCH 'hello'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stale, 0);

        conn.execute("DELETE FROM memories WHERE id = '1'", []).unwrap();
        let remaining: i64 = conn.query_row("SELECT COUNT(*) FROM memories_fts", [], |r| r.get(0)).unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn entity_key_pair_is_unique() {
        let conn = open_memory_db();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO memories (id, text, entity, key, created_at, last_confirmed_at, search_tags)
             VALUES ('1', 'a', 'Fred', 'editor', 100, 100, '')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO memories (id, text, entity, key, created_at, last_confirmed_at, search_tags)
             VALUES ('2', 'b', 'Fred', 'editor', 101, 101, '')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn entity_key_pair_uniqueness_is_case_insensitive() {
        let conn = open_memory_db();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO memories (id, text, entity, key, created_at, last_confirmed_at, search_tags)
             VALUES ('1', 'a', 'Fred', 'editor', 100, 100, '')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO memories (id, text, entity, key, created_at, last_confirmed_at, search_tags)
             VALUES ('2', 'b', 'fred', 'EDITOR', 101, 101, '')",
            [],
        );
        assert!(result.is_err());
    }
}
