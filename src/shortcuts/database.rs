//! SQLite-backed shortcut repository with migrations

use super::{normalize_query, ShortcutRepository};
use crate::config::ShortcutsConfig;
use crate::corpus::Corpus;
use crate::error::{QsbError, Result};
use crate::suggestion::{ListSuggestionCursor, Suggestion, SuggestionAction, SuggestionCursor};
use chrono::{Duration, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Shortcut repository stored in `shortcuts.sqlite`
pub struct SqliteShortcutRepository {
    pool: DbPool,
    max_shortcuts: usize,
    max_stat_age: Duration,
}

/// A stored shortcut with its click statistics
#[derive(Debug, Clone)]
pub struct ShortcutEntry {
    pub corpus: String,
    pub suggestion: Suggestion,
    pub hits: u64,
    pub last_hit: chrono::DateTime<Utc>,
}

/// Repository statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortcutStats {
    pub shortcuts: i64,
    pub clicks: i64,
}

impl SqliteShortcutRepository {
    /// Open or create the repository at `db_path`
    pub fn new(db_path: &Path, config: &ShortcutsConfig, max_shortcuts: usize) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QsbError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| QsbError::Config(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| QsbError::Config(format!("Failed to get connection: {}", e)))?;

            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let repo = Self {
            pool,
            max_shortcuts,
            max_stat_age: Duration::days(i64::from(config.max_stat_age_days)),
        };
        repo.migrate()?;

        tracing::debug!("Opened shortcut repository at {:?}", db_path);
        Ok(repo)
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| QsbError::Config(format!("Failed to get connection: {}", e)))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying shortcut migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Oldest click time still counted
    fn cutoff(&self) -> i64 {
        (Utc::now() - self.max_stat_age).timestamp_millis()
    }

    /// Shortcuts for `query` across every corpus, with their statistics
    pub fn list_shortcuts(&self, query: &str) -> Result<Vec<ShortcutEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(SHORTCUT_QUERY)?;
        let rows = stmt.query_map(params![like_prefix(query), self.cutoff()], entry_from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn stats(&self) -> Result<ShortcutStats> {
        let conn = self.get_conn()?;

        let shortcuts = conn.query_row("SELECT COUNT(*) FROM shortcuts", [], |row| row.get(0))?;
        let clicks = conn.query_row("SELECT COUNT(*) FROM clicklog", [], |row| row.get(0))?;

        Ok(ShortcutStats { shortcuts, clicks })
    }

    /// Drop clicks older than the stat age, and shortcuts left without clicks
    pub fn prune(&self) -> Result<usize> {
        let conn = self.get_conn()?;
        let clicks = conn.execute(
            "DELETE FROM clicklog WHERE hit_time < ?1",
            params![self.cutoff()],
        )?;
        conn.execute(
            "DELETE FROM shortcuts
             WHERE intent_key NOT IN (
                 SELECT intent_key FROM clicklog WHERE intent_key IS NOT NULL
             )",
            [],
        )?;

        if clicks > 0 {
            tracing::debug!("Pruned {} expired clicks", clicks);
        }
        Ok(clicks)
    }
}

impl ShortcutRepository for SqliteShortcutRepository {
    fn shortcuts_for_query(
        &self,
        query: &str,
        corpora: &[Arc<dyn Corpus>],
    ) -> Result<ListSuggestionCursor> {
        let allowed: HashSet<&str> = corpora.iter().map(|c| c.name()).collect();

        let shortcuts = self
            .list_shortcuts(query)?
            .into_iter()
            .filter(|entry| allowed.contains(entry.corpus.as_str()))
            .take(self.max_shortcuts)
            .map(|entry| entry.suggestion.as_shortcut());

        let cursor = ListSuggestionCursor::from_suggestions(query, shortcuts);
        tracing::debug!("Found {} shortcuts for {:?}", cursor.count(), query);
        Ok(cursor)
    }

    fn report_click(&self, corpus: &str, query: &str, suggestion: &Suggestion) -> Result<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().timestamp_millis();
        let query = normalize_query(query);

        let intent_key = if suggestion.is_shortcut_candidate() {
            let key = suggestion.key();
            tx.execute(
                "INSERT INTO shortcuts (
                    intent_key, source, corpus, text1, text2, icon1, icon2,
                    action, data, extra_data, action_query, shortcut_id, format, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(intent_key) DO UPDATE SET
                    source = excluded.source,
                    corpus = excluded.corpus,
                    text1 = excluded.text1,
                    text2 = excluded.text2,
                    icon1 = excluded.icon1,
                    icon2 = excluded.icon2,
                    shortcut_id = excluded.shortcut_id,
                    format = excluded.format,
                    updated_at = excluded.updated_at",
                params![
                    key,
                    suggestion.source,
                    corpus,
                    suggestion.text1,
                    suggestion.text2,
                    suggestion.icon1,
                    suggestion.icon2,
                    suggestion.action.action,
                    suggestion.action.data,
                    suggestion.action.extra_data,
                    suggestion.action.query,
                    suggestion.shortcut_id,
                    suggestion.format,
                    now,
                ],
            )?;
            Some(key)
        } else {
            tracing::debug!("Not storing shortcut for {:?}", suggestion.text1);
            None
        };

        // Clicks without a shortcut still count towards the corpus score
        tx.execute(
            "INSERT INTO clicklog (intent_key, query, hit_time, corpus) VALUES (?1, ?2, ?3, ?4)",
            params![intent_key, query, now, corpus],
        )?;
        tx.commit()?;

        tracing::debug!("Recorded click on {:?} in {} for {:?}", suggestion.text1, corpus, query);
        Ok(())
    }

    fn corpus_scores(&self) -> Result<HashMap<String, u64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT corpus, COUNT(*) FROM clicklog WHERE hit_time >= ?1 GROUP BY corpus",
        )?;
        let rows = stmt.query_map(params![self.cutoff()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut scores = HashMap::new();
        for row in rows {
            let (corpus, count) = row?;
            scores.insert(corpus, count.max(0) as u64);
        }
        Ok(scores)
    }

    fn clear_history(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            "
            DELETE FROM clicklog;
            DELETE FROM shortcuts;
            ",
        )?;
        tracing::info!("Cleared shortcut history");
        Ok(())
    }
}

/// Clicked queries starting with `query`, grouped per shortcut
const SHORTCUT_QUERY: &str = "
    SELECT s.corpus, s.source, s.text1, s.text2, s.icon1, s.icon2,
           s.action, s.data, s.extra_data, s.action_query, s.shortcut_id, s.format,
           COUNT(c.id) AS hits, MAX(c.hit_time) AS last_hit
    FROM clicklog c
    JOIN shortcuts s ON s.intent_key = c.intent_key
    WHERE c.query LIKE ?1 ESCAPE '\\' AND c.hit_time >= ?2
    GROUP BY s.intent_key
    ORDER BY hits DESC, last_hit DESC, s.text1 ASC
";

/// `LIKE` pattern matching every stored query that starts with `query`
fn like_prefix(query: &str) -> String {
    let mut pattern = String::new();
    for c in normalize_query(query).chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ShortcutEntry> {
    let last_hit: i64 = row.get("last_hit")?;

    let suggestion = Suggestion {
        source: row.get("source")?,
        text1: row.get("text1")?,
        text2: row.get("text2")?,
        icon1: row.get("icon1")?,
        icon2: row.get("icon2")?,
        action: SuggestionAction {
            action: row.get("action")?,
            data: row.get("data")?,
            extra_data: row.get("extra_data")?,
            query: row.get("action_query")?,
        },
        shortcut_id: row.get("shortcut_id")?,
        format: row.get("format")?,
        is_shortcut: true,
    };

    Ok(ShortcutEntry {
        corpus: row.get("corpus")?,
        suggestion,
        hits: row.get::<_, i64>("hits")?.max(0) as u64,
        last_hit: chrono::DateTime::from_timestamp_millis(last_hit).unwrap_or_default(),
    })
}

/// Database migrations
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE shortcuts (
        intent_key TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        corpus TEXT NOT NULL,
        text1 TEXT NOT NULL,
        text2 TEXT,
        icon1 TEXT,
        icon2 TEXT,
        action TEXT,
        data TEXT,
        extra_data TEXT,
        action_query TEXT,
        shortcut_id TEXT,
        format TEXT,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE clicklog (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        intent_key TEXT,
        query TEXT NOT NULL,
        hit_time INTEGER NOT NULL,
        corpus TEXT NOT NULL
    );

    CREATE INDEX idx_clicklog_query ON clicklog(query);
    CREATE INDEX idx_clicklog_hit_time ON clicklog(hit_time);
    CREATE INDEX idx_clicklog_intent_key ON clicklog(intent_key);
    "#,
];
