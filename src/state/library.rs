use rusqlite::types::{Type, Value};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::data::{
    ConversationFacet, ConversationId, ConversationKind, FileType, MediaId, MediaRecord,
    MonthKey, SenderFacet, SenderId, SortOrder, TimelineEntry,
};
use crate::error::StoreError;
use crate::store::{MediaQuery, MediaStore, TimelineSource};

/// Summary of what the catalog holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStatus {
    pub has_data: bool,
    pub media_count: u64,
    pub conversation_count: u64,
}

/// One imported export folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub source_type: String,
    pub source_path: String,
    pub conversations: u64,
    pub media_count: u64,
}

/// A chat message stored around a media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextMessage {
    pub sender_name: String,
    pub content: String,
    pub timestamp_ms: i64,
}

/// A media item with the conversation around it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaContext {
    pub media: MediaRecord,
    pub before: Vec<ContextMessage>,
    pub after: Vec<ContextMessage>,
}

/// Conversation row written by an importer
#[derive(Debug, Clone)]
pub struct NewConversation<'a> {
    pub folder_name: &'a str,
    pub title: &'a str,
    pub kind: ConversationKind,
    pub source_type: &'a str,
    pub source_path: &'a str,
}

/// Media row written by an importer
#[derive(Debug, Clone)]
pub struct NewMedia<'a> {
    pub conversation_id: ConversationId,
    pub sender_id: SenderId,
    pub file_path: &'a str,
    pub file_type: FileType,
    pub timestamp_ms: i64,
    pub message_content: Option<&'a str>,
}

const MEDIA_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, m.timestamp_ms, \
     m.file_type, m.file_path, s.name, c.title";

/// UTC month of a media row. SQLite dates stop at year 9999, past which
/// this is NULL. Dividing by a real keeps negative instants flooring.
const MONTH_EXPR: &str = "strftime('%Y-%m', m.timestamp_ms / 1000.0, 'unixepoch')";

/// Punctuation folded to spaces before whole-word matching
const WORD_SEPARATORS: [&str; 6] = [",", ".", "!", "?", "\"", "'"];

/// SQL expression that pads `column` with spaces and folds punctuation,
/// so `LIKE '% word %'` only matches whole words.
fn word_expr(column: &str) -> String {
    let mut expr = column.to_string();
    for sep in WORD_SEPARATORS {
        let quoted = sep.replace('\'', "''");
        expr = format!("REPLACE({expr}, '{quoted}', ' ')");
    }
    format!("(' ' || {expr} || ' ') LIKE ? ESCAPE '\\'")
}

/// Escape `LIKE` wildcards so typed text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn conversion_error(idx: usize, err: crate::error::EngineError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    let file_type: String = row.get(4)?;
    Ok(MediaRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        timestamp_ms: row.get(3)?,
        file_type: file_type.parse().map_err(|e| conversion_error(4, e))?,
        locator: row.get(5)?,
        sender_name: row.get(6)?,
        conversation_name: row.get(7)?,
    })
}

fn count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(value.max(0) as u64)
}

fn conversations(conn: &Connection) -> rusqlite::Result<Vec<ConversationFacet>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.title, c.chat_type, COUNT(m.id) AS media_count
         FROM conversations c
         LEFT JOIN media m ON m.conversation_id = c.id
         GROUP BY c.id
         ORDER BY c.title",
    )?;
    let rows = stmt.query_map([], |row| {
        let chat_type: String = row.get(2)?;
        Ok(ConversationFacet {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: ConversationKind::from_db_str(&chat_type),
            usage_count: count(row, 3)?,
        })
    })?;
    rows.collect()
}

fn senders(conn: &Connection) -> rusqlite::Result<Vec<SenderFacet>> {
    // Only senders that actually sent media
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, COUNT(m.id) AS media_count
         FROM senders s
         INNER JOIN media m ON m.sender_id = s.id
         GROUP BY s.id
         ORDER BY s.name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SenderFacet {
            id: row.get(0)?,
            name: row.get(1)?,
            usage_count: count(row, 2)?,
        })
    })?;
    rows.collect()
}

fn timeline(conn: &Connection) -> rusqlite::Result<Vec<TimelineEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MONTH_EXPR} AS month_key, COUNT(*) AS count
         FROM media m
         WHERE {MONTH_EXPR} IS NOT NULL
         GROUP BY month_key
         ORDER BY month_key DESC"
    ))?;
    let rows = stmt.query_map([], |row| {
        let key: String = row.get(0)?;
        let month_key: MonthKey = key.parse().map_err(|e| conversion_error(0, e))?;
        Ok(TimelineEntry::new(month_key, count(row, 1)?))
    })?;
    rows.collect()
}

fn query_media(conn: &Connection, query: &MediaQuery) -> rusqlite::Result<Vec<MediaRecord>> {
    let mut sql = format!(
        "SELECT {MEDIA_COLUMNS}
         FROM media m
         INNER JOIN senders s ON s.id = m.sender_id
         INNER JOIN conversations c ON c.id = m.conversation_id
         WHERE 1=1"
    );
    let mut values: Vec<Value> = Vec::new();

    if let Some(id) = query.conversation_id {
        sql.push_str(" AND m.conversation_id = ?");
        values.push(Value::Integer(id));
    }
    if let Some(id) = query.sender_id {
        sql.push_str(" AND m.sender_id = ?");
        values.push(Value::Integer(id));
    }
    if let Some(file_type) = query.file_type {
        sql.push_str(" AND m.file_type = ?");
        values.push(Value::Text(file_type.as_str().to_string()));
    }
    if let Some(month) = query.month {
        sql.push_str(&format!(" AND {MONTH_EXPR} = ?"));
        values.push(Value::Text(month.to_string()));
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        // Names match on substrings, message text on whole words
        let search = escape_like(search);
        let name_pattern = format!("%{search}%");
        let word_pattern = format!("% {search} %");
        sql.push_str(&format!(
            " AND (s.name LIKE ? ESCAPE '\\' OR c.title LIKE ? ESCAPE '\\' OR {}
              OR m.id IN (SELECT cm.media_id FROM context_messages cm
                          INNER JOIN senders cs ON cs.id = cm.sender_id
                          WHERE cs.name LIKE ? ESCAPE '\\' OR {}))",
            word_expr("COALESCE(m.message_content, '')"),
            word_expr("cm.content"),
        ));
        values.push(Value::Text(name_pattern.clone()));
        values.push(Value::Text(name_pattern.clone()));
        values.push(Value::Text(word_pattern.clone()));
        values.push(Value::Text(name_pattern));
        values.push(Value::Text(word_pattern));
    }

    sql.push_str(match query.sort {
        SortOrder::DateAsc => " ORDER BY m.timestamp_ms ASC, m.id ASC",
        SortOrder::Sender => " ORDER BY s.name ASC, m.timestamp_ms DESC",
        SortOrder::DateDesc => " ORDER BY m.timestamp_ms DESC, m.id DESC",
    });

    sql.push_str(" LIMIT ? OFFSET ?");
    values.push(Value::Integer(i64::from(query.limit)));
    values.push(Value::Integer(i64::from(query.offset)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), media_from_row)?;
    rows.collect()
}

/// The Library manages the SQLite media catalog.
/// It stores conversations, senders, media records and the chat
/// messages around each media item.
pub struct Library {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl Library {
    /// Open or create the catalog at `db_path`, creating parent
    /// directories as needed.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        info!(path = %db_path.display(), "catalog opened");

        Self::with_connection(conn, Some(db_path.to_path_buf()))
    }

    /// A private catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Library {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS conversations (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                folder_name  TEXT NOT NULL UNIQUE,
                title        TEXT NOT NULL,
                chat_type    TEXT NOT NULL CHECK(chat_type IN ('group', 'dm')),
                source_type  TEXT NOT NULL DEFAULT 'facebook',
                source_path  TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS senders (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS media (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id  INTEGER NOT NULL REFERENCES conversations(id),
                sender_id        INTEGER NOT NULL REFERENCES senders(id),
                file_path        TEXT NOT NULL,
                file_type        TEXT NOT NULL CHECK(file_type IN ('image', 'video', 'gif')),
                timestamp_ms     INTEGER NOT NULL,
                message_content  TEXT
            );

            CREATE TABLE IF NOT EXISTS context_messages (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                media_id     INTEGER NOT NULL REFERENCES media(id),
                sender_id    INTEGER NOT NULL REFERENCES senders(id),
                content      TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                position     INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_conversation ON media(conversation_id);
            CREATE INDEX IF NOT EXISTS idx_media_sender ON media(sender_id);
            CREATE INDEX IF NOT EXISTS idx_media_file_type ON media(file_type);
            CREATE INDEX IF NOT EXISTS idx_media_timestamp ON media(timestamp_ms);
            CREATE INDEX IF NOT EXISTS idx_context_media ON context_messages(media_id);
            ",
        )?;

        debug!("catalog schema initialized");
        Ok(())
    }

    /// Get the path to the database file (`None` for in-memory catalogs)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run a read on the blocking pool so async callers are not stalled
    async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&guard).map_err(StoreError::from)
        })
        .await?
    }

    // ========== Catalog writes ==========

    /// Insert a conversation and return its ID
    pub fn insert_conversation(
        &self,
        conversation: &NewConversation<'_>,
    ) -> Result<ConversationId, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (folder_name, title, chat_type, source_type, source_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                conversation.folder_name,
                conversation.title,
                conversation.kind.as_db_str(),
                conversation.source_type,
                conversation.source_path,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a sender by name, creating it if needed
    pub fn get_or_create_sender(&self, name: &str) -> Result<SenderId, StoreError> {
        let conn = self.conn()?;
        let existing = conn.query_row(
            "SELECT id FROM senders WHERE name = ?1",
            params![name],
            |row| row.get(0),
        );

        match existing {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                conn.execute("INSERT INTO senders (name) VALUES (?1)", params![name])?;
                Ok(conn.last_insert_rowid())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a media item and return its ID
    pub fn insert_media(&self, media: &NewMedia<'_>) -> Result<MediaId, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO media
                (conversation_id, sender_id, file_path, file_type, timestamp_ms, message_content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                media.conversation_id,
                media.sender_id,
                media.file_path,
                media.file_type.as_str(),
                media.timestamp_ms,
                media.message_content,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Attach a chat message to a media item. Negative positions come
    /// before the media, positive ones after.
    pub fn insert_context_message(
        &self,
        media_id: MediaId,
        sender_id: SenderId,
        content: &str,
        timestamp_ms: i64,
        position: i32,
    ) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO context_messages (media_id, sender_id, content, timestamp_ms, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![media_id, sender_id, content, timestamp_ms, position],
        )?;
        Ok(())
    }

    // ========== Catalog maintenance ==========

    pub fn import_status(&self) -> Result<ImportStatus, StoreError> {
        let conn = self.conn()?;
        let media_count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        let conversation_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;

        Ok(ImportStatus {
            has_data: media_count > 0,
            media_count: media_count.max(0) as u64,
            conversation_count: conversation_count.max(0) as u64,
        })
    }

    /// Imported export folders with their conversation and media counts
    pub fn sources(&self) -> Result<Vec<SourceInfo>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.source_type, c.source_path,
                    COUNT(DISTINCT c.id) AS conversations,
                    COUNT(m.id) AS media_count
             FROM conversations c
             LEFT JOIN media m ON m.conversation_id = c.id
             GROUP BY c.source_type, c.source_path
             ORDER BY c.source_path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SourceInfo {
                source_type: row.get(0)?,
                source_path: row.get(1)?,
                conversations: count(row, 2)?,
                media_count: count(row, 3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete everything imported from one export folder.
    /// Senders left without any media or messages are removed too.
    pub fn remove_source(&self, source_path: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM context_messages WHERE media_id IN (
                SELECT m.id FROM media m
                INNER JOIN conversations c ON c.id = m.conversation_id
                WHERE c.source_path = ?1)",
            params![source_path],
        )?;
        tx.execute(
            "DELETE FROM media WHERE conversation_id IN (
                SELECT id FROM conversations WHERE source_path = ?1)",
            params![source_path],
        )?;
        let removed = tx.execute(
            "DELETE FROM conversations WHERE source_path = ?1",
            params![source_path],
        )?;
        tx.execute(
            "DELETE FROM senders
             WHERE id NOT IN (SELECT sender_id FROM media)
               AND id NOT IN (SELECT sender_id FROM context_messages)",
            [],
        )?;
        tx.commit()?;

        info!(source_path, conversations = removed, "source removed from catalog");
        Ok(())
    }

    /// Delete all catalog contents and reclaim disk space
    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            DELETE FROM context_messages;
            DELETE FROM media;
            DELETE FROM senders;
            DELETE FROM conversations;
            VACUUM;
            ",
        )?;
        info!("catalog cleared");
        Ok(())
    }

    /// Size of the catalog file in bytes (0 for in-memory catalogs)
    pub fn storage_size(&self) -> u64 {
        self.db_path
            .as_deref()
            .and_then(|path| std::fs::metadata(path).ok())
            .map(|meta| meta.len())
            .unwrap_or(0)
    }

    /// A media item and the messages stored around it
    pub fn media_context(&self, media_id: MediaId) -> Result<MediaContext, StoreError> {
        let conn = self.conn()?;
        let media = conn
            .query_row(
                &format!(
                    "SELECT {MEDIA_COLUMNS}
                     FROM media m
                     INNER JOIN senders s ON s.id = m.sender_id
                     INNER JOIN conversations c ON c.id = m.conversation_id
                     WHERE m.id = ?1"
                ),
                params![media_id],
                media_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(media_id),
                other => other.into(),
            })?;

        let mut stmt = conn.prepare(
            "SELECT s.name, cm.content, cm.timestamp_ms, cm.position
             FROM context_messages cm
             INNER JOIN senders s ON s.id = cm.sender_id
             WHERE cm.media_id = ?1
             ORDER BY cm.position ASC",
        )?;
        let rows = stmt.query_map(params![media_id], |row| {
            let position: i32 = row.get(3)?;
            let message = ContextMessage {
                sender_name: row.get(0)?,
                content: row.get(1)?,
                timestamp_ms: row.get(2)?,
            };
            Ok((message, position))
        })?;

        let mut before = Vec::new();
        let mut after = Vec::new();
        for row in rows {
            let (message, position) = row?;
            if position < 0 {
                before.push(message);
            } else {
                after.push(message);
            }
        }

        Ok(MediaContext { media, before, after })
    }
}

impl MediaStore for Library {
    async fn get_conversations(&self) -> Result<Vec<ConversationFacet>, StoreError> {
        self.read(conversations).await
    }

    async fn get_senders(&self) -> Result<Vec<SenderFacet>, StoreError> {
        self.read(senders).await
    }

    async fn get_timeline_raw(&self) -> Result<TimelineSource, StoreError> {
        self.read(timeline).await.map(TimelineSource::Aggregated)
    }

    async fn query_media(&self, query: MediaQuery) -> Result<Vec<MediaRecord>, StoreError> {
        debug!(?query, "catalog media query");
        self.read(move |conn| query_media(conn, &query)).await
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
