//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `CatalogStorage`
//! trait using rusqlite. Identifiers are stored as hyphenated UUID strings and
//! many-to-many relations live in link tables with cascading deletes.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Params};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CatalogStorage, StorageError, StorageResult};
use crate::embedding::normalize_text;
use crate::models::{
    Author, AuthorInput, Authorship, Citation, Named, NamedInput, NewText, Text, User,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS texts (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    normalized_title TEXT NOT NULL,
    year INTEGER,
    n_citation INTEGER NOT NULL DEFAULT 0,
    abstract TEXT NOT NULL DEFAULT '',
    venue_name TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_texts_normalized_title ON texts(normalized_title);
CREATE INDEX IF NOT EXISTS idx_texts_year ON texts(year);

CREATE TABLE IF NOT EXISTS authors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_authors_name ON authors(name);

CREATE TABLE IF NOT EXISTS orgs (id TEXT PRIMARY KEY, name TEXT NOT NULL UNIQUE);
CREATE TABLE IF NOT EXISTS keywords (id TEXT PRIMARY KEY, name TEXT NOT NULL UNIQUE);
CREATE TABLE IF NOT EXISTS fos (id TEXT PRIMARY KEY, name TEXT NOT NULL UNIQUE);
CREATE TABLE IF NOT EXISTS tags (id TEXT PRIMARY KEY, name TEXT NOT NULL UNIQUE);

CREATE TABLE IF NOT EXISTS text_keywords (
    text_id TEXT NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
    keyword_id TEXT NOT NULL REFERENCES keywords(id) ON DELETE CASCADE,
    PRIMARY KEY (text_id, keyword_id)
);
CREATE TABLE IF NOT EXISTS text_fos (
    text_id TEXT NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
    fos_id TEXT NOT NULL REFERENCES fos(id) ON DELETE CASCADE,
    PRIMARY KEY (text_id, fos_id)
);
CREATE TABLE IF NOT EXISTS text_tags (
    text_id TEXT NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
    tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (text_id, tag_id)
);
CREATE TABLE IF NOT EXISTS text_authors (
    text_id TEXT NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
    author_id TEXT NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (text_id, author_id)
);
CREATE TABLE IF NOT EXISTS author_orgs (
    author_id TEXT NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
    org_id TEXT NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
    PRIMARY KEY (author_id, org_id)
);

CREATE TABLE IF NOT EXISTS citations (
    text_id_from TEXT NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
    text_id_to TEXT NOT NULL REFERENCES texts(id) ON DELETE CASCADE,
    PRIMARY KEY (text_id_from, text_id_to)
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    email TEXT NOT NULL DEFAULT '',
    author_id TEXT
);
"#;

const TEXT_COLUMNS: &str = "id, title, year, n_citation, abstract, venue_name";

/// Tables holding entries that are unique by name.
#[derive(Debug, Clone, Copy)]
enum NamedTable {
    Orgs,
    Keywords,
    Fos,
    Tags,
}

impl NamedTable {
    fn table(self) -> &'static str {
        match self {
            NamedTable::Orgs => "orgs",
            NamedTable::Keywords => "keywords",
            NamedTable::Fos => "fos",
            NamedTable::Tags => "tags",
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(..) => {
                StorageError::SerializationError(e.to_string())
            }
            _ => StorageError::QueryError(e.to_string()),
        }
    }
}

/// SQLite-based catalog storage.
///
/// The connection sits behind an async mutex, so one instance can be shared
/// between request handlers through an `Arc`.
pub struct SqliteStorage {
    /// Path to the SQLite database file (`:memory:` for in-memory databases)
    db_path: String,

    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file and make sure the schema exists.
    ///
    /// # Errors
    /// Returns `StorageError::ConnectionError` if the file cannot be opened
    /// and `StorageError::SchemaError` if schema creation fails
    pub fn open(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StorageError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        Self::with_connection(conn, path.display().to_string())
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, db_path: String) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        Self::create_schema(&conn)?;
        info!("Opened catalog database at {}", db_path);
        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    fn create_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::SchemaError(e.to_string()))
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("db_path", &self.db_path)
            .finish()
    }
}

// ----- Row helpers -----

fn parse_uuid(column: usize, value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn text_exists(conn: &Connection, id: Uuid) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM texts WHERE id = ?1",
        params![id.to_string()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn author_exists(conn: &Connection, id: Uuid) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM authors WHERE id = ?1",
        params![id.to_string()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn query_ids<P: Params>(conn: &Connection, sql: &str, params: P) -> rusqlite::Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| parse_uuid(0, row.get(0)?))?;
    rows.collect()
}

fn load_named<P: Params>(conn: &Connection, sql: &str, params: P) -> rusqlite::Result<Vec<Named>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(Named {
            id: parse_uuid(0, row.get(0)?)?,
            name: row.get(1)?,
        })
    })?;
    rows.collect()
}

fn load_author(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Author>> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM authors WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    let Some(name) = name else {
        return Ok(None);
    };

    let orgs = load_named(
        conn,
        "SELECT o.id, o.name FROM orgs o
         JOIN author_orgs ao ON ao.org_id = o.id
         WHERE ao.author_id = ?1 ORDER BY o.rowid",
        params![id.to_string()],
    )?;

    Ok(Some(Author { id, name, orgs }))
}

fn load_text(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Text>> {
    let sql = format!("SELECT {} FROM texts WHERE id = ?1", TEXT_COLUMNS);
    let text = conn
        .query_row(&sql, params![id.to_string()], |row| {
            Ok(Text {
                id: parse_uuid(0, row.get(0)?)?,
                title: row.get(1)?,
                year: row.get(2)?,
                n_citation: row.get(3)?,
                abstract_text: row.get(4)?,
                venue_name: row.get(5)?,
                keywords: Vec::new(),
                authors: Vec::new(),
                fos: Vec::new(),
                tags: Vec::new(),
            })
        })
        .optional()?;

    let Some(mut text) = text else {
        return Ok(None);
    };

    let key = id.to_string();
    text.keywords = load_named(
        conn,
        "SELECT k.id, k.name FROM keywords k
         JOIN text_keywords tk ON tk.keyword_id = k.id
         WHERE tk.text_id = ?1 ORDER BY k.rowid",
        params![key],
    )?;
    text.fos = load_named(
        conn,
        "SELECT f.id, f.name FROM fos f
         JOIN text_fos tf ON tf.fos_id = f.id
         WHERE tf.text_id = ?1 ORDER BY f.rowid",
        params![key],
    )?;
    text.tags = load_named(
        conn,
        "SELECT g.id, g.name FROM tags g
         JOIN text_tags tg ON tg.tag_id = g.id
         WHERE tg.text_id = ?1 ORDER BY g.rowid",
        params![key],
    )?;

    let author_ids = query_ids(
        conn,
        "SELECT author_id FROM text_authors WHERE text_id = ?1 ORDER BY position",
        params![key],
    )?;
    for author_id in author_ids {
        if let Some(author) = load_author(conn, author_id)? {
            text.authors.push(author);
        }
    }

    Ok(Some(text))
}

fn load_texts(conn: &Connection, ids: Vec<Uuid>) -> rusqlite::Result<Vec<Text>> {
    let mut texts = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(text) = load_text(conn, id)? {
            texts.push(text);
        }
    }
    Ok(texts)
}

fn load_user(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Option<User>> {
    let sql = format!(
        "SELECT id, login, password_hash, email, author_id FROM users WHERE {} = ?1",
        column
    );
    conn.query_row(&sql, params![value], |row| {
        let author_id: Option<String> = row.get(4)?;
        Ok(User {
            id: parse_uuid(0, row.get(0)?)?,
            login: row.get(1)?,
            password_hash: row.get(2)?,
            email: row.get(3)?,
            author_id: author_id.map(|s| parse_uuid(4, s)).transpose()?,
        })
    })
    .optional()
}

// ----- Write helpers -----

/// Find a named entry by name, creating it if it doesn't exist.
fn get_or_create_named(
    conn: &Connection,
    table: NamedTable,
    input: &NamedInput,
) -> rusqlite::Result<Uuid> {
    let select = format!("SELECT id FROM {} WHERE name = ?1", table.table());
    let existing: Option<String> = conn
        .query_row(&select, params![input.name], |row| row.get(0))
        .optional()?;

    if let Some(id) = existing {
        return parse_uuid(0, id);
    }

    let id = input.id.unwrap_or_else(Uuid::new_v4);
    let insert = format!("INSERT INTO {} (id, name) VALUES (?1, ?2)", table.table());
    conn.execute(&insert, params![id.to_string(), input.name])?;
    Ok(id)
}

fn link_orgs(conn: &Connection, author_id: Uuid, orgs: &[NamedInput]) -> rusqlite::Result<()> {
    for org in orgs {
        let org_id = get_or_create_named(conn, NamedTable::Orgs, org)?;
        conn.execute(
            "INSERT OR IGNORE INTO author_orgs (author_id, org_id) VALUES (?1, ?2)",
            params![author_id.to_string(), org_id.to_string()],
        )?;
    }
    Ok(())
}

fn create_author(conn: &Connection, input: &AuthorInput) -> rusqlite::Result<Uuid> {
    let id = input.id.unwrap_or_else(Uuid::new_v4);
    conn.execute(
        "INSERT INTO authors (id, name) VALUES (?1, ?2)",
        params![id.to_string(), input.name],
    )?;
    link_orgs(conn, id, &input.orgs)?;
    Ok(id)
}

/// Reuse an author whose ID already exists, otherwise create it.
fn get_or_create_author(conn: &Connection, input: &AuthorInput) -> rusqlite::Result<Uuid> {
    if let Some(id) = input.id {
        if author_exists(conn, id)? {
            return Ok(id);
        }
    }
    create_author(conn, input)
}

fn link_named(
    conn: &Connection,
    table: NamedTable,
    link_sql: &str,
    text_id: Uuid,
    entries: &[NamedInput],
) -> rusqlite::Result<()> {
    for entry in entries {
        let entry_id = get_or_create_named(conn, table, entry)?;
        conn.execute(link_sql, params![text_id.to_string(), entry_id.to_string()])?;
    }
    Ok(())
}

#[async_trait]
impl CatalogStorage for SqliteStorage {
    async fn initialize(&self) -> StorageResult<()> {
        let conn = self.conn.lock().await;
        Self::create_schema(&conn)
    }

    async fn insert_text(&self, text: &NewText) -> StorageResult<Text> {
        let mut conn = self.conn.lock().await;
        let id = text.id.unwrap_or_else(Uuid::new_v4);

        if text_exists(&conn, id)? {
            return Err(StorageError::DuplicateEntry(format!("Text {} already exists", id)));
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO texts (id, title, normalized_title, year, n_citation, abstract, venue_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                text.title,
                normalize_text(&text.title),
                text.year,
                text.n_citation,
                text.abstract_text,
                text.venue_name,
            ],
        )?;

        link_named(
            &tx,
            NamedTable::Keywords,
            "INSERT OR IGNORE INTO text_keywords (text_id, keyword_id) VALUES (?1, ?2)",
            id,
            &text.keywords,
        )?;
        link_named(
            &tx,
            NamedTable::Fos,
            "INSERT OR IGNORE INTO text_fos (text_id, fos_id) VALUES (?1, ?2)",
            id,
            &text.fos,
        )?;
        link_named(
            &tx,
            NamedTable::Tags,
            "INSERT OR IGNORE INTO text_tags (text_id, tag_id) VALUES (?1, ?2)",
            id,
            &text.tags,
        )?;

        for (position, author) in text.authors.iter().enumerate() {
            let author_id = get_or_create_author(&tx, author)?;
            tx.execute(
                "INSERT OR IGNORE INTO text_authors (text_id, author_id, position) VALUES (?1, ?2, ?3)",
                params![id.to_string(), author_id.to_string(), sql_limit(position)],
            )?;
        }

        tx.commit()?;
        debug!("Inserted text {} ({})", id, text.title);

        load_text(&conn, id)?
            .ok_or_else(|| StorageError::Other(format!("Text {} vanished after insert", id)))
    }

    async fn get_text(&self, id: Uuid) -> StorageResult<Text> {
        let conn = self.conn.lock().await;
        load_text(&conn, id)?.ok_or_else(|| StorageError::NotFound(format!("Text {}", id)))
    }

    async fn list_texts(&self, skip: usize, limit: usize) -> StorageResult<Vec<Text>> {
        let conn = self.conn.lock().await;
        let ids = query_ids(
            &conn,
            "SELECT id FROM texts ORDER BY rowid LIMIT ?1 OFFSET ?2",
            params![sql_limit(limit), sql_limit(skip)],
        )?;
        Ok(load_texts(&conn, ids)?)
    }

    async fn delete_text(&self, id: Uuid) -> StorageResult<Text> {
        let conn = self.conn.lock().await;
        let text = load_text(&conn, id)?
            .ok_or_else(|| StorageError::NotFound(format!("Text {}", id)))?;
        conn.execute("DELETE FROM texts WHERE id = ?1", params![id.to_string()])?;
        debug!("Deleted text {}", id);
        Ok(text)
    }

    async fn count_texts(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM texts", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn exists_by_title(&self, normalized_title: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().await;
        let found = conn
            .query_row(
                "SELECT 1 FROM texts WHERE normalized_title = ?1 LIMIT 1",
                params![normalized_title],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn texts_with_tag(&self, tag: &str, limit: usize) -> StorageResult<Vec<Text>> {
        let conn = self.conn.lock().await;
        let ids = query_ids(
            &conn,
            "SELECT t.id FROM texts t
             WHERE EXISTS (
                 SELECT 1 FROM text_tags tg JOIN tags g ON g.id = tg.tag_id
                 WHERE tg.text_id = t.id AND g.name = ?1
             )
             ORDER BY t.rowid LIMIT ?2",
            params![tag, sql_limit(limit)],
        )?;
        Ok(load_texts(&conn, ids)?)
    }

    async fn texts_by_author(&self, author: &str, limit: usize) -> StorageResult<Vec<Text>> {
        let conn = self.conn.lock().await;
        let ids = query_ids(
            &conn,
            "SELECT t.id FROM texts t
             WHERE EXISTS (
                 SELECT 1 FROM text_authors ta JOIN authors a ON a.id = ta.author_id
                 WHERE ta.text_id = t.id AND a.name = ?1
             )
             ORDER BY t.rowid LIMIT ?2",
            params![author, sql_limit(limit)],
        )?;
        Ok(load_texts(&conn, ids)?)
    }

    async fn texts_with_venue_containing(
        &self,
        fragment: &str,
        limit: usize,
    ) -> StorageResult<Vec<Text>> {
        let conn = self.conn.lock().await;
        // instr keeps the match literal and case-sensitive, unlike LIKE
        let ids = query_ids(
            &conn,
            "SELECT id FROM texts WHERE instr(venue_name, ?1) > 0 ORDER BY rowid LIMIT ?2",
            params![fragment, sql_limit(limit)],
        )?;
        Ok(load_texts(&conn, ids)?)
    }

    async fn texts_from_year(&self, year: i32, limit: usize) -> StorageResult<Vec<Text>> {
        let conn = self.conn.lock().await;
        let ids = query_ids(
            &conn,
            "SELECT id FROM texts WHERE year = ?1 ORDER BY rowid LIMIT ?2",
            params![year, sql_limit(limit)],
        )?;
        Ok(load_texts(&conn, ids)?)
    }

    async fn insert_author(&self, author: &AuthorInput) -> StorageResult<Author> {
        let mut conn = self.conn.lock().await;

        if let Some(id) = author.id {
            if author_exists(&conn, id)? {
                return Err(StorageError::DuplicateEntry(format!("Author {} already exists", id)));
            }
        }

        let tx = conn.transaction()?;
        let id = create_author(&tx, author)?;
        tx.commit()?;
        debug!("Inserted author {} ({})", id, author.name);

        load_author(&conn, id)?
            .ok_or_else(|| StorageError::Other(format!("Author {} vanished after insert", id)))
    }

    async fn get_author(&self, id: Uuid) -> StorageResult<Author> {
        let conn = self.conn.lock().await;
        load_author(&conn, id)?.ok_or_else(|| StorageError::NotFound(format!("Author {}", id)))
    }

    async fn list_authors(&self, skip: usize, limit: usize) -> StorageResult<Vec<Author>> {
        let conn = self.conn.lock().await;
        let ids = query_ids(
            &conn,
            "SELECT id FROM authors ORDER BY rowid LIMIT ?1 OFFSET ?2",
            params![sql_limit(limit), sql_limit(skip)],
        )?;
        let mut authors = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(author) = load_author(&conn, id)? {
                authors.push(author);
            }
        }
        Ok(authors)
    }

    async fn update_author(&self, id: Uuid, author: &AuthorInput) -> StorageResult<Author> {
        let mut conn = self.conn.lock().await;

        if !author_exists(&conn, id)? {
            return Err(StorageError::NotFound(format!("Author {}", id)));
        }

        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE authors SET name = ?1 WHERE id = ?2",
            params![author.name, id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM author_orgs WHERE author_id = ?1",
            params![id.to_string()],
        )?;
        link_orgs(&tx, id, &author.orgs)?;
        tx.commit()?;
        debug!("Updated author {}", id);

        load_author(&conn, id)?.ok_or_else(|| StorageError::NotFound(format!("Author {}", id)))
    }

    async fn delete_author(&self, id: Uuid) -> StorageResult<Author> {
        let conn = self.conn.lock().await;
        let author = load_author(&conn, id)?
            .ok_or_else(|| StorageError::NotFound(format!("Author {}", id)))?;
        conn.execute("DELETE FROM authors WHERE id = ?1", params![id.to_string()])?;
        debug!("Deleted author {}", id);
        Ok(author)
    }

    async fn insert_citation(&self, citation: &Citation) -> StorageResult<Citation> {
        let mut conn = self.conn.lock().await;

        if citation.text_id_from == citation.text_id_to {
            return Err(StorageError::InvalidInput("Text cannot cite itself".to_string()));
        }

        let from = citation.text_id_from.to_string();
        let to = citation.text_id_to.to_string();

        let existing = conn
            .query_row(
                "SELECT 1 FROM citations WHERE text_id_from = ?1 AND text_id_to = ?2",
                params![from, to],
                |_| Ok(()),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StorageError::DuplicateEntry(
                "This citation already exists".to_string(),
            ));
        }

        if !text_exists(&conn, citation.text_id_to)? {
            return Err(StorageError::InvalidInput("Quoted text does not exist".to_string()));
        }
        if !text_exists(&conn, citation.text_id_from)? {
            return Err(StorageError::InvalidInput("Quoting text does not exist".to_string()));
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO citations (text_id_from, text_id_to) VALUES (?1, ?2)",
            params![from, to],
        )?;
        tx.execute(
            "UPDATE texts SET n_citation = n_citation + 1 WHERE id = ?1",
            params![to],
        )?;
        tx.commit()?;
        debug!("Recorded citation {} -> {}", from, to);

        Ok(*citation)
    }

    async fn insert_user(&self, user: &User) -> StorageResult<User> {
        let conn = self.conn.lock().await;

        if load_user(&conn, "login", &user.login)?.is_some() {
            return Err(StorageError::DuplicateEntry(format!(
                "User with login '{}' already exists",
                user.login
            )));
        }

        conn.execute(
            "INSERT INTO users (id, login, password_hash, email, author_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.login,
                user.password_hash,
                user.email,
                user.author_id.map(|id| id.to_string()),
            ],
        )?;
        debug!("Inserted user {}", user.login);

        Ok(user.clone())
    }

    async fn get_user_by_login(&self, login: &str) -> StorageResult<Option<User>> {
        let conn = self.conn.lock().await;
        Ok(load_user(&conn, "login", login)?)
    }

    async fn get_user_by_id(&self, id: Uuid) -> StorageResult<Option<User>> {
        let conn = self.conn.lock().await;
        Ok(load_user(&conn, "id", &id.to_string())?)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StorageResult<User> {
        let conn = self.conn.lock().await;
        let updated = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id.to_string()],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("User {}", id)));
        }
        load_user(&conn, "id", &id.to_string())?
            .ok_or_else(|| StorageError::NotFound(format!("User {}", id)))
    }

    async fn authorship(&self, limit: Option<usize>) -> StorageResult<Vec<Authorship>> {
        let conn = self.conn.lock().await;
        // LIMIT -1 means no limit in SQLite
        let limit = limit.map_or(-1, sql_limit);

        let rows: Vec<(Uuid, Option<i32>)> = {
            let mut stmt = conn.prepare("SELECT id, year FROM texts ORDER BY rowid LIMIT ?1")?;
            let mapped = stmt.query_map(params![limit], |row| {
                Ok((parse_uuid(0, row.get(0)?)?, row.get(1)?))
            })?;
            mapped.collect::<rusqlite::Result<_>>()?
        };

        let mut records = Vec::with_capacity(rows.len());
        for (text_id, year) in rows {
            let author_ids = query_ids(
                &conn,
                "SELECT author_id FROM text_authors WHERE text_id = ?1 ORDER BY position",
                params![text_id.to_string()],
            )?;
            records.push(Authorship {
                text_id,
                year,
                author_ids,
            });
        }
        Ok(records)
    }
}
