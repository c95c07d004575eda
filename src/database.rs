use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use mobc::{Manager, Pool};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde::Serialize;
use tracing::{debug, info};

use crate::ingest::field_compare::FieldUpdates;
use crate::models::{
    FinalStatus, InProcessStatus, NegotiationStatus, PublisherIdentity, Result, SiteFields,
    TaskStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteTable {
    InProcess,
    Final,
}

impl SiteTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            SiteTable::InProcess => "data_in_process",
            SiteTable::Final => "data_final",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InProcessRecord {
    pub id: i64,
    pub website_url: String,
    #[serde(flatten)]
    pub fields: SiteFields,
    pub publisher_id: Option<String>,
    pub publisher_matched: bool,
    pub status: InProcessStatus,
    pub upload_task_id: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InProcessRecord {
    pub fn identity(&self) -> PublisherIdentity {
        PublisherIdentity::from_columns(
            self.publisher_id.clone(),
            self.publisher_matched,
            self.fields.publisher_name.clone(),
            self.fields.publisher_email.clone(),
            self.fields.contact_name.clone(),
            self.fields.contact_email.clone(),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalRecord {
    pub id: i64,
    pub website_url: String,
    #[serde(flatten)]
    pub fields: SiteFields,
    pub publisher_id: Option<String>,
    pub publisher_matched: bool,
    pub status: FinalStatus,
    pub negotiation_status: NegotiationStatus,
    pub main_project_id: Option<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub pushed_by: Option<String>,
    pub upload_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FinalRecord {
    pub fn identity(&self) -> PublisherIdentity {
        PublisherIdentity::from_columns(
            self.publisher_id.clone(),
            self.publisher_matched,
            self.fields.publisher_name.clone(),
            self.fields.publisher_email.clone(),
            self.fields.contact_name.clone(),
            self.fields.contact_email.clone(),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadTask {
    pub id: String,
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub total_records: i64,
    pub valid_records: i64,
    pub invalid_records: i64,
    pub processed_records: i64,
    pub duplicate_records: i64,
    pub pushed_records: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A locally-minted publisher identity shared by every record that carries
/// the same unconfirmed email.
#[derive(Debug, Clone)]
pub struct PendingIdentity {
    pub local_id: String,
    pub name: Option<String>,
    pub email: String,
}

pub struct SqliteManager {
    db_path: String,
}

impl SqliteManager {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }
}

#[async_trait::async_trait]
impl Manager for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        debug!("🔌 opening database: {}", self.db_path);
        let conn = Connection::open(&self.db_path)?;

        // Some PRAGMAs return a result row, so query_row is the safe shape
        // for all of them.
        for pragma in [
            "PRAGMA journal_mode=WAL",
            "PRAGMA synchronous=NORMAL",
            "PRAGMA foreign_keys=ON",
            "PRAGMA temp_store=memory",
        ] {
            match conn.execute(pragma, []) {
                Ok(_) => {}
                Err(rusqlite::Error::ExecuteReturnedResults) => {
                    conn.query_row(pragma, [], |_| Ok(()))?;
                }
                Err(e) => return Err(e),
            }
        }

        init_database(&conn)?;
        Ok(conn)
    }

    async fn check(&self, conn: Self::Connection) -> std::result::Result<Self::Connection, Self::Error> {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(conn)
    }
}

pub type DbPool = Pool<SqliteManager>;

pub async fn create_db_pool(db_path: &str) -> Result<DbPool> {
    if let Some(parent) = Path::new(db_path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let manager = SqliteManager::new(db_path.to_string());
    let pool = Pool::builder().max_open(10).max_idle(5).build(manager);

    info!("✓ SQLite connection pool created: {}", db_path);
    Ok(pool)
}

fn init_database(conn: &Connection) -> SqliteResult<()> {
    create_in_process_table(conn)?;
    create_final_table(conn)?;
    create_upload_tasks_table(conn)?;
    create_indexes(conn)?;
    Ok(())
}

const SITE_COLUMNS: &str = r#"
    category TEXT,
    country TEXT,
    language TEXT,
    da TEXT,
    dr TEXT,
    traffic TEXT,
    spam_score TEXT,
    keyword_count TEXT,
    tat TEXT,
    gb_base_price REAL,
    publisher_id TEXT,
    publisher_matched INTEGER NOT NULL DEFAULT 0,
    publisher_name TEXT,
    publisher_email TEXT,
    contact_name TEXT,
    contact_email TEXT
"#;

fn create_in_process_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        &format!(
            r#"
            CREATE TABLE IF NOT EXISTS data_in_process (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                website_url TEXT NOT NULL,
                {SITE_COLUMNS},
                status TEXT NOT NULL DEFAULT 'PENDING',
                upload_task_id TEXT,
                uploaded_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#
        ),
        [],
    )?;
    Ok(())
}

fn create_final_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        &format!(
            r#"
            CREATE TABLE IF NOT EXISTS data_final (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                website_url TEXT NOT NULL,
                {SITE_COLUMNS},
                status TEXT NOT NULL DEFAULT 'ACTIVE',
                negotiation_status TEXT NOT NULL DEFAULT 'IN_PROGRESS',
                main_project_id TEXT,
                pushed_at TEXT,
                pushed_by TEXT,
                upload_task_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#
        ),
        [],
    )?;
    Ok(())
}

fn create_upload_tasks_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS upload_tasks (
            id TEXT PRIMARY KEY,
            assigned_to TEXT,
            status TEXT NOT NULL DEFAULT 'PENDING',
            total_records INTEGER NOT NULL DEFAULT 0,
            valid_records INTEGER NOT NULL DEFAULT 0,
            invalid_records INTEGER NOT NULL DEFAULT 0,
            processed_records INTEGER NOT NULL DEFAULT 0,
            duplicate_records INTEGER NOT NULL DEFAULT 0,
            pushed_records INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        [],
    )?;
    Ok(())
}

fn create_indexes(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_in_process_url ON data_in_process(website_url)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_in_process_task ON data_in_process(upload_task_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_final_url ON data_final(website_url)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_final_pushed ON data_final(main_project_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_in_process_pub_email ON data_in_process(publisher_email)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_final_pub_email ON data_final(publisher_email)",
        [],
    )?;
    Ok(())
}

const IN_PROCESS_SELECT: &str = r#"
    SELECT id, website_url, category, country, language, da, dr, traffic,
           spam_score, keyword_count, tat, gb_base_price, publisher_id,
           publisher_matched, publisher_name, publisher_email, contact_name,
           contact_email, status, upload_task_id, uploaded_by, created_at,
           updated_at
    FROM data_in_process
"#;

const FINAL_SELECT: &str = r#"
    SELECT id, website_url, category, country, language, da, dr, traffic,
           spam_score, keyword_count, tat, gb_base_price, publisher_id,
           publisher_matched, publisher_name, publisher_email, contact_name,
           contact_email, status, negotiation_status, main_project_id,
           pushed_at, pushed_by, upload_task_id, created_at, updated_at
    FROM data_final
"#;

fn site_fields_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<SiteFields> {
    Ok(SiteFields {
        category: row.get(2)?,
        country: row.get(3)?,
        language: row.get(4)?,
        da: row.get(5)?,
        dr: row.get(6)?,
        traffic: row.get(7)?,
        spam_score: row.get(8)?,
        keyword_count: row.get(9)?,
        tat: row.get(10)?,
        gb_base_price: row.get(11)?,
        publisher_name: row.get(14)?,
        publisher_email: row.get(15)?,
        contact_name: row.get(16)?,
        contact_email: row.get(17)?,
    })
}

fn bad_status(idx: usize, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unrecognized status '{}'", value).into(),
    )
}

fn in_process_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<InProcessRecord> {
    let status_raw: String = row.get(18)?;
    Ok(InProcessRecord {
        id: row.get(0)?,
        website_url: row.get(1)?,
        fields: site_fields_from_row(row)?,
        publisher_id: row.get(12)?,
        publisher_matched: row.get(13)?,
        status: InProcessStatus::parse(&status_raw).ok_or_else(|| bad_status(18, status_raw))?,
        upload_task_id: row.get(19)?,
        uploaded_by: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}

fn final_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<FinalRecord> {
    let status_raw: String = row.get(18)?;
    let negotiation_raw: String = row.get(19)?;
    Ok(FinalRecord {
        id: row.get(0)?,
        website_url: row.get(1)?,
        fields: site_fields_from_row(row)?,
        publisher_id: row.get(12)?,
        publisher_matched: row.get(13)?,
        status: FinalStatus::parse(&status_raw).ok_or_else(|| bad_status(18, status_raw))?,
        negotiation_status: NegotiationStatus::parse(&negotiation_raw)
            .ok_or_else(|| bad_status(19, negotiation_raw))?,
        main_project_id: row.get(20)?,
        pushed_at: row.get(21)?,
        pushed_by: row.get(22)?,
        upload_task_id: row.get(23)?,
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> SqliteResult<UploadTask> {
    let status_raw: String = row.get(2)?;
    Ok(UploadTask {
        id: row.get(0)?,
        assigned_to: row.get(1)?,
        status: TaskStatus::parse(&status_raw).ok_or_else(|| bad_status(2, status_raw))?,
        total_records: row.get(3)?,
        valid_records: row.get(4)?,
        invalid_records: row.get(5)?,
        processed_records: row.get(6)?,
        duplicate_records: row.get(7)?,
        pushed_records: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub async fn fetch_in_process_urls(pool: &DbPool) -> Result<HashSet<String>> {
    fetch_url_set(pool, "SELECT website_url FROM data_in_process").await
}

pub async fn fetch_final_urls(pool: &DbPool) -> Result<HashSet<String>> {
    fetch_url_set(pool, "SELECT website_url FROM data_final").await
}

async fn fetch_url_set(pool: &DbPool, sql: &str) -> Result<HashSet<String>> {
    let conn = pool.get().await?;
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut urls = HashSet::new();
    for url in rows {
        urls.insert(url?);
    }
    Ok(urls)
}

pub async fn get_in_process_by_url(pool: &DbPool, url: &str) -> Result<Option<InProcessRecord>> {
    let conn = pool.get().await?;
    let record = conn
        .query_row(
            &format!("{} WHERE website_url = ?1 LIMIT 1", IN_PROCESS_SELECT),
            params![url],
            in_process_from_row,
        )
        .optional()?;
    Ok(record)
}

pub async fn get_final_by_url(pool: &DbPool, url: &str) -> Result<Option<FinalRecord>> {
    let conn = pool.get().await?;
    let record = conn
        .query_row(
            &format!("{} WHERE website_url = ?1 LIMIT 1", FINAL_SELECT),
            params![url],
            final_from_row,
        )
        .optional()?;
    Ok(record)
}

pub async fn get_in_process_by_id(pool: &DbPool, id: i64) -> Result<Option<InProcessRecord>> {
    let conn = pool.get().await?;
    let record = conn
        .query_row(
            &format!("{} WHERE id = ?1", IN_PROCESS_SELECT),
            params![id],
            in_process_from_row,
        )
        .optional()?;
    Ok(record)
}

pub async fn get_final_by_id(pool: &DbPool, id: i64) -> Result<Option<FinalRecord>> {
    let conn = pool.get().await?;
    let record = conn
        .query_row(
            &format!("{} WHERE id = ?1", FINAL_SELECT),
            params![id],
            final_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Insert one reviewed-candidate row. The identity decides the six
/// publisher/contact columns; enrichment comes from `fields`.
pub async fn insert_in_process(
    pool: &DbPool,
    website_url: &str,
    fields: &SiteFields,
    identity: &PublisherIdentity,
    upload_task_id: Option<&str>,
    uploaded_by: Option<&str>,
) -> Result<i64> {
    let conn = pool.get().await?;
    let (publisher_id, matched, publisher_name, publisher_email, contact_name, contact_email) =
        identity.to_columns();
    let now = Utc::now();

    conn.execute(
        r#"
        INSERT INTO data_in_process (
            website_url, category, country, language, da, dr, traffic,
            spam_score, keyword_count, tat, gb_base_price, publisher_id,
            publisher_matched, publisher_name, publisher_email, contact_name,
            contact_email, status, upload_task_id, uploaded_by, created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                  ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
        "#,
        params![
            website_url,
            fields.category,
            fields.country,
            fields.language,
            fields.da,
            fields.dr,
            fields.traffic,
            fields.spam_score,
            fields.keyword_count,
            fields.tat,
            fields.gb_base_price,
            publisher_id,
            matched,
            publisher_name,
            publisher_email,
            contact_name,
            contact_email,
            InProcessStatus::Pending.as_str(),
            upload_task_id,
            uploaded_by,
            now,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Patch exactly the columns in `updates`; everything else keeps its value.
pub async fn apply_field_updates(
    pool: &DbPool,
    table: SiteTable,
    id: i64,
    updates: &FieldUpdates,
    uploaded_by: Option<&str>,
) -> Result<()> {
    use crate::ingest::field_compare::FieldValue;

    let conn = pool.get().await?;

    let mut sets = Vec::new();
    let mut values: Vec<FieldValue> = Vec::new();
    for (column, value) in updates.entries() {
        values.push(value.clone());
        sets.push(format!("{} = ?{}", column, values.len()));
    }
    if let Some(user) = uploaded_by {
        values.push(FieldValue::Text(user.to_string()));
        sets.push(format!("uploaded_by = ?{}", values.len()));
    }
    values.push(FieldValue::Text(Utc::now().to_rfc3339()));
    sets.push(format!("updated_at = ?{}", values.len()));
    values.push(FieldValue::Integer(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table.table_name(),
        sets.join(", "),
        values.len()
    );
    conn.execute(&sql, rusqlite::params_from_iter(values))?;
    debug!("patched {} #{}: {:?}", table.table_name(), id, updates.columns());
    Ok(())
}

pub async fn create_upload_task(pool: &DbPool, task: &UploadTask) -> Result<()> {
    let conn = pool.get().await?;
    conn.execute(
        r#"
        INSERT INTO upload_tasks (
            id, assigned_to, status, total_records, valid_records,
            invalid_records, processed_records, duplicate_records,
            pushed_records, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            task.id,
            task.assigned_to,
            task.status.as_str(),
            task.total_records,
            task.valid_records,
            task.invalid_records,
            task.processed_records,
            task.duplicate_records,
            task.pushed_records,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

pub async fn get_upload_task(pool: &DbPool, id: &str) -> Result<Option<UploadTask>> {
    let conn = pool.get().await?;
    let task = conn
        .query_row(
            r#"
            SELECT id, assigned_to, status, total_records, valid_records,
                   invalid_records, processed_records, duplicate_records,
                   pushed_records, created_at, updated_at
            FROM upload_tasks WHERE id = ?1
            "#,
            params![id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

/// A task is COMPLETED exactly when none of its in-process rows remain.
async fn settle_task_status(pool: &DbPool, task_id: &str) -> Result<()> {
    let conn = pool.get().await?;
    let remaining: i64 = conn.query_row(
        "SELECT COUNT(*) FROM data_in_process WHERE upload_task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )?;
    if remaining == 0 {
        conn.execute(
            "UPDATE upload_tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![TaskStatus::Completed.as_str(), Utc::now(), task_id],
        )?;
        info!("✅ upload task {} drained, marked COMPLETED", task_id);
    }
    Ok(())
}

pub async fn update_in_process_status(
    pool: &DbPool,
    id: i64,
    status: InProcessStatus,
) -> Result<()> {
    let conn = pool.get().await?;
    conn.execute(
        "UPDATE data_in_process SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), Utc::now(), id],
    )?;
    Ok(())
}

/// REACHED promotion: copy the record into data_final, drop the in-process
/// row, and settle the owning task's status.
pub async fn promote_to_final(pool: &DbPool, record: &InProcessRecord) -> Result<i64> {
    let final_id = {
        let conn = pool.get().await?;
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO data_final (
                website_url, category, country, language, da, dr, traffic,
                spam_score, keyword_count, tat, gb_base_price, publisher_id,
                publisher_matched, publisher_name, publisher_email,
                contact_name, contact_email, status, negotiation_status,
                upload_task_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
            params![
                record.website_url,
                record.fields.category,
                record.fields.country,
                record.fields.language,
                record.fields.da,
                record.fields.dr,
                record.fields.traffic,
                record.fields.spam_score,
                record.fields.keyword_count,
                record.fields.tat,
                record.fields.gb_base_price,
                record.publisher_id,
                record.publisher_matched,
                record.fields.publisher_name,
                record.fields.publisher_email,
                record.fields.contact_name,
                record.fields.contact_email,
                FinalStatus::Active.as_str(),
                NegotiationStatus::InProgress.as_str(),
                record.upload_task_id,
                now,
                now,
            ],
        )?;
        let final_id = conn.last_insert_rowid();
        conn.execute(
            "DELETE FROM data_in_process WHERE id = ?1",
            params![record.id],
        )?;
        final_id
    };

    if let Some(task_id) = record.upload_task_id.as_deref() {
        settle_task_status(pool, task_id).await?;
    }
    info!(
        "⏫ promoted {} to data_final (#{})",
        record.website_url, final_id
    );
    Ok(final_id)
}

pub async fn delete_in_process(pool: &DbPool, record: &InProcessRecord) -> Result<()> {
    {
        let conn = pool.get().await?;
        conn.execute(
            "DELETE FROM data_in_process WHERE id = ?1",
            params![record.id],
        )?;
    }
    if let Some(task_id) = record.upload_task_id.as_deref() {
        settle_task_status(pool, task_id).await?;
    }
    Ok(())
}

pub async fn list_in_process(
    pool: &DbPool,
    limit: usize,
    offset: usize,
) -> Result<Vec<InProcessRecord>> {
    let conn = pool.get().await?;
    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        IN_PROCESS_SELECT
    ))?;
    let rows = stmt.query_map(params![limit as i64, offset as i64], in_process_from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

pub async fn list_final(pool: &DbPool, limit: usize, offset: usize) -> Result<Vec<FinalRecord>> {
    let conn = pool.get().await?;
    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        FINAL_SELECT
    ))?;
    let rows = stmt.query_map(params![limit as i64, offset as i64], final_from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Unpushed final records, optionally narrowed to explicit ids. Pushed and
/// unpushed rows share the table; `main_project_id IS NULL` is the filter.
pub async fn fetch_final_unpushed(pool: &DbPool, ids: Option<&[i64]>) -> Result<Vec<FinalRecord>> {
    let conn = pool.get().await?;
    let mut records = Vec::new();

    match ids {
        Some(ids) if !ids.is_empty() => {
            let placeholders: Vec<String> =
                (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "{} WHERE main_project_id IS NULL AND id IN ({}) ORDER BY id",
                FINAL_SELECT,
                placeholders.join(", ")
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(ids.iter().copied()),
                final_from_row,
            )?;
            for row in rows {
                records.push(row?);
            }
        }
        _ => {
            let sql = format!(
                "{} WHERE main_project_id IS NULL ORDER BY id",
                FINAL_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], final_from_row)?;
            for row in rows {
                records.push(row?);
            }
        }
    }
    Ok(records)
}

/// Stamp the remote-assigned id onto the matching unpushed row. Matched by
/// normalized URL because remote responses don't preserve request order.
pub async fn mark_final_pushed(
    pool: &DbPool,
    website_url: &str,
    main_project_id: &str,
    pushed_by: &str,
) -> Result<bool> {
    let task_id: Option<String> = {
        let conn = pool.get().await?;
        conn.query_row(
            "SELECT upload_task_id FROM data_final WHERE website_url = ?1 AND main_project_id IS NULL LIMIT 1",
            params![website_url],
            |row| row.get(0),
        )
        .optional()?
        .flatten()
    };

    let updated = {
        let conn = pool.get().await?;
        conn.execute(
            r#"
            UPDATE data_final
            SET main_project_id = ?1, pushed_at = ?2, pushed_by = ?3, updated_at = ?2
            WHERE website_url = ?4 AND main_project_id IS NULL
            "#,
            params![main_project_id, Utc::now(), pushed_by, website_url],
        )?
    };

    if updated > 0 {
        if let Some(task_id) = task_id {
            let conn = pool.get().await?;
            conn.execute(
                "UPDATE upload_tasks SET pushed_records = pushed_records + ?1, updated_at = ?2 WHERE id = ?3",
                params![updated as i64, Utc::now(), task_id],
            )?;
        }
    }
    Ok(updated > 0)
}

/// Finds an existing locally-minted identity for this email, if any record
/// (in either table) already carries one. Keeps one real-world contact from
/// fragmenting into several disconnected pending stubs.
pub async fn find_pending_identity_by_email(
    pool: &DbPool,
    email: &str,
) -> Result<Option<PendingIdentity>> {
    let conn = pool.get().await?;
    for table in ["data_in_process", "data_final"] {
        let found = conn
            .query_row(
                &format!(
                    r#"
                    SELECT publisher_id, publisher_name, publisher_email
                    FROM {}
                    WHERE publisher_matched = 0 AND publisher_id IS NOT NULL
                      AND LOWER(publisher_email) = LOWER(?1)
                    LIMIT 1
                    "#,
                    table
                ),
                params![email],
                |row| {
                    Ok(PendingIdentity {
                        local_id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get::<_, String>(2)?,
                    })
                },
            )
            .optional()?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// All pending identities up front, for batch resolution during an upload.
pub async fn fetch_pending_identities(
    pool: &DbPool,
) -> Result<std::collections::HashMap<String, PendingIdentity>> {
    let conn = pool.get().await?;
    let mut by_email = std::collections::HashMap::new();
    for table in ["data_in_process", "data_final"] {
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT publisher_id, publisher_name, publisher_email
            FROM {}
            WHERE publisher_matched = 0 AND publisher_id IS NOT NULL
              AND publisher_email IS NOT NULL
            "#,
            table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(PendingIdentity {
                local_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get::<_, String>(2)?,
            })
        })?;
        for row in rows {
            let identity = row?;
            by_email
                .entry(identity.email.to_lowercase())
                .or_insert(identity);
        }
    }
    Ok(by_email)
}

/// Distinct emails on records whose identity is still unconfirmed: pending
/// publishers and raw contacts alike.
pub async fn fetch_unresolved_emails(pool: &DbPool) -> Result<Vec<String>> {
    let conn = pool.get().await?;
    let mut emails = HashSet::new();
    for table in ["data_in_process", "data_final"] {
        for column in ["publisher_email", "contact_email"] {
            let mut stmt = conn.prepare(&format!(
                "SELECT DISTINCT LOWER({col}) FROM {table} WHERE publisher_matched = 0 AND {col} IS NOT NULL",
                col = column,
                table = table,
            ))?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for row in rows {
                emails.insert(row?);
            }
        }
    }
    Ok(emails.into_iter().collect())
}

/// Upgrade every unconfirmed record carrying `email` (in both tables) to the
/// canonical remote identity, clearing stale contact fields. Idempotent: a
/// second run matches zero rows.
pub async fn upgrade_publisher_identity(
    pool: &DbPool,
    email: &str,
    canonical_id: &str,
    canonical_name: Option<&str>,
) -> Result<usize> {
    let conn = pool.get().await?;
    let mut total = 0usize;
    for table in ["data_in_process", "data_final"] {
        total += conn.execute(
            &format!(
                r#"
                UPDATE {}
                SET publisher_id = ?1,
                    publisher_matched = 1,
                    publisher_name = ?2,
                    publisher_email = LOWER(?3),
                    contact_name = NULL,
                    contact_email = NULL,
                    updated_at = ?4
                WHERE publisher_matched = 0
                  AND (LOWER(publisher_email) = LOWER(?3) OR LOWER(contact_email) = LOWER(?3))
                "#,
                table
            ),
            params![canonical_id, canonical_name, email, Utc::now()],
        )?;
    }
    Ok(total)
}


#[cfg(test)]
mod tests {
    use super::testing::test_pool;
    use super::*;
    use crate::models::PublisherIdentity;

    async fn seed_task(pool: &DbPool, id: &str) {
        create_upload_task(
            pool,
            &UploadTask {
                id: id.to_string(),
                assigned_to: None,
                status: TaskStatus::Pending,
                total_records: 2,
                valid_records: 2,
                invalid_records: 0,
                processed_records: 2,
                duplicate_records: 0,
                pushed_records: 0,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn task_completes_exactly_when_its_rows_drain() {
        let pool = test_pool().await;
        seed_task(&pool, "task-1").await;

        let fields = SiteFields {
            gb_base_price: Some(10.0),
            ..Default::default()
        };
        let first = insert_in_process(
            &pool,
            "a.com",
            &fields,
            &PublisherIdentity::Unknown,
            Some("task-1"),
            None,
        )
        .await
        .unwrap();
        let second = insert_in_process(
            &pool,
            "b.com",
            &fields,
            &PublisherIdentity::Unknown,
            Some("task-1"),
            None,
        )
        .await
        .unwrap();

        // One promoted: a row remains, task stays open.
        let record = get_in_process_by_id(&pool, first).await.unwrap().unwrap();
        promote_to_final(&pool, &record).await.unwrap();
        let task = get_upload_task(&pool, "task-1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        // Last one deleted: zero rows left, task flips to COMPLETED.
        let record = get_in_process_by_id(&pool, second).await.unwrap().unwrap();
        delete_in_process(&pool, &record).await.unwrap();
        let task = get_upload_task(&pool, "task-1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn promotion_carries_fields_and_identity_across() {
        let pool = test_pool().await;
        let id = insert_in_process(
            &pool,
            "site.com",
            &SiteFields {
                da: Some("42".to_string()),
                gb_base_price: Some(75.0),
                ..Default::default()
            },
            &PublisherIdentity::Contact {
                name: Some("Jane".to_string()),
                email: Some("jane@pub.io".to_string()),
            },
            None,
            None,
        )
        .await
        .unwrap();

        let record = get_in_process_by_id(&pool, id).await.unwrap().unwrap();
        promote_to_final(&pool, &record).await.unwrap();

        assert!(get_in_process_by_url(&pool, "site.com")
            .await
            .unwrap()
            .is_none());
        let promoted = get_final_by_url(&pool, "site.com").await.unwrap().unwrap();
        assert_eq!(promoted.fields.da.as_deref(), Some("42"));
        assert_eq!(promoted.fields.gb_base_price, Some(75.0));
        assert_eq!(promoted.status, FinalStatus::Active);
        assert_eq!(promoted.negotiation_status, NegotiationStatus::InProgress);
        assert_eq!(
            promoted.identity(),
            PublisherIdentity::Contact {
                name: Some("Jane".to_string()),
                email: Some("jane@pub.io".to_string()),
            }
        );
        assert!(promoted.main_project_id.is_none());
    }

    #[tokio::test]
    async fn pushed_marker_only_lands_on_unpushed_rows() {
        let pool = test_pool().await;
        let id = insert_in_process(
            &pool,
            "site.com",
            &SiteFields {
                gb_base_price: Some(10.0),
                ..Default::default()
            },
            &PublisherIdentity::Unknown,
            None,
            None,
        )
        .await
        .unwrap();
        let record = get_in_process_by_id(&pool, id).await.unwrap().unwrap();
        promote_to_final(&pool, &record).await.unwrap();

        assert!(mark_final_pushed(&pool, "site.com", "mp_9", "admin")
            .await
            .unwrap());
        // Already pushed: a second stamp matches nothing.
        assert!(!mark_final_pushed(&pool, "site.com", "mp_10", "admin")
            .await
            .unwrap());

        let record = get_final_by_url(&pool, "site.com").await.unwrap().unwrap();
        assert_eq!(record.main_project_id.as_deref(), Some("mp_9"));

        // Unpushed listing no longer includes it.
        assert!(fetch_final_unpushed(&pool, None).await.unwrap().is_empty());
    }
}

/// The "mark as publisher" action: a contact-only record gets a pending
/// identity immediately, without waiting for the remote directory.
pub async fn mark_record_as_publisher(
    pool: &DbPool,
    table: SiteTable,
    id: i64,
    local_id: &str,
    name: Option<&str>,
    email: &str,
) -> Result<()> {
    let conn = pool.get().await?;
    conn.execute(
        &format!(
            r#"
            UPDATE {}
            SET publisher_id = ?1,
                publisher_matched = 0,
                publisher_name = ?2,
                publisher_email = LOWER(?3),
                contact_name = NULL,
                contact_email = NULL,
                updated_at = ?4
            WHERE id = ?5
            "#,
            table.table_name()
        ),
        params![local_id, name, email, Utc::now(), id],
    )?;
    Ok(())
}
