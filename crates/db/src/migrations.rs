//! Forward-only schema migrations.
//!
//! The schema version lives in the single row of the `VERSION` table. A
//! database without that table is either brand new (created directly at
//! [`CURRENT_SCHEMA_VERSION`]) or the legacy v0 layout, which had one
//! denormalised `SavedItems` table. Before migrating a non-empty database a
//! copy is written to the backups directory with `VACUUM INTO`.

use std::path::{Path, PathBuf};

use aura_core::config::AppPaths;
use aura_core::library_cache::LibraryCache;
use aura_core::media::MediaItem;
use aura_core::poster::{PosterSet, SelectedTypes};
use aura_core::subscription::Subscription;
use aura_core::types::ItemKey;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::error::DbError;
use crate::repositories::subscription_repo::{upsert_item_in, upsert_subscription_in};

/// Increment when adding a migration.
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// What a migration run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    pub backup: Option<PathBuf>,
    /// Legacy rows carried into the new schema.
    pub converted: usize,
    /// Legacy rows that could not be carried over; also written to the
    /// warnings file.
    pub warnings: Vec<String>,
}

/// Inputs the migrations need beyond the pool.
pub struct MigrationContext<'a> {
    pub paths: &'a AppPaths,
    /// Used to resolve legacy rows that lack a TMDB id.
    pub cache: &'a LibraryCache,
}

// ---------------------------------------------------------------------------
// Version bookkeeping
// ---------------------------------------------------------------------------

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool, DbError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool, DbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Current schema version; 0 when the `VERSION` table is missing or empty.
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64, DbError> {
    if !table_exists(pool, "VERSION").await? {
        return Ok(0);
    }
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM VERSION")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Replace the singleton version row.
async fn set_schema_version(pool: &SqlitePool, version: i64) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("CREATE TABLE IF NOT EXISTS VERSION (version INTEGER NOT NULL)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM VERSION").execute(&mut *tx).await?;
    sqlx::query("INSERT INTO VERSION (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

async fn user_table_count(pool: &SqlitePool) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Write a consistent copy of the database into `dir`.
pub async fn backup_database(pool: &SqlitePool, dir: &Path, version: i64) -> Result<PathBuf, DbError> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let path = dir.join(format!("AURA_v{version}_{stamp}.db"));
    sqlx::query("VACUUM INTO ?")
        .bind(path.to_string_lossy().into_owned())
        .execute(pool)
        .await?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Bring the schema up to [`CURRENT_SCHEMA_VERSION`].
pub async fn run_migrations(
    pool: &SqlitePool,
    ctx: &MigrationContext<'_>,
) -> Result<MigrationReport, DbError> {
    let current = get_schema_version(pool).await?;
    let mut report = MigrationReport {
        from_version: current,
        to_version: current,
        ..Default::default()
    };

    if current == CURRENT_SCHEMA_VERSION {
        info!(version = current, "Database schema is up to date");
        return Ok(report);
    }
    if current > CURRENT_SCHEMA_VERSION {
        warn!(
            db_version = current,
            code_version = CURRENT_SCHEMA_VERSION,
            "Database schema is newer than this build; leaving it untouched",
        );
        return Ok(report);
    }

    if current == 0 && user_table_count(pool).await? == 0 {
        create_v1_tables(pool).await?;
        migrate_v2(pool).await?;
        set_schema_version(pool, CURRENT_SCHEMA_VERSION).await?;
        report.to_version = CURRENT_SCHEMA_VERSION;
        info!(version = CURRENT_SCHEMA_VERSION, "Created new database schema");
        return Ok(report);
    }

    let backup = backup_database(pool, &ctx.paths.backups(), current).await?;
    info!(backup = %backup.display(), "Database backed up before migration");
    report.backup = Some(backup);

    info!(from = current, to = CURRENT_SCHEMA_VERSION, "Running database migrations");

    if current < 1 {
        let (converted, warnings) = migrate_v1(pool, ctx.cache).await?;
        report.converted = converted;
        if !warnings.is_empty() {
            write_warnings(&ctx.paths.migration_warnings(1), &warnings)?;
        }
        report.warnings = warnings;
        set_schema_version(pool, 1).await?;
        report.to_version = 1;
        info!(converted, skipped = report.warnings.len(), "Migration v1 completed");
    }

    if current < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        report.to_version = 2;
        info!("Migration v2 completed");
    }

    Ok(report)
}

fn write_warnings(path: &Path, warnings: &[String]) -> Result<(), DbError> {
    let mut body = String::from(
        "The following saved items could not be migrated and were dropped:\n\n",
    );
    for line in warnings {
        body.push_str(line);
        body.push('\n');
    }
    std::fs::write(path, body)?;
    warn!(path = %path.display(), count = warnings.len(), "Some saved items were not migrated");
    Ok(())
}

// ---------------------------------------------------------------------------
// v1: normalised MediaItems / PosterSets / SavedItems
// ---------------------------------------------------------------------------

const V1_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS VERSION (version INTEGER NOT NULL)",
    "CREATE TABLE IF NOT EXISTS MediaItems (
        TMDB_ID TEXT NOT NULL,
        LibraryTitle TEXT NOT NULL,
        RatingKey TEXT,
        Type TEXT,
        Title TEXT,
        Year INTEGER,
        Thumb TEXT,
        ContentRating TEXT,
        Summary TEXT,
        UpdatedAt INTEGER,
        AddedAt INTEGER,
        ReleasedAt INTEGER,
        Guids_JSON TEXT,
        Movie_JSON TEXT,
        Series_JSON TEXT,
        Full_JSON TEXT,
        PRIMARY KEY (TMDB_ID, LibraryTitle)
    )",
    "CREATE TABLE IF NOT EXISTS PosterSets (
        PosterSetID TEXT NOT NULL,
        TMDB_ID TEXT NOT NULL,
        LibraryTitle TEXT NOT NULL,
        PosterSetUser TEXT,
        PosterSet_JSON TEXT,
        LastDownloaded TEXT,
        SelectedTypes TEXT,
        AutoDownload BOOLEAN NOT NULL DEFAULT 0,
        PRIMARY KEY (PosterSetID, TMDB_ID, LibraryTitle),
        FOREIGN KEY (TMDB_ID, LibraryTitle)
            REFERENCES MediaItems (TMDB_ID, LibraryTitle) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS SavedItems (
        TMDB_ID TEXT NOT NULL,
        LibraryTitle TEXT NOT NULL,
        PosterSetID TEXT NOT NULL,
        PRIMARY KEY (TMDB_ID, LibraryTitle, PosterSetID),
        FOREIGN KEY (TMDB_ID, LibraryTitle)
            REFERENCES MediaItems (TMDB_ID, LibraryTitle) ON DELETE CASCADE,
        FOREIGN KEY (PosterSetID, TMDB_ID, LibraryTitle)
            REFERENCES PosterSets (PosterSetID, TMDB_ID, LibraryTitle) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS idx_postersets_id ON PosterSets (PosterSetID)",
];

async fn create_v1_tables_in(conn: &mut SqliteConnection) -> Result<(), DbError> {
    for ddl in V1_TABLES {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    Ok(())
}

async fn create_v1_tables(pool: &SqlitePool) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;
    create_v1_tables_in(&mut conn).await
}

/// A row of the legacy v0 `SavedItems` table.
#[derive(Debug, FromRow)]
struct LegacyRow {
    media_item_id: String,
    media_item_json: Option<String>,
    poster_set_id: Option<String>,
    poster_set_json: Option<String>,
    last_downloaded: Option<String>,
    selected_types: Option<String>,
    auto_download: Option<bool>,
}

/// Convert the legacy layout. Returns converted row count and warnings.
async fn migrate_v1(
    pool: &SqlitePool,
    cache: &LibraryCache,
) -> Result<(usize, Vec<String>), DbError> {
    info!("Running migration v1: normalise saved items");

    if !table_exists(pool, "SavedItems").await?
        || !column_exists(pool, "SavedItems", "MediaItemID").await?
    {
        // Partial v0 without the legacy table: just create the schema.
        create_v1_tables(pool).await?;
        return Ok((0, Vec::new()));
    }

    let mut tx = pool.begin().await?;
    sqlx::query("ALTER TABLE SavedItems RENAME TO SavedItems_v0")
        .execute(&mut *tx)
        .await?;
    create_v1_tables_in(&mut tx).await?;
    // `Ignored` arrives in v2, but the shared upsert already writes it.
    sqlx::query("ALTER TABLE MediaItems ADD COLUMN Ignored INTEGER NOT NULL DEFAULT 0")
        .execute(&mut *tx)
        .await?;

    let rows: Vec<LegacyRow> = sqlx::query_as(
        "SELECT MediaItemID AS media_item_id, MediaItem AS media_item_json, \
                PosterSetID AS poster_set_id, PosterSet AS poster_set_json, \
                LastDownloaded AS last_downloaded, SelectedTypes AS selected_types, \
                AutoDownload AS auto_download \
         FROM SavedItems_v0 ORDER BY rowid",
    )
    .fetch_all(&mut *tx)
    .await?;

    let mut converted = 0;
    let mut warnings = Vec::new();
    for row in rows {
        let row_id = row.media_item_id.clone();
        match convert_legacy_row(row, cache).await {
            Ok((item, sub)) => {
                let key = ItemKey::new(item.tmdb_id.clone(), item.library_title.clone());
                upsert_item_in(&mut tx, &item, false).await?;
                upsert_subscription_in(&mut tx, &key, &sub).await?;
                converted += 1;
            }
            Err(reason) => warnings.push(format!("MediaItemID={row_id}: {reason}")),
        }
    }

    sqlx::query("DROP TABLE SavedItems_v0").execute(&mut *tx).await?;
    tx.commit().await?;
    Ok((converted, warnings))
}

/// Resolve one legacy row into the new model, or explain why it cannot be.
async fn convert_legacy_row(
    row: LegacyRow,
    cache: &LibraryCache,
) -> Result<(MediaItem, Subscription), String> {
    let item_json = row
        .media_item_json
        .filter(|s| !s.trim().is_empty())
        .ok_or("missing media item JSON")?;
    let mut item: MediaItem =
        serde_json::from_str(&item_json).map_err(|e| format!("unreadable media item JSON: {e}"))?;

    if item.library_title.trim().is_empty() {
        return Err(format!("'{}' ({}) has no library title", item.title, item.year));
    }

    if item.tmdb_id.trim().is_empty() {
        if let Some(tmdb) = item.tmdb_from_guids() {
            item.tmdb_id = tmdb.to_string();
        } else if let Some(cached) = cache
            .get_item_by_title_and_year(&item.library_title, &item.title, item.year)
            .await
        {
            item.tmdb_id = cached.tmdb_id;
        } else {
            return Err(format!(
                "could not resolve a TMDB id for '{}' ({}) in {}",
                item.title, item.year, item.library_title
            ));
        }
    }
    item.validate().map_err(|e| e.to_string())?;

    let set_id = row
        .poster_set_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("'{}' has no poster set id", item.title))?;
    let mut poster_set: PosterSet = match row.poster_set_json.filter(|s| !s.trim().is_empty()) {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| format!("unreadable poster set JSON for set {set_id}: {e}"))?,
        None => PosterSet::default(),
    };
    poster_set.id = set_id;

    let selected_types = SelectedTypes::from_csv(row.selected_types.as_deref().unwrap_or(""));
    if selected_types.is_empty() {
        return Err(format!(
            "'{}' set {} has no selected types",
            item.title, poster_set.id
        ));
    }

    Ok((
        item,
        Subscription {
            poster_set,
            selected_types,
            auto_download: row.auto_download.unwrap_or(false),
            last_downloaded: row.last_downloaded.unwrap_or_default(),
        },
    ))
}

// ---------------------------------------------------------------------------
// v2: explicit ignore flag on media items
// ---------------------------------------------------------------------------

async fn migrate_v2(pool: &SqlitePool) -> Result<(), DbError> {
    if !column_exists(pool, "MediaItems", "Ignored").await? {
        sqlx::query("ALTER TABLE MediaItems ADD COLUMN Ignored INTEGER NOT NULL DEFAULT 0")
            .execute(pool)
            .await?;
        info!("Migration v2: added Ignored to MediaItems");
    }
    Ok(())
}
