//! Database Migrations
//!
//! Versioned, ordered schema steps recorded in `_migrations`. Older deployments
//! patched columns in by hand, so column additions look before they leap and
//! every step can be re-run against a database that already has its effect.
//!
//! Databases written by the first bot release have no ledger and use the old
//! column names (`report_type`, `guild_id`, `source_channel_id`,
//! `staff_message_id`) and a `bot_settings` table. v1 renames those columns in
//! place and v6 copies the old settings, so existing reports and toggles carry
//! over.

use sqlx::sqlite::SqlitePool;
use sqlx::{Row, Sqlite, Transaction};
use tracing::info;

use crate::StorageError;

enum Step {
    Sql(&'static str),
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
    /// Applied only when `from` exists and `to` does not
    RenameColumn {
        table: &'static str,
        from: &'static str,
        to: &'static str,
    },
    /// Runs `sql` only when `table` exists
    IfTableExists {
        table: &'static str,
        sql: &'static str,
    },
}

struct Migration {
    version: i64,
    name: &'static str,
    steps: &'static [Step],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "reports",
        steps: &[
            Step::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS reports (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind TEXT NOT NULL,
                    reporter_id INTEGER NOT NULL,
                    community_id INTEGER NOT NULL,
                    source_location_id INTEGER NOT NULL,
                    staff_message_ref INTEGER,
                    status TEXT NOT NULL,
                    payload_json TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
            ),
            Step::RenameColumn { table: "reports", from: "report_type", to: "kind" },
            Step::RenameColumn { table: "reports", from: "guild_id", to: "community_id" },
            Step::RenameColumn { table: "reports", from: "source_channel_id", to: "source_location_id" },
            Step::RenameColumn { table: "reports", from: "staff_message_id", to: "staff_message_ref" },
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_reports_community ON reports(community_id, status)"),
        ],
    },
    Migration {
        version: 2,
        name: "staff_message_lookup",
        steps: &[Step::Sql(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_staff_message \
             ON reports(staff_message_ref) WHERE staff_message_ref IS NOT NULL",
        )],
    },
    Migration {
        version: 3,
        name: "ticket_channel",
        steps: &[Step::AddColumn { table: "reports", column: "ticket_channel_ref", definition: "INTEGER" }],
    },
    Migration {
        version: 4,
        name: "claim_audit",
        steps: &[
            Step::AddColumn { table: "reports", column: "claimed_by", definition: "INTEGER" },
            Step::AddColumn { table: "reports", column: "claimed_at", definition: "TEXT" },
        ],
    },
    Migration {
        version: 5,
        name: "resolution_audit",
        steps: &[
            Step::AddColumn { table: "reports", column: "resolved_by", definition: "INTEGER" },
            Step::AddColumn { table: "reports", column: "resolved_at", definition: "TEXT" },
            Step::AddColumn { table: "reports", column: "resolution_note", definition: "TEXT" },
        ],
    },
    Migration {
        version: 6,
        name: "settings",
        steps: &[
            Step::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                )
                "#,
            ),
            Step::IfTableExists {
                table: "bot_settings",
                sql: "INSERT OR REPLACE INTO settings (key, value) SELECT key, value FROM bot_settings",
            },
            Step::Sql("INSERT OR IGNORE INTO settings (key, value) VALUES ('report_pings_enabled', '1')"),
        ],
    },
    Migration {
        version: 7,
        name: "blocks",
        steps: &[Step::Sql(
            r#"
            CREATE TABLE IF NOT EXISTS blocks (
                community_id INTEGER NOT NULL,
                member_id INTEGER NOT NULL,
                permanent INTEGER NOT NULL DEFAULT 0,
                expires_at TEXT,
                reason TEXT NOT NULL DEFAULT '',
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (community_id, member_id)
            )
            "#,
        )],
    },
    Migration {
        version: 8,
        name: "liveboards",
        steps: &[Step::Sql(
            r#"
            CREATE TABLE IF NOT EXISTS liveboards (
                community_id INTEGER PRIMARY KEY,
                channel_ref INTEGER NOT NULL,
                message_ref INTEGER NOT NULL
            )
            "#,
        )],
    },
    Migration {
        version: 9,
        name: "normalize_legacy_statuses",
        steps: &[
            Step::Sql("UPDATE reports SET status = 'Resolved' WHERE status IN ('Fixed', 'Can''t replicate')"),
            Step::Sql("UPDATE reports SET status = 'Open' WHERE status = 'More info required'"),
        ],
    },
];

/// Highest version this build knows about.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Run all pending migrations. Returns how many were applied.
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize, StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|source| StorageError::Migration { version: 0, name: "bootstrap", source })?;

    let current_version = current_version(pool).await?;
    info!(current_version, target_version = latest_version(), "Checking database migrations");

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!("Applying migration v{}: {}", migration.version, migration.name);
        apply(pool, migration)
            .await
            .map_err(|source| StorageError::Migration { version: migration.version, name: migration.name, source })?;
        applied += 1;
    }

    if applied > 0 {
        info!(applied, "Database migrations completed successfully");
    }
    Ok(applied)
}

/// Get the current schema version
pub async fn current_version(pool: &SqlitePool) -> Result<i64, StorageError> {
    let row = sqlx::query("SELECT MAX(version) AS version FROM _migrations")
        .fetch_one(pool)
        .await
        .map_err(|source| StorageError::Migration { version: 0, name: "bootstrap", source })?;

    Ok(row.try_get::<Option<i64>, _>("version").ok().flatten().unwrap_or(0))
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for step in migration.steps {
        match step {
            Step::Sql(sql) => {
                sqlx::query(sql).execute(&mut *tx).await?;
            }
            Step::AddColumn { table, column, definition } => {
                if column_exists(&mut tx, table, column).await? {
                    continue;
                }
                let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
                sqlx::query(&sql).execute(&mut *tx).await?;
            }
            Step::RenameColumn { table, from, to } => {
                if !column_exists(&mut tx, table, from).await? || column_exists(&mut tx, table, to).await? {
                    continue;
                }
                info!(table, from, to, "adopting legacy column");
                let sql = format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to}");
                sqlx::query(&sql).execute(&mut *tx).await?;
            }
            Step::IfTableExists { table, sql } => {
                if table_exists(&mut tx, table).await? {
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
            }
        }
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

async fn column_exists(tx: &mut Transaction<'_, Sqlite>, table: &str, column: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
        .bind(table)
        .bind(column)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count > 0)
}

async fn table_exists(tx: &mut Transaction<'_, Sqlite>, table: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(table)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count > 0)
}
