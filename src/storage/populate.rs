//! Backfill of stub rows into `users` from imported wiki tables.
//!
//! Every table that records an acting user carries the user id and name. Ids
//! that have no `users` row yet are inserted as stub accounts (no password),
//! which is what makes them eligible for first-login provisioning. Each batch
//! commits on its own so an interrupted run can simply be restarted.

use anyhow::{Context, Result, anyhow, bail};
use sqlx::{PgPool, Row};
use std::fmt;
use std::str::FromStr;
use tracing::{Instrument, info, info_span};

pub const DEFAULT_BATCH_SIZE: i64 = 500;

const PROGRESS_EVERY: u64 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceTable {
    Revision,
    Logging,
    Image,
    OldImage,
    FileArchive,
    Archive,
    IpBlocks,
}

impl SourceTable {
    pub const ALL: [Self; 7] = [
        Self::Revision,
        Self::Logging,
        Self::Image,
        Self::OldImage,
        Self::FileArchive,
        Self::Archive,
        Self::IpBlocks,
    ];

    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Revision => "revision",
            Self::Logging => "logging",
            Self::Image => "image",
            Self::OldImage => "oldimage",
            Self::FileArchive => "filearchive",
            Self::Archive => "archive",
            Self::IpBlocks => "ipblocks",
        }
    }

    /// Column holding the acting user's id.
    #[must_use]
    pub fn id_column(self) -> &'static str {
        match self {
            Self::Revision => "rev_user",
            Self::Logging => "log_user",
            Self::Image => "img_user",
            Self::OldImage => "oi_user",
            Self::FileArchive => "fa_user",
            Self::Archive => "ar_user",
            Self::IpBlocks => "ipb_by",
        }
    }

    /// Column holding the acting user's name.
    #[must_use]
    pub fn name_column(self) -> &'static str {
        match self {
            Self::Revision => "rev_user_text",
            Self::Logging => "log_user_text",
            Self::Image => "img_user_text",
            Self::OldImage => "oi_user_text",
            Self::FileArchive => "fa_user_text",
            Self::Archive => "ar_user_text",
            Self::IpBlocks => "ipb_by_text",
        }
    }

    /// Ids above `$1` with no `users` row, ascending, at most `$2` rows.
    fn missing_users_query(self) -> String {
        let table = self.table_name();
        let id = self.id_column();
        let name = self.name_column();
        format!(
            "SELECT DISTINCT src.{id}::bigint AS id, src.{name}::text AS name \
             FROM {table} src \
             LEFT JOIN users u ON u.id = src.{id} \
             WHERE u.id IS NULL AND src.{id} > $1 \
             ORDER BY id \
             LIMIT $2"
        )
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for SourceTable {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|table| table.table_name() == wanted)
            .ok_or_else(|| anyhow!("unknown source table: {s}"))
    }
}

/// Parse `revision|logging` (or comma separated) into tables, dropping repeats.
/// `all` selects every known table.
///
/// # Errors
/// Returns an error for unknown table names or an empty list.
pub fn parse_tables(list: &str) -> Result<Vec<SourceTable>> {
    if list.trim().eq_ignore_ascii_case("all") {
        return Ok(SourceTable::ALL.to_vec());
    }

    let mut tables = Vec::new();
    for part in list.split(['|', ',']).filter(|part| !part.trim().is_empty()) {
        let table: SourceTable = part.parse()?;
        if !tables.contains(&table) {
            tables.push(table);
        }
    }

    if tables.is_empty() {
        bail!("no source tables given");
    }
    Ok(tables)
}

/// Insert stub users for every id referenced by `tables`. Returns the number
/// of rows inserted.
///
/// # Errors
/// Returns an error if a query fails; batches committed before it stay.
pub async fn populate(pool: &PgPool, tables: &[SourceTable], batch_size: i64) -> Result<u64> {
    if batch_size <= 0 {
        bail!("batch size must be positive, got {batch_size}");
    }

    let mut inserted: u64 = 0;
    for &table in tables {
        let before = inserted;
        populate_table(pool, table, batch_size, &mut inserted).await?;
        info!(
            table = table.table_name(),
            inserted = inserted - before,
            "finished source table"
        );
    }

    info!(inserted, "user table populated");
    Ok(inserted)
}

async fn populate_table(
    pool: &PgPool,
    table: SourceTable,
    batch_size: i64,
    inserted: &mut u64,
) -> Result<()> {
    let select = table.missing_users_query();
    let insert = "INSERT INTO users (id, name) VALUES ($1, $2) ON CONFLICT DO NOTHING";
    let mut last_id: i64 = 0;

    loop {
        let mut tx = pool
            .begin()
            .await
            .context("begin populate batch transaction")?;

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = select.as_str()
        );
        let rows = sqlx::query(&select)
            .bind(last_id)
            .bind(batch_size)
            .fetch_all(&mut *tx)
            .instrument(span)
            .await
            .with_context(|| format!("failed to scan {table} for missing users"))?;

        if rows.is_empty() {
            tx.commit().await.context("commit populate batch")?;
            return Ok(());
        }

        for row in rows {
            let id: i64 = row
                .try_get("id")
                .with_context(|| format!("failed to decode id from {table}"))?;
            let name: String = row
                .try_get("name")
                .with_context(|| format!("failed to decode name from {table}"))?;
            last_id = last_id.max(id);

            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = insert
            );
            let result = sqlx::query(insert)
                .bind(id)
                .bind(&name)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .with_context(|| format!("failed to insert user {id}"))?;

            if result.rows_affected() > 0 {
                *inserted += 1;
                if *inserted % PROGRESS_EVERY == 0 {
                    info!(inserted = *inserted, last_id, "populating user table");
                }
            }
        }

        tx.commit().await.context("commit populate batch")?;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipe_and_comma_lists() {
        assert_eq!(
            parse_tables("revision|logging").unwrap(),
            vec![SourceTable::Revision, SourceTable::Logging]
        );
        assert_eq!(
            parse_tables("Image, oldimage,image").unwrap(),
            vec![SourceTable::Image, SourceTable::OldImage]
        );
        assert_eq!(parse_tables("all").unwrap(), SourceTable::ALL.to_vec());
    }

    #[test]
    fn rejects_unknown_or_empty_lists() {
        assert!(parse_tables("revision|page").is_err());
        assert!(parse_tables(" | ").is_err());
    }

    #[test]
    fn column_names_follow_table() {
        assert_eq!(SourceTable::IpBlocks.id_column(), "ipb_by");
        assert_eq!(SourceTable::IpBlocks.name_column(), "ipb_by_text");
        assert_eq!(SourceTable::FileArchive.to_string(), "filearchive");
    }

    #[test]
    fn missing_users_query_scopes_to_table() {
        let query = SourceTable::Archive.missing_users_query();
        assert!(query.contains("FROM archive src"));
        assert!(query.contains("LEFT JOIN users u ON u.id = src.ar_user"));
        assert!(query.contains("WHERE u.id IS NULL AND src.ar_user > $1"));
        assert!(query.ends_with("LIMIT $2"));
    }

    #[test]
    fn missing_users_query_decodes_as_bigint() {
        // Source user columns are INTEGER in older schemas.
        let query = SourceTable::Revision.missing_users_query();
        assert!(query.starts_with(
            "SELECT DISTINCT src.rev_user::bigint AS id, src.rev_user_text::text AS name"
        ));
        assert!(query.contains("ORDER BY id LIMIT $2"));
    }
}
