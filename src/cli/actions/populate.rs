use crate::storage::{self, SourceTable};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: SecretString,
    pub tables: Vec<SourceTable>,
    pub batch_size: i64,
}

/// Execute the populate action.
/// # Errors
/// Returns an error if the database is unreachable or a batch fails.
pub async fn execute(args: Args) -> Result<()> {
    let pool = storage::connect(&args.dsn).await?;

    let tables = args
        .tables
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("|");
    info!(tables, batch_size = args.batch_size, "populating user table");

    let inserted = storage::populate(&pool, &args.tables, args.batch_size).await?;
    println!("{inserted} stub users inserted");

    pool.close().await;
    Ok(())
}
