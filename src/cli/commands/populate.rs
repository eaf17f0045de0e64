use crate::storage::{DEFAULT_BATCH_SIZE, SourceTable, parse_tables};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_TABLES: &str = "tables";
pub const ARG_BATCH_SIZE: &str = "batch-size";

#[derive(Debug, Clone)]
pub struct Options {
    pub tables: Vec<SourceTable>,
    pub batch_size: i64,
}

impl Options {
    /// # Errors
    /// Returns an error if the table list is invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let tables = matches
            .get_one::<String>(ARG_TABLES)
            .map_or("all", String::as_str);

        Ok(Self {
            tables: parse_tables(tables).with_context(|| format!("invalid --{ARG_TABLES}"))?,
            batch_size: matches
                .get_one::<i64>(ARG_BATCH_SIZE)
                .copied()
                .unwrap_or(DEFAULT_BATCH_SIZE),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TABLES)
                .long(ARG_TABLES)
                .help("Source tables separated by '|', or 'all': revision, logging, image, oldimage, filearchive, archive, ipblocks")
                .env("STUBAUTH_POPULATE_TABLES")
                .default_value("all"),
        )
        .arg(
            Arg::new(ARG_BATCH_SIZE)
                .long(ARG_BATCH_SIZE)
                .help("Rows read per batch, each batch commits separately")
                .env("STUBAUTH_POPULATE_BATCH_SIZE")
                .default_value("500")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
