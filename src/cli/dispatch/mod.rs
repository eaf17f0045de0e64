//! Map parsed CLI arguments to the action the binary executes.

use crate::cli::actions::{Action, login, populate, provision};
use crate::cli::commands::{self, CMD_LOGIN, CMD_POPULATE, CMD_PROVISION, database, remote};
use anyhow::{Result, bail};

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_LOGIN, sub)) => {
            let options = remote::Options::parse(sub)?;
            let want_preferences = options.fetch_preferences || !options.excluded_preferences.is_empty();
            let credentials = remote::Credentials::parse(sub)?;

            Ok(Action::Login(login::Args {
                config: options.provider_config()?,
                username: credentials.username,
                password: credentials.password,
                want_preferences,
            }))
        }
        Some((CMD_PROVISION, sub)) => {
            let config = remote::Options::parse(sub)?.provider_config()?;
            let credentials = remote::Credentials::parse(sub)?;

            Ok(Action::Provision(provision::Args {
                config,
                dsn: database::parse_dsn(sub)?,
                username: credentials.username,
                password: credentials.password,
            }))
        }
        Some((CMD_POPULATE, sub)) => {
            let options = commands::populate::Options::parse(sub)?;

            Ok(Action::Populate(populate::Args {
                dsn: database::parse_dsn(sub)?,
                tables: options.tables,
                batch_size: options.batch_size,
            }))
        }
        Some((name, _)) => bail!("unknown command: {name}"),
        None => bail!("missing command"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::PreferenceImport;
    use crate::storage::SourceTable;

    #[test]
    fn login_action_carries_provider_config() {
        temp_env::with_vars([("STUBAUTH_PASSWORD", Some("secret"))], || {
            let matches = commands::new().get_matches_from(vec![
                "stubauth",
                "login",
                "--api-url",
                "https://wiki.tld/w/api.php",
                "--username",
                "Alice",
                "--exclude-preference",
                "skin",
                "--timeout",
                "4",
            ]);

            let Action::Login(args) = handler(&matches).unwrap() else {
                panic!("expected login action");
            };
            assert_eq!(args.username, "Alice");
            assert!(args.want_preferences);
            assert_eq!(args.config.timeout().as_secs(), 4);
            assert!(matches!(
                args.config.preference_import(),
                PreferenceImport::Except(excluded) if excluded.contains("skin")
            ));
        });
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        temp_env::with_vars([("STUBAUTH_PASSWORD", Some("secret"))], || {
            let matches = commands::new().get_matches_from(vec![
                "stubauth",
                "login",
                "--api-url",
                "ftp://wiki.tld/w/api.php",
                "--username",
                "Alice",
            ]);

            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("invalid --api-url"));
            }
        });
    }

    #[test]
    fn populate_action_parses_tables() {
        temp_env::with_vars(
            [("STUBAUTH_DSN", Some("postgres://localhost:5432/wiki"))],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "stubauth",
                    "populate",
                    "--tables",
                    "revision|ipblocks",
                    "--batch-size",
                    "100",
                ]);

                let Action::Populate(args) = handler(&matches).unwrap() else {
                    panic!("expected populate action");
                };
                assert_eq!(args.tables, vec![SourceTable::Revision, SourceTable::IpBlocks]);
                assert_eq!(args.batch_size, 100);
            },
        );
    }

    #[test]
    fn populate_rejects_unknown_table() {
        temp_env::with_vars(
            [("STUBAUTH_DSN", Some("postgres://localhost:5432/wiki"))],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "stubauth",
                    "populate",
                    "--tables",
                    "revision|page",
                ]);
                assert!(handler(&matches).is_err());
            },
        );
    }
}
