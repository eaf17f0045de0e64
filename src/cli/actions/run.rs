use crate::cli::actions::{Action, login, populate, provision};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => login::execute(args).await,
        Action::Provision(args) => provision::execute(args).await,
        Action::Populate(args) => populate::execute(args).await,
    }
}
