use crate::provider::{
    AuthResponse, MemorySessionFlags, PasswordRequest, RESET_PASSWORD_FLAG, SessionFlags,
    StubUserProvider,
};
use crate::remote::ProviderConfig;
use crate::storage::{self, PgUserStore};
use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use serde_json::json;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub config: ProviderConfig,
    pub dsn: SecretString,
    pub username: String,
    pub password: SecretString,
}

/// Run first-login provisioning for one account against Postgres.
/// # Errors
/// Returns an error if the database is unreachable or the remote rejects the login.
pub async fn execute(args: Args) -> Result<()> {
    let pool = storage::connect(&args.dsn).await?;
    let provider = StubUserProvider::new(
        args.config,
        PgUserStore::new(pool.clone()),
        MemorySessionFlags::new(),
    )?;

    let eligible = provider.can_authenticate(&args.username).await?;
    let request = PasswordRequest::new(args.username, args.password);
    let response = provider.begin_authentication(&request).await;

    // The provider never passes; provisioning shows up as a stub turning into a real account.
    let provisioned = eligible && !provider.can_authenticate(&request.username).await?;
    info!(provisioned, "provisioning finished");

    let result = match &response {
        AuthResponse::Pass(_) => "pass",
        AuthResponse::Fail(_) => "fail",
        AuthResponse::Abstain => "abstain",
    };
    let report = json!({
        "username": request.username,
        "eligible": eligible,
        "provisioned": provisioned,
        "result": result,
        "reset_pass": provider.flags().get(RESET_PASSWORD_FLAG),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize provisioning report")?
    );

    pool.close().await;

    if let AuthResponse::Fail(failure) = response {
        bail!("remote login failed: {failure}");
    }
    Ok(())
}
