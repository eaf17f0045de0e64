pub mod login;
pub mod populate;
pub mod provision;
mod run;

#[derive(Debug)]
pub enum Action {
    Login(login::Args),
    Provision(provision::Args),
    Populate(populate::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
