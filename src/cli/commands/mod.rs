pub mod database;
pub mod logging;
pub mod populate;
pub mod remote;

use clap::{
    ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const CMD_LOGIN: &str = "login";
pub const CMD_PROVISION: &str = "provision";
pub const CMD_POPULATE: &str = "populate";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("stubauth")
        .about("Provision stub accounts from a remote wiki login")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(login_command())
        .subcommand(provision_command())
        .subcommand(populate_command());

    logging::with_args(command)
}

fn login_command() -> Command {
    let command = Command::new(CMD_LOGIN)
        .about("Log in to the remote wiki and print the outcome and profile as JSON");
    let command = remote::with_args(command);
    remote::with_credentials_args(command)
}

fn provision_command() -> Command {
    let command = Command::new(CMD_PROVISION)
        .about("Run first-login provisioning for a local stub account");
    let command = remote::with_args(command);
    let command = remote::with_credentials_args(command);
    database::with_args(command)
}

fn populate_command() -> Command {
    let command = Command::new(CMD_POPULATE)
        .about("Create stub accounts for users referenced by imported wiki tables");
    let command = populate::with_args(command);
    database::with_args(command)
}
