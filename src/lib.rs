//! # stubauth (Stub Account Provisioning from a Remote Wiki)
//!
//! `stubauth` bridges authentication between a local user directory and a
//! remote, authoritative wiki. Local *stub* accounts exist (usually created by
//! the `populate` backfill) but carry no password. The first time such a user
//! logs in, the submitted credentials are checked against the remote wiki API
//! and, on success, the local account is provisioned with a password hash and
//! whatever profile data the remote wiki is willing to share.
//!
//! ## Remote Login Handshake
//!
//! Legacy wiki APIs require a two step login: the first `action=login` request
//! returns `NeedToken` together with a session cookie, and the request must be
//! repeated with `lgtoken` and that cookie. Cookies are carried by hand in a
//! `Cookie` header built from [`remote::CookieStore`]; no transport cookie jar is
//! involved. A handshake never exceeds four round trips.
//!
//! ## Provisioning
//!
//! [`provider::StubUserProvider`] never authorizes a session itself. After a
//! successful remote login it stores the password hash, imports the profile and
//! then *abstains*, so the regular local password check completes the login.
//!
//! - **Best effort enrichment:** profile, preference and scraping failures are
//!   logged and never undo the committed password hash.
//! - **No plaintext:** passwords are kept in [`secrecy::SecretString`] and are
//!   never logged or persisted.

pub mod cli;
pub mod provider;
pub mod remote;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
