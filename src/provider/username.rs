//! Canonical form of local usernames.

use std::net::IpAddr;
use thiserror::Error;

pub const MAX_USERNAME_BYTES: usize = 255;

const FORBIDDEN_CHARS: &[char] = &['#', '<', '>', '[', ']', '|', '{', '}', '/', '@', ':'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username is empty")]
    Empty,
    #[error("username is longer than {MAX_USERNAME_BYTES} bytes")]
    TooLong,
    #[error("username contains the forbidden character {0:?}")]
    ForbiddenChar(char),
    #[error("username looks like an IP address")]
    IpAddress,
}

/// Normalize `raw` the way account names are stored: underscores become
/// spaces, whitespace runs collapse, and the first letter is uppercased.
///
/// # Errors
/// Returns an error for names that cannot belong to an account.
pub fn canonicalize(raw: &str) -> Result<String, UsernameError> {
    let spaced = raw.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = collapsed.chars();
    let Some(first) = chars.next() else {
        return Err(UsernameError::Empty);
    };
    let name: String = first.to_uppercase().chain(chars).collect();

    if name.len() > MAX_USERNAME_BYTES {
        return Err(UsernameError::TooLong);
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| FORBIDDEN_CHARS.contains(ch) || ch.is_control())
    {
        return Err(UsernameError::ForbiddenChar(ch));
    }

    if name.parse::<IpAddr>().is_ok() {
        return Err(UsernameError::IpAddress);
    }

    Ok(name)
}
