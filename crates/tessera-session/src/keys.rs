//! Store key layout.
//!
//! | Key | Value |
//! |-----|-------|
//! | `token:{token}` | encoded [`SessionRecord`](crate::SessionRecord) |
//! | `user_token:{username}` | most recent token issued to that username |
//! | `browser_token:{browser}` | token bound to that browser fingerprint |
//! | `user_browser:{userId}:{browser}` | token bound to that user on that browser |
//! | `ip_user_token:{addr}:{userId}` | token held by that user from that address |
//! | `ip_users:{addr}` | set of userIds with a session from that address |
//! | `user_roles:{userId}` | cached role codes |
//! | `roles:all` | cached role catalog |
//!
//! Addresses are stored with `:` replaced by `_` so IPv6 literals keep the
//! `ip_user_token` key splittable. UserIds inside `user_browser` and
//! `ip_user_token` keys have `%` and `:` percent-encoded, so the per-user
//! prefix `user_browser:{userId}:` never matches another user's entries.

use std::borrow::Cow;

/// Builds and parses store keys under an optional namespace prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    /// Create a layout whose keys all start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn token(&self, token: &str) -> String {
        format!("{}token:{token}", self.prefix)
    }

    pub fn user_token(&self, username: &str) -> String {
        format!("{}user_token:{username}", self.prefix)
    }

    pub fn user_token_prefix(&self) -> String {
        format!("{}user_token:", self.prefix)
    }

    pub fn browser_token(&self, browser: &str) -> String {
        format!("{}browser_token:{browser}", self.prefix)
    }

    pub fn browser_token_prefix(&self) -> String {
        format!("{}browser_token:", self.prefix)
    }

    pub fn user_browser(&self, user_id: &str, browser: &str) -> String {
        format!(
            "{}user_browser:{}:{browser}",
            self.prefix,
            encode_user_id(user_id)
        )
    }

    /// Prefix of every user-browser entry for one user.
    pub fn user_browser_prefix(&self, user_id: &str) -> String {
        format!(
            "{}user_browser:{}:",
            self.prefix,
            encode_user_id(user_id)
        )
    }

    /// Prefix of every user-browser entry.
    pub fn user_browser_all_prefix(&self) -> String {
        format!("{}user_browser:", self.prefix)
    }

    pub fn ip_user_token(&self, address: &str, user_id: &str) -> String {
        format!(
            "{}ip_user_token:{}:{}",
            self.prefix,
            sanitize_address(address),
            encode_user_id(user_id)
        )
    }

    pub fn ip_user_token_prefix(&self) -> String {
        format!("{}ip_user_token:", self.prefix)
    }

    pub fn ip_users(&self, address: &str) -> String {
        format!("{}ip_users:{}", self.prefix, sanitize_address(address))
    }

    /// Split an `ip_user_token` key into its stored address and userId.
    ///
    /// The returned address is already sanitized and can be passed straight
    /// back to [`ip_users`](Self::ip_users); the userId is decoded.
    pub fn parse_ip_user_token<'a>(&self, key: &'a str) -> Option<(&'a str, Cow<'a, str>)> {
        let rest = key
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix("ip_user_token:")?;
        let (address, user_id) = rest.split_once(':')?;
        if address.is_empty() || user_id.is_empty() {
            return None;
        }
        Some((address, decode_user_id(user_id)))
    }

    pub fn user_roles(&self, user_id: &str) -> String {
        format!("{}user_roles:{user_id}", self.prefix)
    }

    pub fn user_roles_prefix(&self) -> String {
        format!("{}user_roles:", self.prefix)
    }

    pub fn all_roles(&self) -> String {
        format!("{}roles:all", self.prefix)
    }
}

fn sanitize_address(address: &str) -> String {
    address.replace(':', "_")
}

fn encode_user_id(user_id: &str) -> Cow<'_, str> {
    if !user_id.contains([':', '%']) {
        return Cow::Borrowed(user_id);
    }
    Cow::Owned(user_id.replace('%', "%25").replace(':', "%3A"))
}

fn decode_user_id(encoded: &str) -> Cow<'_, str> {
    if !encoded.contains('%') {
        return Cow::Borrowed(encoded);
    }
    let mut out = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        if let Some(after) = tail.strip_prefix("%3A") {
            out.push(':');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("%25") {
            out.push('%');
            rest = after;
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
