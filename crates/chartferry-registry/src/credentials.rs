//! Registry credentials
//!
//! The registry is accessed with a single basic-auth header. Credentials are
//! only attached to requests for the configured server; the HTTP client does
//! not follow redirects, so they never reach another origin.

use std::fmt;

/// Basic authentication (username/password)
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials from optional source fields; both must be non-empty
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Self::basic(u, p)),
            _ => None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Authorization` header value
    pub fn auth_header(&self) -> String {
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{}:{}", self.username, self.password),
        );
        format!("Basic {}", encoded)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header() {
        let creds = Credentials::basic("admin", "Harbor12345");
        assert_eq!(creds.auth_header(), "Basic YWRtaW46SGFyYm9yMTIzNDU=");
    }

    #[test]
    fn test_from_parts_requires_both() {
        assert!(Credentials::from_parts(Some("user"), Some("pass")).is_some());
        assert!(Credentials::from_parts(Some("user"), None).is_none());
        assert!(Credentials::from_parts(None, Some("pass")).is_none());
        assert!(Credentials::from_parts(Some(""), Some("pass")).is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::basic("user", "secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }
}
