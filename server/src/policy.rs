//! Outbound host policy shared by the fetch and socket collaborators.
//!
//! DESIGN
//! ======
//! The relay core never inspects target URLs. Both collaborators run every
//! target through [`HostPolicy::check_url`] before opening a connection, so
//! HTTP and WebSocket exchanges obey the same blocklist.

use reqwest::Url;

/// Why a target URL was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("host is blocked: {0}")]
    Blocked(String),
}

impl crate::error::ErrorCode for PolicyError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) | Self::UnsupportedScheme(_) => "INVALID_URL",
            Self::Blocked(_) => "FORBIDDEN",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPolicy {
    /// Lowercased host names. An entry blocks itself and all subdomains.
    blocked_hosts: Vec<String>,
}

impl HostPolicy {
    #[must_use]
    pub fn new<I, S>(blocked_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocked_hosts = blocked_hosts
            .into_iter()
            .map(|h| normalize_host(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();
        Self { blocked_hosts }
    }

    #[must_use]
    pub fn is_blocked(&self, host: &str) -> bool {
        let host = normalize_host(host);
        self.blocked_hosts.iter().any(|entry| {
            host == *entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Parse `raw`, require one of `schemes`, and apply the blocklist.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`] describing the first check that failed.
    pub fn check_url(&self, raw: &str, schemes: &[&str]) -> Result<Url, PolicyError> {
        let url = Url::parse(raw).map_err(|e| PolicyError::InvalidUrl(format!("{raw}: {e}")))?;
        if !schemes.contains(&url.scheme()) {
            return Err(PolicyError::UnsupportedScheme(url.scheme().to_owned()));
        }
        let Some(host) = url.host_str() else {
            return Err(PolicyError::InvalidUrl(format!("{raw}: missing host")));
        };
        if self.is_blocked(host) {
            return Err(PolicyError::Blocked(host.to_owned()));
        }
        Ok(url)
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
