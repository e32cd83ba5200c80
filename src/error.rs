use thiserror::Error;

/// A proxy list entry that could not be turned into a [`crate::proxy::ProxyDescriptor`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("malformed proxy entry on line {line} ({entry}): {reason}")]
    Malformed {
        line: usize,
        entry: String,
        reason: String,
    },
    #[error("unsupported proxy scheme '{0}'")]
    UnsupportedScheme(String),
}

/// Failure of a single transport attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Resolver said "try again" (EAI_AGAIN). The only retryable class.
    #[error("temporary DNS resolution failure: {0}")]
    TransientDns(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("failed to build client: {0}")]
    Client(String),
}

impl TransportError {
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::TransientDns(_))
    }
}

/// Error surfaced by [`crate::dispatcher::Dispatcher::dispatch`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("{method} {url} failed after {attempts} attempt(s) via {proxy}: {source}")]
    Failed {
        method: String,
        url: String,
        attempts: u32,
        proxy: String,
        #[source]
        source: TransportError,
    },
    #[error("proxy list unusable: {0}")]
    Proxy(#[from] ProxyError),
}

impl RequestError {
    /// HTTP status of the final attempt, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Failed {
                source: TransportError::Status { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RequestError::Failed { attempts, .. } => *attempts,
            RequestError::Proxy(_) => 0,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_extraction() {
        let err = RequestError::Failed {
            method: "GET".to_string(),
            url: "https://api.test/x".to_string(),
            attempts: 1,
            proxy: "direct".to_string(),
            source: TransportError::Status {
                status: 404,
                body: "{}".to_string(),
            },
        };
        assert!(err.is_not_found());
        assert_eq!(err.attempts(), 1);

        let dns = RequestError::Failed {
            method: "GET".to_string(),
            url: "https://api.test/x".to_string(),
            attempts: 3,
            proxy: "socks5://10.0.0.1:1080".to_string(),
            source: TransportError::TransientDns("EAI_AGAIN".to_string()),
        };
        assert_eq!(dns.status(), None);
        assert!(dns.to_string().contains("after 3 attempt(s)"));
        assert!(dns.to_string().contains("socks5://10.0.0.1:1080"));
    }

    #[test]
    fn test_only_dns_is_retryable() {
        assert!(TransportError::TransientDns("x".into()).is_retryable());
        assert!(!TransportError::Timeout(10).is_retryable());
        assert!(!TransportError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!TransportError::Connection("refused".into()).is_retryable());
    }
}
