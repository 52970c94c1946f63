//! Checks that gate the activation control before any session is requested.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("AR must be accessed over HTTPS or from localhost (current origin: {0})")]
    InsecureOrigin(String),
    #[error("malformed origin: {0:?}")]
    MalformedOrigin(String),
}

/// Scheme and host of the place the experience is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
}

impl Origin {
    /// Parses `scheme://host[:port][/path]`.
    pub fn parse(origin: &str) -> Result<Self, EnvironmentError> {
        let malformed = || EnvironmentError::MalformedOrigin(origin.to_string());

        let (scheme, rest) = origin.split_once("://").ok_or_else(malformed)?;
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or(authority);

        let host = if let Some(bracketed) = authority.strip_prefix('[') {
            bracketed.split(']').next().unwrap_or_default()
        } else {
            authority.split(':').next().unwrap_or_default()
        };

        if scheme.is_empty() || host.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
        })
    }

    pub fn is_local_host(&self) -> bool {
        self.host == "localhost"
            || self.host.ends_with(".localhost")
            || self.host == "::1"
            || self.host.starts_with("127.")
    }

    /// Whether content from this origin would count as a secure context.
    pub fn is_secure_context(&self) -> bool {
        matches!(self.scheme.as_str(), "https" | "wss") || self.is_local_host()
    }

    pub fn check_secure(&self) -> Result<(), EnvironmentError> {
        if self.is_secure_context() {
            Ok(())
        } else {
            Err(EnvironmentError::InsecureOrigin(format!(
                "{}://{}",
                self.scheme, self.host
            )))
        }
    }
}

/// Parses and checks the configured origin in one go.
pub fn check_activation_allowed(origin: &str) -> Result<Origin, EnvironmentError> {
    let origin = Origin::parse(origin)?;
    origin.check_secure()?;
    Ok(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_and_local_hosts_are_allowed() {
        for origin in [
            "https://example.com",
            "https://example.com:8443/demo/index.html",
            "http://localhost:8080",
            "http://demo.localhost",
            "http://127.0.0.1:3000/",
            "http://[::1]:5173",
        ] {
            assert!(check_activation_allowed(origin).is_ok(), "{origin}");
        }
    }

    #[test]
    fn plain_http_on_remote_host_is_rejected() {
        assert_eq!(
            check_activation_allowed("http://192.168.1.20:8080/index.html"),
            Err(EnvironmentError::InsecureOrigin(
                "http://192.168.1.20".to_string()
            ))
        );
        assert!(check_activation_allowed("http://localhost.evil.com").is_err());
    }

    #[test]
    fn origins_without_scheme_or_host_are_malformed() {
        assert!(matches!(
            Origin::parse("localhost:8080"),
            Err(EnvironmentError::MalformedOrigin(_))
        ));
        assert!(matches!(
            Origin::parse("https:///index.html"),
            Err(EnvironmentError::MalformedOrigin(_))
        ));
    }
}
