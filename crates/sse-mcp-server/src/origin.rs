//! `Origin` header validation

use http::HeaderMap;
use http::header::ORIGIN;

/// Prefix allow-list for the `Origin` header
#[derive(Debug, Clone)]
pub struct OriginValidator {
    allowed_prefixes: Vec<String>,
}

impl OriginValidator {
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }

    /// An absent origin is allowed. A present one must start with an allowed prefix.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => self
                .allowed_prefixes
                .iter()
                .any(|prefix| origin.starts_with(prefix.as_str())),
        }
    }

    /// Check the request headers. A non-UTF-8 `Origin` is rejected.
    pub fn check(&self, headers: &HeaderMap) -> Result<Option<String>, String> {
        match headers.get(ORIGIN) {
            None => Ok(None),
            Some(value) => match value.to_str() {
                Ok(origin) if self.is_allowed(Some(origin)) => Ok(Some(origin.to_string())),
                Ok(origin) => Err(origin.to_string()),
                Err(_) => Err(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALLOWED_ORIGINS;
    use http::HeaderValue;

    fn validator() -> OriginValidator {
        OriginValidator::new(DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_absent_origin_allowed() {
        assert!(validator().is_allowed(None));
        assert_eq!(validator().check(&HeaderMap::new()), Ok(None));
    }

    #[test]
    fn test_allow_listed_prefixes() {
        let validator = validator();
        assert!(validator.is_allowed(Some("http://localhost:3000")));
        assert!(validator.is_allowed(Some("http://127.0.0.1:8080")));
        assert!(validator.is_allowed(Some("null")));
        assert!(!validator.is_allowed(Some("https://evil.example")));
        assert!(!validator.is_allowed(Some("https://localhost")));
    }

    #[test]
    fn test_check_headers() {
        let validator = validator();
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("http://localhost:5173"));
        assert_eq!(
            validator.check(&headers),
            Ok(Some("http://localhost:5173".to_string()))
        );

        headers.insert(ORIGIN, HeaderValue::from_static("http://attacker.test"));
        assert_eq!(
            validator.check(&headers),
            Err("http://attacker.test".to_string())
        );
    }
}
