use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::auth::app_token;
use crate::error::{Error, Result};

/// Credentials JSON for one handle. Either a ready bearer token or the
/// consumer key pair. Other keys in the file are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub bearer_token: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read credentials {}: {e}", path.display()))
        })?;
        Self::parse(&s)
            .map_err(|e| Error::config(format!("{} ({})", e, path.display())))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let creds: Credentials = serde_json::from_str(s)
            .map_err(|e| Error::config(format!("malformed credentials: {e}")))?;
        let has_pair = creds.consumer_key.is_some() && creds.consumer_secret.is_some();
        if creds.bearer_token.is_none() && !has_pair {
            return Err(Error::config(
                "credentials need bearer_token or consumer_key/consumer_secret",
            ));
        }
        Ok(creds)
    }

    /// Returns a bearer token, exchanging the consumer pair if needed.
    pub fn bearer_token(&self, api_base: &str) -> Result<String> {
        if let Some(t) = &self.bearer_token {
            return Ok(t.clone());
        }
        match (&self.consumer_key, &self.consumer_secret) {
            (Some(key), Some(secret)) => app_token::fetch_app_token(api_base, key, secret),
            _ => Err(Error::config("no usable credentials")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_used_directly() {
        let creds = Credentials::parse(r#"{"bearer_token": "AAA"}"#).unwrap();
        assert_eq!(creds.bearer_token("http://unused.invalid").unwrap(), "AAA");
    }

    #[test]
    fn classic_four_key_file_parses() {
        let creds = Credentials::parse(
            r#"{"consumer_key": "k", "consumer_secret": "s",
                "access_token_key": "ak", "access_token_secret": "as"}"#,
        )
        .unwrap();
        assert_eq!(creds.consumer_key.as_deref(), Some("k"));
        assert!(creds.bearer_token.is_none());
    }

    #[test]
    fn incomplete_or_malformed_is_configuration_error() {
        assert!(matches!(
            Credentials::parse(r#"{"consumer_key": "k"}"#),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Credentials::parse("not json"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            Credentials::load(&dir.path().join("nope.json")),
            Err(Error::Configuration(_))
        ));
    }
}
