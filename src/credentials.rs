//! Session cookie extraction
//!
//! The cookie is taken from a request saved with the browser's
//! "Copy as cURL" action: the value of the `-H 'Cookie: ...'` argument.

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Default name of the saved curl command, looked up in the home directory
pub const CURL_FILE_NAME: &str = "coub-curl.txt";

/// Extract the cookie value from a saved curl command
pub fn cookie_from_curl(curl: &str) -> Result<String> {
    let re = Regex::new(r"-H '[Cc]ookie: ([^']*)'").map_err(|e| Error::Config {
        message: format!("invalid cookie pattern: {e}"),
        key: None,
    })?;

    re.captures(curl)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|cookie| !cookie.is_empty())
        .ok_or_else(|| Error::AuthMissing("no Cookie header in the saved curl command".to_string()))
}

/// Read a saved curl command from `path` and extract its cookie
pub async fn read_cookie_file(path: &Path) -> Result<String> {
    let curl = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::AuthMissing(format!("cannot read {}: {}", path.display(), e))
    })?;
    cookie_from_curl(&curl)
}

/// Location of the default curl file (`$HOME/coub-curl.txt`)
pub fn default_curl_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(CURL_FILE_NAME))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const CURL: &str = r#"curl 'https://coub.com/api/v2/timeline/likes?page=1' \
  -H 'Accept: application/json' \
  -H 'Cookie: remember_token=abc123; _coub_session=xyz' \
  --compressed"#;

    #[test]
    fn extracts_cookie_header_value() {
        assert_eq!(
            cookie_from_curl(CURL).unwrap(),
            "remember_token=abc123; _coub_session=xyz"
        );
    }

    #[test]
    fn lowercase_header_name_is_accepted() {
        let curl = "curl 'https://coub.com' -H 'cookie: a=b'";

        assert_eq!(cookie_from_curl(curl).unwrap(), "a=b");
    }

    #[test]
    fn missing_cookie_is_auth_missing() {
        let err = cookie_from_curl("curl 'https://coub.com' -H 'Accept: */*'").unwrap_err();

        assert!(matches!(err, Error::AuthMissing(_)));
    }

    #[test]
    fn empty_cookie_is_auth_missing() {
        let err = cookie_from_curl("curl 'https://coub.com' -H 'Cookie: '").unwrap_err();

        assert!(matches!(err, Error::AuthMissing(_)));
    }

    #[tokio::test]
    async fn unreadable_file_is_auth_missing() {
        let dir = tempfile::tempdir().unwrap();

        let err = read_cookie_file(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AuthMissing(_)));
    }

    #[tokio::test]
    async fn reads_cookie_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CURL_FILE_NAME);
        std::fs::write(&path, CURL).unwrap();

        let cookie = read_cookie_file(&path).await.unwrap();

        assert!(cookie.starts_with("remember_token=abc123"));
    }
}
