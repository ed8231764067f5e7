//! Read-only external data sources: mailbox, calendar, local files.
//!
//! Google readers authenticate with a previously saved OAuth token file;
//! obtaining that token is a setup step, not something this process does.

mod calendar;
mod files;
mod gmail;

pub use calendar::GoogleCalendarReader;
pub use files::{read_file_capped, search_files, FileMatch};
pub use gmail::GmailReader;

use std::path::Path;

use serde_json::Value;

use crate::traits::SourceError;

/// Load the bearer token out of a saved OAuth token JSON file.
///
/// Accepts both the `{"token": ...}` shape written by Google's auth helpers
/// and a plain `{"access_token": ...}`.
pub(crate) fn load_bearer_token(token_path: &str) -> Result<String, SourceError> {
    let path = Path::new(token_path);
    if token_path.is_empty() || !path.exists() {
        return Err(SourceError::MissingCredentials(format!(
            "no saved OAuth token at '{token_path}'"
        )));
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SourceError::Unavailable(format!("reading {token_path}: {e}")))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| SourceError::MissingCredentials(format!("token file is not JSON: {e}")))?;
    value["token"]
        .as_str()
        .or_else(|| value["access_token"].as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            SourceError::MissingCredentials(format!(
                "token file {token_path} has no token/access_token field"
            ))
        })
}

/// Percent-encode a query-string value.
pub(crate) fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Map an HTTP status from a Google API to a source error.
pub(crate) fn status_to_error(status: u16, what: &str) -> SourceError {
    match status {
        401 | 403 => SourceError::PermissionDenied(format!(
            "{what} returned {status}; the saved token may be expired or under-scoped"
        )),
        _ => SourceError::Unavailable(format!("{what} returned {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_token_file_is_missing_credentials() {
        let err = load_bearer_token("/nonexistent/token.json").unwrap_err();
        assert!(matches!(err, SourceError::MissingCredentials(_)));
    }

    #[test]
    fn empty_path_is_missing_credentials() {
        assert!(matches!(
            load_bearer_token("").unwrap_err(),
            SourceError::MissingCredentials(_)
        ));
    }

    #[test]
    fn both_token_shapes_parse() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = dir.path().join("a.json");
        std::fs::File::create(&p1)
            .unwrap()
            .write_all(br#"{"token": "abc"}"#)
            .unwrap();
        assert_eq!(load_bearer_token(p1.to_str().unwrap()).unwrap(), "abc");

        let p2 = dir.path().join("b.json");
        std::fs::File::create(&p2)
            .unwrap()
            .write_all(br#"{"access_token": "xyz"}"#)
            .unwrap();
        assert_eq!(load_bearer_token(p2.to_str().unwrap()).unwrap(), "xyz");
    }

    #[test]
    fn auth_statuses_map_to_permission_denied() {
        assert!(matches!(
            status_to_error(401, "gmail"),
            SourceError::PermissionDenied(_)
        ));
        assert!(matches!(
            status_to_error(403, "gmail"),
            SourceError::PermissionDenied(_)
        ));
        assert!(matches!(
            status_to_error(500, "gmail"),
            SourceError::Unavailable(_)
        ));
    }
}
