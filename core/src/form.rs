//! Hidden-field encoding shared by the component renderer and the router.

use std::sync::LazyLock;

use regex::Regex;

/// Form key carrying the JSON-encoded namespace of the pressed button.
pub const SUBMIT_BUTTON_KEY: &str = "--submit-button";

/// Form key carrying the namespace of the button pressed on the previous page.
pub const PREVIOUSLY_PRESSED_BUTTON: &str = "--last-button";

/// Leading character of hidden inputs whose value must be JSON-decoded.
pub const JSON_DECODE_SYMBOL: char = '\u{0}';

/// Joins a button namespace and an argument name into one form key.
pub const LABEL_SEPARATOR: char = '~';

/// Tag marking a file-upload envelope.
pub const FILE_UPLOAD_TAG: &str = "__file_upload__";

static EXTERNAL_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:http(s)?://)?[\w.-]+(?:\.[\w\.-]+)+[\w\-\._~:/?#\[\]@!\$&'()*+,;=.]+$",
    )
    .ok()
});

/// A url counts as external iff it matches the external pattern and is not a
/// `file://` url.
pub fn is_external_url(url: &str) -> bool {
    !url.starts_with("file://")
        && EXTERNAL_URL
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(url))
}

/// `"<namespace><LABEL_SEPARATOR><name>"`
pub fn namespaced_key(namespace: &str, name: &str) -> String {
    let mut key = String::with_capacity(namespace.len() + name.len() + 1);
    key.push_str(namespace);
    key.push(LABEL_SEPARATOR);
    key.push_str(name);
    key
}

/// Split a namespaced key into `(namespace, name)`.
///
/// Argument names never contain the separator, so the split is at the last
/// occurrence; labels may contain it freely.
pub fn split_namespaced_key(key: &str) -> Option<(&str, &str)> {
    key.rsplit_once(LABEL_SEPARATOR)
}

pub fn json_decode_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len() + 1);
    key.push(JSON_DECODE_SYMBOL);
    key.push_str(name);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_urls() {
        assert!(is_external_url("https://example.com"));
        assert!(is_external_url("http://www.python.org/downloads"));
        assert!(is_external_url("example.com/path?q=1"));
    }

    #[test]
    fn test_internal_urls() {
        assert!(!is_external_url("nonexistent_route"));
        assert!(!is_external_url("/index"));
        assert!(!is_external_url("file://etc/passwd.txt"));
    }

    #[test]
    fn test_namespaced_key_roundtrip() {
        let key = namespaced_key("Click ~ Me#4", "x");
        assert_eq!(split_namespaced_key(&key), Some(("Click ~ Me#4", "x")));
    }
}
