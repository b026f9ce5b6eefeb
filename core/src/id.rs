use std::{fmt, ops::Deref};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

const INDEX_ROUTE: &str = "index";

/// Normalized internal route url.
///
/// `"index"` (with or without a leading slash) becomes `"/"`; every other url
/// gains a leading `/` if it lacks one.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct RouteUrl(CompactString);

impl RouteUrl {
    pub fn new(url: &str) -> Self {
        let trimmed = url.trim();
        let bare = trimmed.strip_prefix('/').unwrap_or(trimmed);

        if bare == INDEX_ROUTE || bare.is_empty() {
            return Self("/".into());
        }

        let mut normalized = CompactString::with_capacity(bare.len() + 1);
        normalized.push('/');
        normalized.push_str(bare);
        Self(normalized)
    }

    pub fn index() -> Self {
        Self("/".into())
    }

    pub fn is_index(&self) -> bool {
        self.0 == "/"
    }

    /// The url without its leading slash, `"index"` for the root.
    pub fn name(&self) -> &str {
        if self.is_index() {
            INDEX_ROUTE
        } else {
            &self.0[1..]
        }
    }
}

impl fmt::Display for RouteUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RouteUrl {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RouteUrl {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl Deref for RouteUrl {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct ResponseId(pub u64);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_url_index() {
        assert_eq!(&*RouteUrl::new("index"), "/");
        assert_eq!(&*RouteUrl::new("/index"), "/");
        assert_eq!(&*RouteUrl::new(""), "/");
        assert!(RouteUrl::new("/").is_index());
    }

    #[test]
    fn test_route_url_leading_slash() {
        assert_eq!(&*RouteUrl::new("finish_deposit"), "/finish_deposit");
        assert_eq!(&*RouteUrl::new("/finish_deposit"), "/finish_deposit");
    }

    #[test]
    fn test_route_url_name() {
        assert_eq!(RouteUrl::new("/").name(), "index");
        assert_eq!(RouteUrl::new("deposit").name(), "deposit");
    }
}
