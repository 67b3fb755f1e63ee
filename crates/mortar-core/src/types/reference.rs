//! Concrete package references.

use std::fmt;
use std::str::FromStr;

use crate::error::{MortarError, MortarResult};
use crate::types::version::Version;

/// A concrete reference identifying one package recipe instance
///
/// Rendered as `name/version` or `name/version@user/channel`. Immutable;
/// equality and ordering are by the exact tuple. A version range is never a
/// `Reference`; see [`crate::types::VersionExpr`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reference {
    pub name: String,
    pub version: Version,
    pub user: Option<String>,
    pub channel: Option<String>,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
}

impl Reference {
    /// Create a reference without user/channel
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            user: None,
            channel: None,
        }
    }

    /// Create a reference under a user/channel namespace
    pub fn with_user_channel(
        name: impl Into<String>,
        version: Version,
        user: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            user: Some(user.into()),
            channel: Some(channel.into()),
        }
    }
}

impl FromStr for Reference {
    type Err = MortarError;

    fn from_str(s: &str) -> MortarResult<Self> {
        let input = s.trim();
        let malformed = |reason: &str| MortarError::MalformedReference {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (body, namespace) = match input.split_once('@') {
            Some((body, ns)) => (body, Some(ns)),
            None => (input, None),
        };

        let (name, version) = body
            .split_once('/')
            .ok_or_else(|| malformed("expected name/version"))?;
        if !valid_name(name) {
            return Err(malformed("missing or invalid package name"));
        }
        let version = Version::from_str(version)?;

        let (user, channel) = match namespace {
            Some(ns) => {
                let (user, channel) = ns
                    .split_once('/')
                    .ok_or_else(|| malformed("expected @user/channel"))?;
                if !valid_name(user) || !valid_name(channel) {
                    return Err(malformed("invalid user or channel"));
                }
                (Some(user.to_string()), Some(channel.to_string()))
            },
            None => (None, None),
        };

        Ok(Reference {
            name: name.to_string(),
            version,
            user,
            channel,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let (Some(user), Some(channel)) = (&self.user, &self.channel) {
            write!(f, "@{user}/{channel}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let r: Reference = "zlib/1.2.11".parse().unwrap();
        assert_eq!(r.name, "zlib");
        assert_eq!(r.version.to_string(), "1.2.11");
        assert!(r.user.is_none());
        assert_eq!(r.to_string(), "zlib/1.2.11");
    }

    #[test]
    fn test_parse_user_channel() {
        let r: Reference = "boost/1.79.0@corp/stable".parse().unwrap();
        assert_eq!(r.user.as_deref(), Some("corp"));
        assert_eq!(r.channel.as_deref(), Some("stable"));
        assert_eq!(r.to_string(), "boost/1.79.0@corp/stable");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("zlib".parse::<Reference>().is_err()); // no version
        assert!("/1.0".parse::<Reference>().is_err()); // no name
        assert!("zlib/".parse::<Reference>().is_err()); // empty version
        assert!("zlib/1.0@corp".parse::<Reference>().is_err()); // dangling user
        assert!("a b/1.0".parse::<Reference>().is_err()); // bad name
    }

    #[test]
    fn test_ordering_by_tuple() {
        let a: Reference = "abc/1.0".parse().unwrap();
        let b: Reference = "abc/2.0".parse().unwrap();
        let c: Reference = "abd/1.0".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, "abc/1.0".parse::<Reference>().unwrap());
    }
}
