//! Remote archive references.

use std::fmt;

use crate::error::{ExtensionError, Result};

/// Prefix that marks a location descriptor as a remote reference.
pub const REMOTE_PREFIX: &str = "github:";

const CHECKSUM_MARKER: &str = "blake3=";

/// A parsed `github:owner/repo[@ref][/subpath][#blake3=<hex>]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub owner: String,
    pub repo: String,
    /// Branch, tag or commit. `None` means the repository's default branch.
    pub reference: Option<String>,
    /// Path inside the repository to extract.
    pub subpath: Option<String>,
    /// Expected blake3 digest of the downloaded archive.
    pub checksum: Option<String>,
}

impl RemoteSpec {
    pub fn is_remote(descriptor: &str) -> bool {
        descriptor.trim().starts_with(REMOTE_PREFIX)
    }

    /// Parse a remote descriptor.
    ///
    /// Supports formats:
    /// - `github:org/repo`
    /// - `github:org/repo@ref`
    /// - `github:org/repo/path/in/repo`
    /// - `github:org/repo@ref/path/in/repo`
    /// - any of the above with a `#blake3=<hex>` suffix
    pub fn parse(descriptor: &str) -> Result<Self> {
        let descriptor = descriptor.trim();
        let malformed = || ExtensionError::MalformedRemoteReference(descriptor.to_string());

        let body = descriptor.strip_prefix(REMOTE_PREFIX).ok_or_else(malformed)?;
        let (body, checksum) = match body.split_once('#') {
            Some((body, fragment)) => {
                let hex = fragment.strip_prefix(CHECKSUM_MARKER).ok_or_else(malformed)?;
                if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(malformed());
                }
                (body, Some(hex.to_ascii_lowercase()))
            }
            None => (body, None),
        };

        let (owner, rest) = body.split_once('/').ok_or_else(malformed)?;
        let repo_end = rest.find(['@', '/']).unwrap_or(rest.len());
        let repo = &rest[..repo_end];
        let rest = &rest[repo_end..];

        let (reference, rest) = match rest.strip_prefix('@') {
            Some(after) => {
                let ref_end = after.find('/').unwrap_or(after.len());
                (Some(&after[..ref_end]), &after[ref_end..])
            }
            None => (None, rest),
        };

        let subpath = rest.trim_matches('/');

        if !is_name(owner) || !is_name(repo) {
            return Err(malformed());
        }
        if reference.is_some_and(|r| r.is_empty() || r.contains(char::is_whitespace)) {
            return Err(malformed());
        }
        if subpath.split('/').any(|seg| seg == "..") || subpath.contains("//") {
            return Err(malformed());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            reference: reference.map(str::to_string),
            subpath: (!subpath.is_empty()).then(|| subpath.to_string()),
            checksum,
        })
    }

    /// Zip snapshot URL. Without a reference the archive of `HEAD` is used.
    pub fn archive_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/archive/{}.zip",
            self.owner,
            self.repo,
            self.reference.as_deref().unwrap_or("HEAD")
        )
    }
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", REMOTE_PREFIX, self.owner, self.repo)?;
        if let Some(reference) = &self.reference {
            write!(f, "@{}", reference)?;
        }
        if let Some(subpath) = &self.subpath {
            write!(f, "/{}", subpath)?;
        }
        if let Some(checksum) = &self.checksum {
            write!(f, "#{}{}", CHECKSUM_MARKER, checksum)?;
        }
        Ok(())
    }
}
