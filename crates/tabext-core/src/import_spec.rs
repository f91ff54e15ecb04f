//! Import specifications: line-oriented `<location> -> <name>` text.
//!
//! ```text
//! # comments and blank lines are ignored
//! ~/extensions/geometry        -> circle.area
//! ~/extensions/geometry        -> circle.circumference
//! github:tabext/extensions@v1  -> npv
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::source::{ExtensionLocation, LocationResolver};
use crate::types::{QualifiedName, SPEC_SEPARATOR};

#[derive(Debug)]
struct SpecEntry {
    location: usize,
    name: String,
}

/// One install instruction produced from a spec line.
#[derive(Debug)]
pub struct InstallDirective<'a> {
    pub location: &'a ExtensionLocation,
    pub target: QualifiedName,
}

/// A parsed import specification.
///
/// Lines sharing a location text share one [`ExtensionLocation`], so the
/// files are staged at most once. Call [`ImportSpec::release`] when done.
#[derive(Debug)]
pub struct ImportSpec {
    locations: Vec<ExtensionLocation>,
    entries: Vec<SpecEntry>,
}

/// Split a spec line into `(location, name)`, or `None` if it is not a directive.
pub fn split_spec_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split(SPEC_SEPARATOR);
    let (Some(location), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    let (location, name) = (location.trim(), name.trim());
    if location.is_empty() || name.is_empty() {
        return None;
    }
    Some((location, name))
}

pub fn format_spec_line(location: &str, name: &str) -> String {
    format!("{} {} {}", location, SPEC_SEPARATOR, name)
}

impl ImportSpec {
    pub fn parse(text: &str, resolver: &LocationResolver) -> Self {
        let mut locations = Vec::new();
        let mut by_text: HashMap<String, usize> = HashMap::new();
        let mut entries = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let Some((location, name)) = split_spec_line(line) else {
                if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                    debug!(line = idx + 1, text = line, "Ignoring malformed spec line");
                }
                continue;
            };
            let slot = *by_text.entry(location.to_string()).or_insert_with(|| {
                locations.push(resolver.locate(location));
                locations.len() - 1
            });
            entries.push(SpecEntry {
                location: slot,
                name: name.to_string(),
            });
        }

        Self { locations, entries }
    }

    /// Install directives in line order. Each call starts a fresh pass; a
    /// name is validated only when its line is reached.
    pub fn directives(&self) -> impl Iterator<Item = Result<InstallDirective<'_>>> + '_ {
        self.entries.iter().map(|entry| {
            Ok(InstallDirective {
                location: &self.locations[entry.location],
                target: QualifiedName::parse(&entry.name)?,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct locations referenced.
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// Delete every staged location. All locations are released even if one
    /// fails; the first failure is returned.
    pub fn release(&self) -> Result<()> {
        let mut first_error = None;
        for location in &self.locations {
            if let Err(e) = location.release()
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtensionError;
    use crate::source::{ArchiveFetcher, LocationResolver};
    use std::rc::Rc;

    #[derive(Debug)]
    struct NoNetwork;

    impl ArchiveFetcher for NoNetwork {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(ExtensionError::Download {
                url: url.to_string(),
                message: "offline".to_string(),
                retryable: false,
            })
        }
    }

    fn resolver() -> LocationResolver {
        LocationResolver::new(Rc::new(NoNetwork), "tbx")
    }

    #[test]
    fn test_comment_and_blank_lines_ignored() {
        let spec = ImportSpec::parse("/pkg/path -> mycol.myfunc\n# comment\n\n", &resolver());
        let directives: Vec<_> = spec.directives().collect::<Result<_>>().unwrap();

        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].target, QualifiedName::new("mycol", "myfunc"));
        assert_eq!(directives[0].location.descriptor(), "/pkg/path");
    }

    #[test]
    fn test_shared_locations_are_deduplicated() {
        let text = "/ext -> a\n/ext -> b\n/other -> c\n";
        let spec = ImportSpec::parse(text, &resolver());
        assert_eq!(spec.len(), 3);
        assert_eq!(spec.location_count(), 2);

        let directives: Vec<_> = spec.directives().collect::<Result<_>>().unwrap();
        assert!(std::ptr::eq(directives[0].location, directives[1].location));
        assert!(!std::ptr::eq(directives[0].location, directives[2].location));
    }

    #[test]
    fn test_lines_without_two_parts_are_ignored() {
        let text = "just-a-path\n/a -> b -> c\n -> name\n/path -> \n/ok->fine\n";
        let spec = ImportSpec::parse(text, &resolver());
        let directives: Vec<_> = spec.directives().collect::<Result<_>>().unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].target.name, "fine");
        assert_eq!(directives[0].location.descriptor(), "/ok");
    }

    #[test]
    fn test_invalid_name_fails_only_its_line() {
        let spec = ImportSpec::parse("/a -> x.y.z\n/a -> good\n", &resolver());
        let results: Vec<_> = spec.directives().collect();
        assert!(matches!(
            results[0],
            Err(ExtensionError::InvalidExtensionName(_))
        ));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_directives_are_restartable() {
        let spec = ImportSpec::parse("/a -> one\n/b -> two\n", &resolver());
        assert_eq!(spec.directives().count(), 2);
        assert_eq!(spec.directives().count(), 2);
    }

    #[test]
    fn test_provenance_line_round_trips() {
        let line = format_spec_line("github:tabext/extensions@v1", "circle.area");
        assert_eq!(line, "github:tabext/extensions@v1 -> circle.area");
        assert_eq!(
            split_spec_line(&line),
            Some(("github:tabext/extensions@v1", "circle.area"))
        );
    }

    #[test]
    fn test_release_without_staging_is_noop() {
        let spec = ImportSpec::parse("/a -> one\n", &resolver());
        spec.release().unwrap();
    }
}
