use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Characters treated as range markers in front of a declared version.
const RANGE_MARKERS: &[char] = &['^', '~', '=', '>', '<', 'v', ' '];

/// A dependency as declared in `package.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub name: String,
    pub declared_version: String,
}

impl DependencyEntry {
    pub fn new(name: impl Into<String>, declared_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_version: declared_version.into(),
        }
    }

    /// The version sent to the vulnerability database.
    ///
    /// Leading range markers are stripped (`^2.1.0` -> `2.1.0`). This is not
    /// a range resolver: compound ranges and protocol specifiers such as
    /// `workspace:*` come back unchanged apart from that stripping.
    pub fn normalized_version(&self) -> String {
        normalize_version(&self.declared_version)
    }

    /// True when the normalized version is a concrete semantic version.
    pub fn is_resolved(&self) -> bool {
        semver::Version::parse(&self.normalized_version()).is_ok()
    }
}

/// Strips leading range markers from a declared version string.
pub fn normalize_version(declared: &str) -> String {
    declared
        .trim()
        .trim_start_matches(RANGE_MARKERS)
        .trim()
        .to_string()
}

/// The parts of `package.json` this crate reads.
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    dependencies: Option<Map<String, Value>>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: Option<Map<String, Value>>,
}

impl Manifest {
    /// Parses a manifest from its JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Production and development dependencies merged in declaration order.
    ///
    /// A development entry that repeats a production name replaces its
    /// version but keeps the production position. Entries whose version is
    /// not a string are skipped.
    pub fn dependencies(&self) -> Vec<DependencyEntry> {
        let mut merged: Map<String, Value> = Map::new();
        for table in [&self.dependencies, &self.dev_dependencies]
            .into_iter()
            .flatten()
        {
            for (name, version) in table {
                merged.insert(name.clone(), version.clone());
            }
        }

        merged
            .into_iter()
            .filter_map(|(name, version)| {
                version
                    .as_str()
                    .map(|v| DependencyEntry::new(name.as_str(), v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_range_markers() {
        assert_eq!(normalize_version("^2.1.0"), "2.1.0");
        assert_eq!(normalize_version("~1.0.3"), "1.0.3");
        assert_eq!(normalize_version(">=4.17.21"), "4.17.21");
        assert_eq!(normalize_version("v1.2.3"), "1.2.3");
        assert_eq!(normalize_version("1.2.3"), "1.2.3");
    }

    #[test]
    fn test_normalize_leaves_unresolvable_ranges() {
        let entry = DependencyEntry::new("internal", "workspace:*");
        assert_eq!(entry.normalized_version(), "workspace:*");
        assert!(!entry.is_resolved());

        let entry = DependencyEntry::new("lodash", ">=1.0.0 <2.0.0");
        assert_eq!(entry.normalized_version(), "1.0.0 <2.0.0");
        assert!(!entry.is_resolved());

        assert!(DependencyEntry::new("left-pad", "^1.3.0").is_resolved());
    }

    #[test]
    fn test_manifest_merges_in_declaration_order() {
        let manifest = Manifest::from_json(
            r#"{
                "name": "portal",
                "dependencies": { "zod": "^3.0.0", "axios": "1.6.0" },
                "devDependencies": { "jest": "^29.0.0", "axios": "~1.7.0" }
            }"#,
        )
        .unwrap();

        let deps = manifest.dependencies();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zod", "axios", "jest"]);
        assert_eq!(deps[1].declared_version, "~1.7.0");
        assert_eq!(manifest.name.as_deref(), Some("portal"));
    }

    #[test]
    fn test_manifest_without_dependencies() {
        let manifest = Manifest::from_json(r#"{ "name": "empty" }"#).unwrap();
        assert!(manifest.dependencies().is_empty());
    }

    #[test]
    fn test_manifest_skips_non_string_versions() {
        let manifest =
            Manifest::from_json(r#"{ "dependencies": { "a": "1.0.0", "b": { "x": 1 } } }"#)
                .unwrap();
        assert_eq!(manifest.dependencies(), vec![DependencyEntry::new("a", "1.0.0")]);
    }
}
