//! Core data types for repositories, dependencies, findings and reports.
//!
//! - [`RepositoryReference`] - A parsed GitHub repository URL
//! - [`DependencyEntry`] - A dependency declared in `package.json`
//! - [`Finding`] - A dependency with known vulnerabilities
//! - [`ScanOutcome`] - Tagged result of the scan stage
//! - [`ScanResult`] - JSON form of a scan outcome
//! - [`Report`] - The narrated report
//!
//! # Example
//!
//! ```
//! use repoaudit::RepositoryReference;
//!
//! let repo = RepositoryReference::parse("https://github.com/acme/portal", "main").unwrap();
//! assert_eq!(repo.branch, "main");
//! ```

mod dependency;
mod finding;
mod repository;

pub use dependency::*;
pub use finding::*;
pub use repository::*;
