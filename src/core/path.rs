//! Delimiter-agnostic container paths
//!
//! Accepts both `/` and `\` as separators. The first separator found in the
//! input decides how the path is rendered back (default `/`).

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

const DEFAULT_DELIMITER: char = '/';

fn delimiter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[/\\]").expect("delimiter pattern is valid"))
}

/// A parsed path inside a container
///
/// The root path has no components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerPath {
    delimiter: char,
    components: Vec<String>,
}

impl ContainerPath {
    /// Parse a path string
    ///
    /// # Examples
    ///
    /// ```
    /// use cdfs::ContainerPath;
    ///
    /// let path = ContainerPath::parse(r"\docs\report.txt");
    /// assert_eq!(path.name(), "report.txt");
    /// assert_eq!(path.parent().unwrap().to_string(), r"\docs");
    /// ```
    pub fn parse(path: &str) -> Self {
        let pattern = delimiter_pattern();
        let delimiter = pattern
            .find(path)
            .and_then(|m| m.as_str().chars().next())
            .unwrap_or(DEFAULT_DELIMITER);

        let normalized = if path.starts_with(delimiter) {
            path.to_string()
        } else {
            format!("{}{}", delimiter, path)
        };

        let components = pattern
            .split(&normalized)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();

        ContainerPath {
            delimiter,
            components,
        }
    }

    pub fn root() -> Self {
        ContainerPath {
            delimiter: DEFAULT_DELIMITER,
            components: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of components (zero for the root)
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Last component, or `""` for the root
    pub fn name(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or("")
    }

    /// Path without its last component; `None` only for the root
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.components.split_last()?;
        Some(ContainerPath {
            delimiter: self.delimiter,
            components: init.to_vec(),
        })
    }

    /// Append a component, keeping this path's delimiter
    pub fn join(&self, name: &str) -> Self {
        let mut components = self.components.clone();
        components.push(name.to_string());
        ContainerPath {
            delimiter: self.delimiter,
            components,
        }
    }

    /// Component-wise prefix test (a path starts with itself)
    pub fn starts_with(&self, other: &ContainerPath) -> bool {
        self.components.starts_with(&other.components)
    }
}

impl fmt::Display for ContainerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "{}", self.delimiter);
        }
        for component in &self.components {
            write!(f, "{}{}", self.delimiter, component)?;
        }
        Ok(())
    }
}

impl From<&str> for ContainerPath {
    fn from(path: &str) -> Self {
        ContainerPath::parse(path)
    }
}
