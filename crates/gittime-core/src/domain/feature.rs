//! Features extracted by the classifier.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::PipelineError;

/// Session-stable feature identifier derived from the feature name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub String);

impl FeatureId {
    /// Wrap an id as given, e.g. from the command line.
    pub fn new(id: impl Into<String>) -> Self {
        FeatureId(id.into())
    }

    /// First 10 hex chars of SHA-256 over the lowercased name.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.trim().to_lowercase().as_bytes());
        let digest = hex::encode(hasher.finalize());
        FeatureId(digest[..10].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw classifier output, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCandidate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// A logical capability of the repository and the files that implement it.
///
/// Never mutated after construction; the file set is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    id: FeatureId,
    name: String,
    description: String,
    files: BTreeSet<String>,
}

impl Feature {
    pub fn new<I, S>(name: &str, description: &str, files: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let files: BTreeSet<String> = files
            .into_iter()
            .map(Into::into)
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        if files.is_empty() {
            return Err(PipelineError::EmptyFileSet(name.to_string()));
        }

        Ok(Self {
            id: FeatureId::from_name(name),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            files,
        })
    }

    pub fn id(&self) -> &FeatureId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }
}

impl TryFrom<FeatureCandidate> for Feature {
    type Error = PipelineError;

    fn try_from(candidate: FeatureCandidate) -> Result<Self, Self::Error> {
        Feature::new(&candidate.name, &candidate.description, candidate.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_id_is_case_insensitive_and_short() {
        let a = FeatureId::from_name("Dark Mode Toggle");
        let b = FeatureId::from_name("dark mode toggle ");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 10);
        assert_ne!(a, FeatureId::from_name("Light Mode Toggle"));
    }

    #[test]
    fn test_feature_rejects_empty_file_set() {
        let err = Feature::new("Ghost", "nothing", Vec::<String>::new()).unwrap_err();
        assert_eq!(err, PipelineError::EmptyFileSet("Ghost".into()));

        let err = Feature::new("Blank", "", vec!["  ", ""]).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyFileSet(_)));
    }

    #[test]
    fn test_feature_dedupes_files() {
        let f = Feature::new("Parser", "parses", vec!["src/a.rs", "src/a.rs", " src/b.rs"]).unwrap();
        assert_eq!(f.files().len(), 2);
        assert!(f.files().contains("src/b.rs"));
    }
}
