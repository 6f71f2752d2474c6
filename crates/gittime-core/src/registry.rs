//! Feature registry: the validated classifier output for one session.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::collaborators::FeatureClassifier;
use crate::domain::{Feature, FeatureCandidate, FeatureId, PipelineError, Result};
use crate::snapshot::RepoSnapshot;

/// Features of one repository, in classifier order. Immutable once built.
///
/// An empty registry with a [`failure_reason`](Self::failure_reason) is the
/// classification-failure state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeatureRegistry {
    features: Vec<Feature>,
    #[serde(skip)]
    index: HashMap<FeatureId, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl FeatureRegistry {
    /// Run the classifier over `snapshot`. Never fails.
    pub async fn classify(classifier: &dyn FeatureClassifier, snapshot: &RepoSnapshot) -> Self {
        match classifier.classify(snapshot).await {
            Ok(candidates) => {
                let registry = Self::from_candidates(candidates);
                if registry.is_empty() {
                    return Self::failed("classifier returned no usable features");
                }
                info!(repo = %snapshot.repo, features = registry.len(), "features classified");
                registry
            }
            Err(err) => {
                warn!(repo = %snapshot.repo, error = %err, "feature classification failed");
                Self::failed(err.to_string())
            }
        }
    }

    /// Validate raw candidates. Candidates without files and duplicate ids
    /// are dropped with a warning.
    pub fn from_candidates(candidates: Vec<FeatureCandidate>) -> Self {
        let mut registry = Self::default();
        for candidate in candidates {
            let name = candidate.name.clone();
            if name.trim().is_empty() {
                warn!("dropping unnamed feature candidate");
                continue;
            }
            match Feature::try_from(candidate) {
                Ok(feature) => registry.insert(feature),
                Err(err) => warn!(feature = %name, error = %err, "dropping feature candidate"),
            }
        }
        registry
    }

    /// Registry over already-validated features, e.g. ones a caller kept
    /// from an earlier classification. Duplicate ids keep the first.
    pub fn from_features(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut registry = Self::default();
        for feature in features {
            registry.insert(feature);
        }
        registry
    }

    fn insert(&mut self, feature: Feature) {
        if self.index.contains_key(feature.id()) {
            warn!(feature = %feature.name(), id = %feature.id(), "dropping duplicate feature");
            return;
        }
        self.index.insert(feature.id().clone(), self.features.len());
        self.features.push(feature);
    }

    /// Empty registry recording why classification failed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.index.get(id).map(|&i| &self.features[i])
    }

    /// Like [`get`](Self::get), but an unknown id is an error.
    pub fn require(&self, id: &FeatureId) -> Result<&Feature> {
        self.get(id)
            .ok_or_else(|| PipelineError::FeatureNotFound(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}
