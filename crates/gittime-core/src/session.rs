//! Analysis session: one repository, its features and their evolutions.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{CacheKey, SessionCache};
use crate::collaborators::{FeatureClassifier, HostingApi, Summarizer};
use crate::config::PipelineConfig;
use crate::domain::{Feature, FeatureEvolution, FeatureId, RepoRef, Result, VersionEntry};
use crate::history::HistoryStore;
use crate::metrics::METRICS;
use crate::narrator::EvolutionNarrator;
use crate::obs;
use crate::registry::FeatureRegistry;
use crate::relevance;
use crate::timeline::{release_points, version_timeline};

/// Random identifier tagging a session's tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External capabilities a session is opened with.
#[derive(Clone)]
pub struct Collaborators {
    pub hosting: Arc<dyn HostingApi>,
    pub classifier: Arc<dyn FeatureClassifier>,
    pub summarizer: Arc<dyn Summarizer>,
}

/// Explicit context for analysing one repository.
///
/// Owns the history store, the feature registry, the narrator and the
/// evolution cache. Nothing is shared between sessions.
pub struct AnalysisSession {
    id: SessionId,
    history: Arc<HistoryStore>,
    registry: FeatureRegistry,
    narrator: Arc<EvolutionNarrator>,
    cache: SessionCache,
}

impl AnalysisSession {
    /// Load history, collect the snapshot and classify features.
    ///
    /// A classifier failure does not fail the session; it leaves the
    /// registry empty with a failure reason.
    pub async fn open(
        collaborators: Collaborators,
        repo: RepoRef,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let id = SessionId::new();
        let span = obs::session_span(&id.to_string(), &repo.to_string());

        async move {
            let history = HistoryStore::load(
                collaborators.hosting,
                repo,
                config.history.clone(),
                config.retry.clone(),
            )
            .await?;
            let snapshot = history.snapshot().await;
            let registry =
                FeatureRegistry::classify(collaborators.classifier.as_ref(), &snapshot).await;
            let narrator = EvolutionNarrator::new(collaborators.summarizer, config.narrator.clone());

            obs::emit_session_opened(
                &id.to_string(),
                &history.repo().to_string(),
                history.commits().len(),
                registry.len(),
            );

            let mut session = Self::new(Arc::new(history), registry, Arc::new(narrator));
            session.id = id;
            Ok(session)
        }
        .instrument(span)
        .await
    }

    /// Load history for caller-supplied features without classifying.
    ///
    /// Feature ids only hold within one classification, so a caller that
    /// kept a feature definition from an earlier run opens a session over
    /// that definition instead of looking the id up in a fresh registry.
    pub async fn open_with_features(
        hosting: Arc<dyn HostingApi>,
        summarizer: Arc<dyn Summarizer>,
        repo: RepoRef,
        features: Vec<Feature>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let id = SessionId::new();
        let span = obs::session_span(&id.to_string(), &repo.to_string());

        async move {
            let history =
                HistoryStore::load(hosting, repo, config.history.clone(), config.retry.clone())
                    .await?;
            let registry = FeatureRegistry::from_features(features);
            let narrator = EvolutionNarrator::new(summarizer, config.narrator.clone());

            obs::emit_session_opened(
                &id.to_string(),
                &history.repo().to_string(),
                history.commits().len(),
                registry.len(),
            );

            let mut session = Self::new(Arc::new(history), registry, Arc::new(narrator));
            session.id = id;
            Ok(session)
        }
        .instrument(span)
        .await
    }

    /// Assemble a session from already-built parts.
    pub fn new(
        history: Arc<HistoryStore>,
        registry: FeatureRegistry,
        narrator: Arc<EvolutionNarrator>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            history,
            registry,
            narrator,
            cache: SessionCache::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn repo(&self) -> &RepoRef {
        self.history.repo()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.registry.iter()
    }

    /// Evolution of one feature, computed once per session.
    ///
    /// Concurrent calls for the same feature share a single computation.
    pub async fn evolution(&self, feature_id: &FeatureId) -> Result<Arc<FeatureEvolution>> {
        let feature = self.registry.require(feature_id)?.clone();
        let key = CacheKey::new(self.repo().clone(), feature_id.clone());
        let history = Arc::clone(&self.history);
        let narrator = Arc::clone(&self.narrator);
        let span = obs::session_span(&self.id.to_string(), &self.repo().to_string());

        self.cache
            .get_or_compute(
                key,
                compute_evolution(history, narrator, feature).instrument(span),
            )
            .await
    }

    /// The feature's evolution grouped under the releases that shipped it.
    pub async fn timeline(&self, feature_id: &FeatureId) -> Result<Vec<VersionEntry>> {
        let evolution = self.evolution(feature_id).await?;
        let points = release_points(
            self.history.releases(),
            self.history.tags(),
            self.history.commits(),
        );
        Ok(version_timeline(&evolution, &points))
    }
}

async fn compute_evolution(
    history: Arc<HistoryStore>,
    narrator: Arc<EvolutionNarrator>,
    feature: Feature,
) -> Result<FeatureEvolution> {
    let started = Instant::now();
    let repo = history.repo().to_string();
    obs::emit_evolution_started(&repo, feature.id().as_str(), feature.files().len());

    let candidates = history.history_for(feature.files()).await?;
    let relevant = relevance::select(&candidates, feature.files());
    let entries = narrator.narrate(&feature, relevant).await;
    let evolution = FeatureEvolution::new(feature.id().clone(), entries);

    METRICS.inc_evolutions_computed();
    obs::emit_evolution_finished(
        &repo,
        feature.id().as_str(),
        evolution.commit_count(),
        evolution.degraded_count(),
        started.elapsed().as_millis() as u64,
    );
    Ok(evolution)
}
