//! Driver selector (C6)
//!
//! Generalizes the teacher's `ProviderType`/`ProviderConfig`/`create_driver`
//! enum-dispatch idiom (`everruns-core/src/llm_drivers.rs`) into tag-set
//! scoring: any number of driver factories can be registered, each
//! advertising a set of capability tags, and selection picks the
//! best-scoring match rather than switching on a fixed provider enum.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;

/// Options passed through to a driver on each call. Prompt compilation
/// happens outside the engine (spec §6.3); this is whatever knobs the
/// driver itself exposes (temperature, max tokens, etc.) as opaque JSON.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DriverOptions {
    pub params: serde_json::Value,
}

/// What a driver call returns. `structured_output` is populated only when
/// the caller asked for (and the provider supports) structured decoding.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DriverResponse {
    pub content: String,
    pub structured_output: Option<serde_json::Value>,
}

/// The external AI backend interface the engine consumes. A single
/// non-streaming call per `query` — see `pondkeep-driver-openai`/
/// `pondkeep-driver-anthropic` for concrete implementations.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn query(
        &self,
        prompt: &str,
        options: DriverOptions,
    ) -> Result<DriverResponse, EngineError>;
}

/// Constructs a [`Driver`] instance on demand. Kept separate from `Driver`
/// itself so that selection (picking a factory) and instantiation
/// (constructing a live client) are distinct steps, matching spec §4.6's
/// `select(criteria) → factory` / `create(factory) → Driver` split.
pub trait DriverFactory: Send + Sync {
    fn tags(&self) -> &HashSet<String>;
    fn create(&self) -> Arc<dyn Driver>;
}

/// Selection criteria: all of `required` must be present on a candidate;
/// `preferred` breaks ties by score (size of the intersection).
#[derive(Debug, Clone, Default)]
pub struct DriverCriteria {
    pub required: Vec<String>,
    pub preferred: Vec<String>,
}

impl DriverCriteria {
    pub fn require(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required: tags.into_iter().map(Into::into).collect(),
            preferred: Vec::new(),
        }
    }

    pub fn prefer(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.preferred = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Holds every registered driver factory. Immutable once the engine
/// transitions to `running` (spec §9 "Registry immutability"); reads are
/// lock-free.
pub struct DriverRegistry {
    factories: Vec<Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        self.factories.push(factory);
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// A snapshot of every registered factory, in registration order. Used
    /// to build the per-execution [`crate::context::DriverFactoryHandle`]
    /// once the registry is frozen at `start`.
    pub fn list_factories(&self) -> Vec<Arc<dyn DriverFactory>> {
        self.factories.clone()
    }

    /// Evaluate `criteria` against every registered factory, in
    /// registration order, and return the best match.
    pub fn select(&self, criteria: &DriverCriteria) -> Result<Arc<dyn DriverFactory>, EngineError> {
        let mut best: Option<(usize, &Arc<dyn DriverFactory>)> = None;
        for factory in &self.factories {
            let tags = factory.tags();
            let satisfies_required = criteria.required.iter().all(|tag| tags.contains(tag));
            if !satisfies_required {
                continue;
            }
            let score = criteria
                .preferred
                .iter()
                .filter(|tag| tags.contains(*tag))
                .count();
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, factory)),
            }
        }
        best.map(|(_, factory)| factory.clone())
            .ok_or_else(|| EngineError::NoSuitableDriver(criteria.required.clone()))
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
