//! Engine builder with validation.

use super::WorkflowEngine;
use crate::config::EngineConfig;
use crate::core::{StageEvent, StageId, STAGE_SEQUENCE};
use crate::effects::SideEffects;
use crate::errors::WorkflowError;
use crate::events::{EventBus, EventListener};
use crate::llm::{LlmExecutor, MissingLlmExecutor};
use crate::stages::{StageConfig, StageExecutor, StageRegistry};
use crate::store::ArtifactStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builder for [`WorkflowEngine`].
///
/// Every collaborator is injected here; nothing is read from globals. The
/// configuration defaults to [`EngineConfig::default`], not the environment.
pub struct WorkflowEngineBuilder {
    registry: StageRegistry,
    configs: BTreeMap<StageId, StageConfig>,
    sequence: Vec<StageId>,
    llm: Option<Arc<dyn LlmExecutor>>,
    store: Option<Arc<dyn ArtifactStore>>,
    hub: Option<Arc<EventBus>>,
    listeners: Vec<EventListener>,
    config: EngineConfig,
}

impl Default for WorkflowEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkflowEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngineBuilder")
            .field("registry", &self.registry)
            .field("sequence", &self.sequence)
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl WorkflowEngineBuilder {
    /// Creates a builder for the full ten-stage sequence.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: StageRegistry::new(),
            configs: BTreeMap::new(),
            sequence: STAGE_SEQUENCE.to_vec(),
            llm: None,
            store: None,
            hub: None,
            listeners: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    /// Registers the executor for a stage.
    #[must_use]
    pub fn executor(mut self, stage: StageId, executor: Arc<dyn StageExecutor>) -> Self {
        self.registry.register(stage, executor);
        self
    }

    /// Adds every executor of `registry`, replacing earlier registrations.
    #[must_use]
    pub fn registry(mut self, registry: StageRegistry) -> Self {
        self.registry = self.registry.merge(registry);
        self
    }

    /// Overrides the default settings of one stage.
    #[must_use]
    pub fn stage_config(mut self, config: StageConfig) -> Self {
        self.configs.insert(config.id, config);
        self
    }

    /// Sets the LLM executor handed to stages.
    #[must_use]
    pub fn llm(mut self, llm: Arc<dyn LlmExecutor>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Uses one shared artifact store for every run instead of a fresh one.
    #[must_use]
    pub fn artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Forwards every run's events to `bus`.
    #[must_use]
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.hub = Some(bus);
        self
    }

    /// Registers a listener for the events of every run.
    #[must_use]
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&StageEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs only `stages`. They must appear in canonical order.
    #[must_use]
    pub fn sequence(mut self, stages: impl IntoIterator<Item = StageId>) -> Self {
        self.sequence = stages.into_iter().collect();
        self
    }

    /// Validates and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Configuration`] if the sequence is empty or
    /// out of order, if review is present without draft, or if a stage of
    /// the sequence has no executor.
    pub fn build(self) -> Result<WorkflowEngine, WorkflowError> {
        if self.sequence.is_empty() {
            return Err(WorkflowError::Configuration("stage sequence is empty".into()));
        }
        if let Some(pair) = self.sequence.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(WorkflowError::Configuration(format!(
                "stage {} cannot follow {}",
                pair[1], pair[0]
            )));
        }
        if self.sequence.contains(&StageId::Review) && !self.sequence.contains(&StageId::Draft) {
            return Err(WorkflowError::Configuration(
                "review needs draft in the sequence to route revisions".into(),
            ));
        }

        let missing = self.registry.missing(&self.sequence);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
            return Err(WorkflowError::Configuration(format!(
                "no executor registered for: {}",
                names.join(", ")
            )));
        }

        let mut configs = self.configs;
        for stage in &self.sequence {
            configs
                .entry(*stage)
                .or_insert_with(|| StageConfig::default_for(*stage));
        }

        let hub = self.hub.unwrap_or_else(|| Arc::new(EventBus::broadcast_only()));
        for listener in self.listeners {
            hub.subscribe_arc(listener);
        }

        Ok(WorkflowEngine {
            registry: self.registry.seed_aware(),
            configs,
            sequence: self.sequence,
            llm: self.llm.unwrap_or_else(|| Arc::new(MissingLlmExecutor)),
            store: self.store,
            hub,
            config: self.config,
            effects: SideEffects::new(),
        })
    }
}
