use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::config::settings::JobDefinitionConfig;
use crate::jobs::definition::{JobDefinition, JobUnit};
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::tasks::InstanceReportTask;
use crate::jobs::types::JobTask;

type TaskFactory = Box<dyn Fn(JsonValue) -> JobResult<Arc<dyn JobTask>> + Send + Sync>;

/// Task types by name, plus the job definitions loaded so far.
///
/// Definitions arrive from code through [`JobRegistry::discover`] and from
/// configuration through [`JobRegistry::load_definitions`]. Invalid or
/// duplicate definitions are rejected without affecting the others.
pub struct JobRegistry {
    factories: HashMap<String, TaskFactory>,
    definitions: Vec<JobDefinition>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            definitions: Vec::new(),
        }
    }

    /// Registry with the task types shipped with the crate.
    pub fn with_builtin_tasks() -> Self {
        let mut registry = Self::new();
        registry.register::<InstanceReportTask>();
        registry
    }

    /// Register a task type with the registry
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: JobTask + DeserializeOwned + 'static,
    {
        let factory: TaskFactory = Box::new(|payload: JsonValue| {
            let task: T = serde_json::from_value(payload)?;
            Ok(Arc::new(task) as Arc<dyn JobTask>)
        });

        self.factories.insert(T::task_type().to_string(), factory);
        self
    }

    /// Create a task instance from task type and payload
    pub fn create_task(&self, task_type: &str, payload: JsonValue) -> JobResult<Arc<dyn JobTask>> {
        let factory = self
            .factories
            .get(task_type)
            .ok_or_else(|| JobError::UnknownTaskType(task_type.to_string()))?;

        factory(payload)
    }

    /// Add a validated definition, rejecting duplicate names.
    pub fn add(&mut self, definition: JobDefinition) -> JobResult<()> {
        if self.definitions.iter().any(|d| d.name == definition.name) {
            return Err(JobError::AlreadyExists(definition.name));
        }

        tracing::debug!(
            job = %definition.name,
            schedule = %definition.schedule,
            leader_only = definition.leader_only,
            "Job loaded"
        );
        self.definitions.push(definition);
        Ok(())
    }

    /// Register a job contributed by code; its name comes from `unit.source`.
    pub fn discover(&mut self, unit: JobUnit) -> JobResult<()> {
        let source = unit.source.clone();
        let result = unit.into_definition().and_then(|definition| self.add(definition));
        if let Err(e) = &result {
            tracing::warn!(source = %source, error = %e, "Skipping job");
        }
        result
    }

    /// Build definitions from configuration. Returns how many were loaded;
    /// rejected entries are logged and skipped.
    pub fn load_definitions(&mut self, configs: &[JobDefinitionConfig]) -> usize {
        let mut loaded = 0;
        for config in configs {
            match self.build(config).and_then(|definition| self.add(definition)) {
                Ok(()) => loaded += 1,
                Err(e) => tracing::warn!(job = %config.name, error = %e, "Skipping job"),
            }
        }
        loaded
    }

    fn build(&self, config: &JobDefinitionConfig) -> JobResult<JobDefinition> {
        let payload = config
            .payload
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let task = self.create_task(&config.task_type, payload)?;

        JobDefinition::new(&config.name, &config.schedule, task)?
            .leader_only(config.leader_only)
            .with_lock_ttl(config.lock_ttl_ms)
    }

    pub fn definitions(&self) -> &[JobDefinition] {
        &self.definitions
    }

    pub fn into_definitions(self) -> Vec<JobDefinition> {
        self.definitions
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
