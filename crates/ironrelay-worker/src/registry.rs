//! Job registry: maps job names to handlers.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use ironrelay_core::error::AppError;
use ironrelay_entity::job::JobPayload;

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + fmt::Debug {
    /// Run the job with the arguments it was enqueued with.
    async fn execute(&self, payload: &JobPayload) -> Result<(), JobExecutionError>;
}

/// Error from job execution. Every variant counts as a failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// No handler is registered under the job's name.
    #[error("No handler registered for job '{0}'")]
    UnknownHandler(String),

    /// The handler reported a failure or panicked.
    #[error("{0}")]
    Handler(String),

    /// Network failure or timeout talking to a remote endpoint.
    #[error("{0}")]
    Transport(String),

    /// Store error inside a handler.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

/// Decode positional argument `index`.
pub fn arg<T: DeserializeOwned>(payload: &JobPayload, index: usize) -> Result<T, JobExecutionError> {
    let value = payload
        .arg(index)
        .ok_or_else(|| JobExecutionError::handler(format!("Missing positional argument {index}")))?;
    serde_json::from_value(value.clone()).map_err(|e| {
        JobExecutionError::handler(format!("Invalid positional argument {index}: {e}"))
    })
}

/// Decode named argument `key`.
pub fn kwarg<T: DeserializeOwned>(payload: &JobPayload, key: &str) -> Result<T, JobExecutionError> {
    let value = payload
        .kwarg(key)
        .ok_or_else(|| JobExecutionError::handler(format!("Missing named argument '{key}'")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| JobExecutionError::handler(format!("Invalid named argument '{key}': {e}")))
}

/// Adapts a plain async function into a [`JobHandler`].
struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobPayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobExecutionError>> + Send + 'static,
{
    async fn execute(&self, payload: &JobPayload) -> Result<(), JobExecutionError> {
        (self.f)(payload.clone()).await
    }
}

/// A named handler, ready to register.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    handler: Arc<dyn JobHandler>,
}

impl Task {
    pub fn new(name: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Wrap an async function taking the job payload.
    pub fn from_fn<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn(JobPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobExecutionError>> + Send + 'static,
    {
        Self::new(name, Arc::new(FnHandler { name, f }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

}

/// Build a [`Task`] from an async fn, named after the fn and the module
/// the macro is invoked in. Invoke it next to the handler definition so the
/// name is stable wherever the task is registered.
///
/// ```ignore
/// async fn send_receipt(payload: JobPayload) -> Result<(), JobExecutionError> { Ok(()) }
///
/// pub fn send_receipt_task() -> Task {
///     task!(send_receipt)
/// }
/// ```
#[macro_export]
macro_rules! task {
    ($handler:ident) => {
        $crate::registry::Task::from_fn(
            concat!(module_path!(), "::", stringify!($handler)),
            $handler,
        )
    };
}

/// Name-to-handler table. Built at startup, read-only afterwards.
#[derive(Debug, Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. A name can only be registered once.
    pub fn register(&mut self, task: Task) -> Result<(), AppError> {
        if self.handlers.contains_key(&task.name) {
            return Err(AppError::conflict(format!(
                "Job '{}' is already registered",
                task.name
            )));
        }
        tracing::info!("Registered job handler '{}'", task.name);
        self.handlers.insert(task.name, task.handler);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn JobHandler>, JobExecutionError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| JobExecutionError::UnknownHandler(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
