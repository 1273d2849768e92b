//! Explicit registration of job handlers.
//!
//! Handlers are registered up front instead of being discovered by runtime
//! reflection; the scan resolves each registration to a stable job name that
//! the desired schedule refers to.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::error::{SchedulerError, SchedulerResult};

/// A job body: invoked once per timer firing, fire-and-forget.
pub type JobHandler = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct HandlerRegistration {
    owner: &'static str,
    method: &'static str,
    name: Option<&'static str>,
    handler: JobHandler,
}

impl HandlerRegistration {
    /// Explicit name, or the `<owner>#<method>` fallback.
    fn job_name(&self) -> String {
        match self.name {
            Some(name) => name.to_string(),
            None => format!("{}#{}", self.owner, self.method),
        }
    }
}

/// Collects job handler registrations and resolves them to a name → handler
/// map, used once per process lifetime.
#[derive(Default)]
pub struct JobScanner {
    registrations: Vec<HandlerRegistration>,
}

impl JobScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under the `<owner>#<method>` fallback name.
    pub fn register<F, Fut>(self, owner: &'static str, method: &'static str, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(owner, method, None, handler)
    }

    /// Register a handler under an explicit job name. Required when the same
    /// owner type contributes more than one job body with the same method
    /// name.
    pub fn register_named<F, Fut>(
        self,
        name: &'static str,
        owner: &'static str,
        method: &'static str,
        handler: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.push(owner, method, Some(name), handler)
    }

    fn push<F, Fut>(
        mut self,
        owner: &'static str,
        method: &'static str,
        name: Option<&'static str>,
        handler: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.registrations.push(HandlerRegistration {
            owner,
            method,
            name,
            handler: Arc::new(move || handler().boxed()),
        });
        self
    }

    /// Resolve every registration to its job name.
    ///
    /// Fails with [`SchedulerError::DuplicateJobName`] when two registrations
    /// resolve to the same name; an ambiguous fallback must be replaced with
    /// explicit names.
    pub fn scan(&self) -> SchedulerResult<HashMap<String, JobHandler>> {
        let mut handlers = HashMap::with_capacity(self.registrations.len());
        for registration in &self.registrations {
            let name = registration.job_name();
            debug!(
                job = %name,
                owner = registration.owner,
                method = registration.method,
                "discovered job handler"
            );
            if handlers.insert(name.clone(), registration.handler.clone()).is_some() {
                return Err(SchedulerError::DuplicateJobName(name));
            }
        }
        Ok(handlers)
    }
}
