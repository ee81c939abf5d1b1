//! The classification pipeline: prompt → model call (with retry) → parsed results.
//!
//! - [`prompt`] — builds the token-lean request payload.
//! - [`client`] — [`ModelBackend`] trait and the Gemini HTTP backend.
//! - [`retry`] — jittered exponential backoff around a backend call.
//! - [`parser`] — aligns and validates the model's reply against the request.

pub mod client;
pub mod parser;
pub mod prompt;
pub mod retry;

use std::future::Future;

use futures::future::{AbortHandle, Abortable};
use tracing::info;

use crate::config::{Config, PromptConfig};
use crate::error::ClassifyError;
use crate::models::{ClassificationBatch, ColumnDescriptor, GenerationParams};
use client::ModelBackend;
use retry::RetryPolicy;

/// Runs one batch at a time against a model backend.
pub struct Classifier<B> {
    backend: B,
    retry: RetryPolicy,
    generation: GenerationParams,
    prompt: PromptConfig,
}

impl<B: ModelBackend> Classifier<B> {
    pub fn new(backend: B, config: &Config) -> Self {
        Self {
            backend,
            retry: RetryPolicy::from(&config.retry),
            generation: config.generation.clone(),
            prompt: config.prompt.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Classify every column of one batch.
    ///
    /// Either every column gets a result (possibly flagged) or the batch fails
    /// as a whole.
    pub async fn classify(
        &self,
        columns: &[ColumnDescriptor],
    ) -> Result<ClassificationBatch, ClassifyError> {
        let request = prompt::build_request(columns, &self.generation, &self.prompt)?;

        let raw = retry::with_backoff("generate", &self.retry, || {
            self.backend.generate(&request)
        })
        .await?;

        let results = parser::parse_response(&raw, &request.columns)?;
        let batch = ClassificationBatch {
            model: self.backend.model_name().to_string(),
            results,
        };
        info!(
            columns = batch.results.len(),
            flagged = batch.results.iter().filter(|r| r.is_flagged()).count(),
            "batch classified"
        );
        Ok(batch)
    }
}

/// Wrap a pending classification so the caller can abandon it.
///
/// Aborting drops the in-flight call; nothing partial is kept.
pub fn cancellable<F>(
    future: F,
) -> (impl Future<Output = Result<ClassificationBatch, ClassifyError>>, AbortHandle)
where
    F: Future<Output = Result<ClassificationBatch, ClassifyError>>,
{
    let (handle, registration) = AbortHandle::new_pair();
    let guarded = Abortable::new(future, registration);
    let fut = async move {
        match guarded.await {
            Ok(result) => result,
            Err(_aborted) => Err(ClassifyError::Cancelled),
        }
    };
    (fut, handle)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::client::ModelBackend;
    use crate::error::BackendError;
    use crate::models::ClassificationRequest;

    /// Backend that replays a fixed script of outcomes and records prompts.
    pub struct ScriptedBackend {
        pub script: Mutex<VecDeque<Result<String, BackendError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn new(script: Vec<Result<String, BackendError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &ClassificationRequest) -> Result<String, BackendError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Terminal("script exhausted".into())))
        }
    }
}
