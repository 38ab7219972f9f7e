//! Compile-and-run side of the scripting layer.
//!
//! A [`ScriptExecutor`] is shared by every provider adapter bound to one
//! browser surface. Each `run` consumes its chain by value: the chain is
//! compiled, shipped across the surface boundary exactly once, and cannot be
//! reused afterwards, so a failed run can never leak statements into the
//! next one. A run lock serializes submissions from independent call sites.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::script::builder::ScriptChain;
use crate::surface::{BrowserSurface, SurfaceError};

/// Errors surfaced while executing a compiled chain.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The surface rejected or failed the submission, including exceptions
    /// thrown inside the injected script (element-wait timeouts among them).
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("failed to decode script result: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}

/// Runs compiled chains against one shared browser surface.
pub struct ScriptExecutor {
    surface: Arc<dyn BrowserSurface>,
    run_lock: Mutex<()>,
}

impl ScriptExecutor {
    pub fn new(surface: Arc<dyn BrowserSurface>) -> Self {
        Self {
            surface,
            run_lock: Mutex::new(()),
        }
    }

    pub fn surface(&self) -> &Arc<dyn BrowserSurface> {
        &self.surface
    }

    /// Compile and run a chain, decoding its return value.
    ///
    /// Scripts without a return value yield `null`, which decodes into `()`.
    pub async fn run<T>(&self, chain: ScriptChain) -> Result<T, ScriptError>
    where
        T: DeserializeOwned,
    {
        let script = chain.compile(false);
        let value = self.submit(&script).await?;
        serde_json::from_value(value).map_err(|source| ScriptError::Decode { source })
    }

    /// Compile and run a chain, returning all named results as one object.
    pub async fn run_all(&self, chain: ScriptChain) -> Result<JsonValue, ScriptError> {
        let script = chain.compile(true);
        self.submit(&script).await
    }

    /// Submit an already-compiled script under the run lock.
    pub async fn submit(&self, script: &str) -> Result<JsonValue, ScriptError> {
        let _guard = self.run_lock.lock().await;
        Ok(self.surface.execute_script(script).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Surface double that records submitted scripts and replays queued
    /// responses in order.
    #[derive(Default)]
    struct ScriptedSurface {
        submitted: StdMutex<Vec<String>>,
        responses: StdMutex<Vec<Result<JsonValue, String>>>,
    }

    impl ScriptedSurface {
        fn with_responses(responses: Vec<Result<JsonValue, String>>) -> Self {
            Self {
                submitted: StdMutex::new(Vec::new()),
                responses: StdMutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl BrowserSurface for ScriptedSurface {
        async fn execute_script(&self, script: &str) -> Result<JsonValue, SurfaceError> {
            self.submitted.lock().unwrap().push(script.to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(JsonValue::Null);
            }
            responses.remove(0).map_err(SurfaceError::Script)
        }

        async fn current_url(&self) -> Result<String, SurfaceError> {
            Ok("about:blank".to_string())
        }

        async fn navigate(&self, _url: &str) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_decodes_surface_result() {
        let surface = Arc::new(ScriptedSurface::with_responses(vec![Ok(json!("hello"))]));
        let executor = ScriptExecutor::new(surface.clone());

        let mut chain = ScriptChain::new();
        chain.query("#a").text(None).unwrap();
        let text: String = executor.run(chain).await.unwrap();

        assert_eq!(text, "hello");
        let submitted = surface.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].contains("querySelector(\"#a\")"));
    }

    #[tokio::test]
    async fn run_with_no_read_decodes_unit_from_null() {
        let surface = Arc::new(ScriptedSurface::default());
        let executor = ScriptExecutor::new(surface);

        let mut chain = ScriptChain::new();
        chain.click("#send");
        executor.run::<()>(chain).await.unwrap();
    }

    #[tokio::test]
    async fn run_all_returns_named_result_object() {
        let surface = Arc::new(ScriptedSurface::with_responses(vec![Ok(
            json!({"title": "T", "count": 2}),
        )]));
        let executor = ScriptExecutor::new(surface.clone());

        let mut chain = ScriptChain::new();
        chain.query("#t").text(Some("title")).unwrap();
        chain.query_all("li").len(Some("count")).unwrap();
        let value = executor.run_all(chain).await.unwrap();

        assert_eq!(value["title"], "T");
        let submitted = surface.submitted.lock().unwrap();
        assert!(submitted[0].contains("return { \"title\": _r1, \"count\": _r3 };"));
    }

    #[tokio::test]
    async fn script_exceptions_propagate_unmodified() {
        let surface = Arc::new(ScriptedSurface::with_responses(vec![Err(
            "Timeout waiting for element: .reply".to_string(),
        )]));
        let executor = ScriptExecutor::new(surface);

        let mut chain = ScriptChain::new();
        chain.wait_for_with(".reply", 1000, 200);
        let err = executor.run::<()>(chain).await.unwrap_err();

        match err {
            ScriptError::Surface(SurfaceError::Script(message)) => {
                assert!(message.contains("Timeout waiting for element: .reply"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn failed_run_leaves_no_state_for_the_next_chain() {
        let surface = Arc::new(ScriptedSurface::with_responses(vec![
            Err("boom".to_string()),
            Ok(JsonValue::Null),
        ]));
        let executor = ScriptExecutor::new(surface.clone());

        let mut first = ScriptChain::new();
        first.click("#fails");
        assert!(executor.run::<()>(first).await.is_err());

        let mut second = ScriptChain::new();
        second.click("#clean");
        executor.run::<()>(second).await.unwrap();

        let submitted = surface.submitted.lock().unwrap();
        assert!(submitted[1].contains("#clean"));
        assert!(!submitted[1].contains("#fails"));
    }
}
