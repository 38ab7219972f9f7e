//! Provider adapters: one uniform chat protocol per third-party chat site.
//!
//! Per-site differences live entirely in [`config::ProviderConfig`] data;
//! [`SiteAdapter`] is the single shared interpreter that turns a config into
//! statement chains. Adapters are constructed early and bound to the shared
//! [`ScriptExecutor`] once the browser surface has finished initialising;
//! using one before that binding is a precondition error.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::ChainTiming;
use crate::markdown::{self, MarkdownError};
use crate::script::{ChainError, ScriptChain, ScriptError, ScriptExecutor};

pub mod config;
pub mod sites;

pub use config::{ChatSelectors, HistorySelectors, InputTarget, ProviderConfig, ReplySelectors};

/// Errors surfaced by provider adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A chain operation ran before the executor binding was assigned.
    #[error("executor is not initialized; bind it once the browser surface is ready")]
    ExecutorNotInitialized,
    /// The outer bound on a whole operation elapsed first.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Markdown(#[from] MarkdownError),
}

/// Uniform protocol implemented once per third-party chat site.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Display name, also used for switching by name.
    fn name(&self) -> &str;

    /// The provider's entry URL; navigation to this host activates it.
    fn url(&self) -> &str;

    /// Assign the shared executor. Later bindings are ignored.
    fn bind_executor(&self, executor: Arc<ScriptExecutor>);

    /// Page-specific cleanup run once per navigation to the provider.
    async fn on_load(&self) -> Result<(), AdapterError>;

    /// Compose `text`, send it, wait for the reply to finish, and return the
    /// normalized reply content.
    async fn chat(&self, text: &str) -> Result<String, AdapterError>;

    /// Start a fresh conversation, then [`chat`](Self::chat).
    async fn new_chat(&self, text: &str) -> Result<String, AdapterError>;

    /// Open the history panel; when a query is given and the provider has a
    /// search field, type the query into it.
    async fn query_history(&self, query: Option<&str>) -> Result<(), AdapterError>;

    /// Extract the most recent reply without sending anything.
    async fn get_current_reply(&self) -> Result<String, AdapterError>;
}

/// Shared adapter driving any provider described by a [`ProviderConfig`].
pub struct SiteAdapter {
    config: ProviderConfig,
    timing: ChainTiming,
    executor: OnceLock<Arc<ScriptExecutor>>,
}

impl SiteAdapter {
    pub fn new(config: ProviderConfig, timing: ChainTiming) -> Self {
        Self {
            config,
            timing,
            executor: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn executor(&self) -> Result<&Arc<ScriptExecutor>, AdapterError> {
        self.executor
            .get()
            .ok_or(AdapterError::ExecutorNotInitialized)
    }

    /// Emit the compose-and-send steps onto `chain`.
    fn push_send(&self, chain: &mut ScriptChain, text: &str) {
        let input = &self.config.chat.input;
        chain
            .input(&input.selector, text, input.strategy)
            .delay(self.timing.input_settle_ms)
            .click(&self.config.chat.send)
            .delay(self.timing.send_settle_ms);
    }

    /// Emit the reply-finished wait onto `chain`: the newest reply element
    /// must grow the configured finished marker.
    fn push_await_reply(&self, chain: &mut ScriptChain) {
        chain.query_all(&self.config.reply.filter).at(-1).wait_for(
            &self.config.reply.finish_flag,
            self.timing.reply_timeout_ms,
            self.timing.reply_interval_ms,
        );
    }

    /// Emit the reply-content extraction onto `chain`, leaving the newest
    /// reply's HTML as the chain's current value.
    fn push_extract_reply(&self, chain: &mut ScriptChain) -> Result<(), AdapterError> {
        chain.wait_for(&self.config.reply.filter);
        chain
            .query_all(&self.config.reply.filter)
            .at(-1)
            .query(&self.config.reply.content)
            .html(None)?;
        Ok(())
    }

    /// Run the full send-and-collect script and normalize the reply.
    async fn send_and_collect(&self, mut chain: ScriptChain, text: &str) -> Result<String, AdapterError> {
        let executor = self.executor()?;
        self.push_send(&mut chain, text);
        self.push_await_reply(&mut chain);
        self.push_extract_reply(&mut chain)?;
        let html: String = executor.run(chain).await?;
        Ok(markdown::normalize_reply(&html)?)
    }
}

#[async_trait]
impl ProviderAdapter for SiteAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn url(&self) -> &str {
        &self.config.url
    }

    fn bind_executor(&self, executor: Arc<ScriptExecutor>) {
        let _ = self.executor.set(executor);
    }

    async fn on_load(&self) -> Result<(), AdapterError> {
        if self.config.cleanup.is_empty() {
            return Ok(());
        }
        let executor = self.executor()?;
        let mut chain = ScriptChain::new();
        chain.delay(self.timing.cleanup_delay_ms);
        for selector in &self.config.cleanup {
            chain.remove(selector);
        }
        executor.run::<()>(chain).await?;
        Ok(())
    }

    async fn chat(&self, text: &str) -> Result<String, AdapterError> {
        let budget = self.timing.chat_timeout_ms;
        timeout(
            Duration::from_millis(budget),
            self.send_and_collect(ScriptChain::new(), text),
        )
        .await
        .map_err(|_| AdapterError::Timeout {
            operation: "chat",
            timeout_ms: budget,
        })?
    }

    async fn new_chat(&self, text: &str) -> Result<String, AdapterError> {
        let budget = self.timing.chat_timeout_ms;
        let mut chain = ScriptChain::new();
        chain
            .click(&self.config.chat.new_chat)
            .delay(self.timing.new_chat_settle_ms);
        timeout(
            Duration::from_millis(budget),
            self.send_and_collect(chain, text),
        )
        .await
        .map_err(|_| AdapterError::Timeout {
            operation: "new_chat",
            timeout_ms: budget,
        })?
    }

    async fn query_history(&self, query: Option<&str>) -> Result<(), AdapterError> {
        let executor = self.executor()?;
        let mut chain = ScriptChain::new();
        if let Some(reveal) = &self.config.history.reveal {
            chain.click(reveal).delay(self.timing.reveal_settle_ms);
        }
        chain.click(&self.config.history.show);
        if let (Some(query), Some(input)) = (query, &self.config.history.input) {
            chain
                .delay(self.timing.history_input_settle_ms)
                .input(&input.selector, query, input.strategy);
        }
        executor.run::<()>(chain).await?;
        Ok(())
    }

    async fn get_current_reply(&self) -> Result<String, AdapterError> {
        let executor = self.executor()?;
        let mut chain = ScriptChain::new();
        self.push_extract_reply(&mut chain)?;
        let html: String = executor.run(chain).await?;
        Ok(markdown::normalize_reply(&html)?)
    }
}
