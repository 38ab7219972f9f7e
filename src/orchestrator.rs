//! Top-level controller: tracks the active provider, reacts to navigation,
//! and drives the select → note → ask → append workflow.
//!
//! All process-wide mutable state (active provider, status indicator) is
//! owned here and exposed only through methods; the host wires user
//! affordances (commands, menus, the status bar) to them.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::config::SidechatConfig;
use crate::host::{
    AnswerStatus, CommandSpec, DocumentView, HostError, KeyValueStore, NoteStore, Notifier,
    Picker, StatusSink, StatusSpec, ViewKind,
};
use crate::logging::SidechatLogger;
use crate::provider::{sites, AdapterError, ProviderAdapter};
use crate::script::ScriptExecutor;
use crate::surface::{BrowserSurface, SurfaceError};

/// Key under which the hosting pane's identity is persisted across restarts.
pub const SURFACE_PANE_KEY: &str = "sidechat-surface-pane";

/// Failures inside the chat workflow, caught at the top level and reported
/// through the status indicator plus a generic notice.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Host collaborators the orchestrator consumes.
pub struct HostBindings {
    pub notes: Arc<dyn NoteStore>,
    pub notifier: Arc<dyn Notifier>,
    pub status: Arc<dyn StatusSink>,
    pub kv: Arc<dyn KeyValueStore>,
    pub picker: Arc<dyn Picker>,
}

/// The orchestrator. One per plugin instance; constructed at load, torn
/// down at unload.
pub struct Sidechat {
    config: SidechatConfig,
    surface: Arc<dyn BrowserSurface>,
    executor: Arc<ScriptExecutor>,
    providers: Vec<Arc<dyn ProviderAdapter>>,
    active: Mutex<Option<Arc<dyn ProviderAdapter>>>,
    host: HostBindings,
    logger: SidechatLogger,
}

impl Sidechat {
    pub fn new(config: SidechatConfig, surface: Arc<dyn BrowserSurface>, host: HostBindings) -> Self {
        let executor = Arc::new(ScriptExecutor::new(Arc::clone(&surface)));
        let providers = sites::load_providers(&config.timing);
        let logger = SidechatLogger::new(config.verbose);
        Self {
            config,
            surface,
            executor,
            providers,
            active: Mutex::new(None),
            host,
            logger,
        }
    }

    pub fn logger(&self) -> &SidechatLogger {
        &self.logger
    }

    pub fn providers(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn active_provider(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.active.lock().ok()?.clone()
    }

    pub fn active_provider_name(&self) -> Option<String> {
        self.active_provider().map(|p| p.name().to_string())
    }

    /// Wire every adapter to the shared executor. Call once the hosting
    /// browser surface has finished initialising.
    pub fn surface_ready(&self) {
        sites::bind_executor(&self.providers, &self.executor);
        self.logger
            .debug("executor bound to providers", Some("orchestrator"), None);
    }

    /// Persist which pane hosts the browser surface.
    pub fn remember_surface_pane(&self, pane_id: &str) {
        self.host.kv.store(SURFACE_PANE_KEY, pane_id);
    }

    /// Recall the pane persisted by [`remember_surface_pane`](Self::remember_surface_pane).
    pub fn stored_surface_pane(&self) -> Option<String> {
        self.host.kv.load(SURFACE_PANE_KEY)
    }

    /// Command descriptors for the host's palette. The host dispatches back
    /// by id: `chat-selection` → [`chat_selection`](Self::chat_selection),
    /// `copy-latest-reply` → [`copy_current_reply`](Self::copy_current_reply).
    pub fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec {
                id: "chat-selection",
                name: "Chat about the selection",
                hotkey: Some("Alt+C"),
            },
            CommandSpec {
                id: "copy-latest-reply",
                name: "Copy the latest reply as Markdown",
                hotkey: Some("Alt+Q"),
            },
        ]
    }

    /// Context-menu entries for the host's editor menu, dispatched by id
    /// like [`commands`](Self::commands); `search-history` →
    /// [`search_history`](Self::search_history) with the current selection.
    pub fn editor_menu(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec {
                id: "chat-selection",
                name: "Chat about the selection",
                hotkey: None,
            },
            CommandSpec {
                id: "search-history",
                name: "Search chat history",
                hotkey: None,
            },
        ]
    }

    /// Open the active provider's history panel, searching for `query` when
    /// one is given.
    pub async fn search_history(&self, query: Option<&str>) {
        let Some(provider) = self.active_provider() else {
            self.host.notifier.notify("No active provider");
            return;
        };
        if let Err(err) = provider.query_history(query).await {
            self.logger.error(
                format!("history query failed: {err}"),
                Some("orchestrator"),
                None,
            );
        }
    }

    /// Activate the provider named in the configuration.
    pub async fn activate_default(&self) {
        let name = self.config.default_provider.clone();
        self.switch_provider(&name).await;
    }

    /// Activate a provider by name and navigate the surface to it. Unknown
    /// names produce a notice and leave the active provider unchanged.
    pub async fn switch_provider(&self, name: &str) {
        let Some(provider) = self
            .providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
        else {
            self.host
                .notifier
                .notify(&format!("No provider named \"{name}\""));
            return;
        };

        let url = provider.url().to_string();
        self.set_active(provider);
        if let Err(err) = self.surface.navigate(&url).await {
            self.logger.error(
                format!("navigation to {url} failed: {err}"),
                Some("orchestrator"),
                None,
            );
        }
    }

    /// React to a surface navigation: when the destination host belongs to a
    /// known provider, that provider becomes active. Unrelated destinations
    /// leave the previous provider active.
    pub fn handle_navigation(&self, url: &str) {
        if let Some(provider) = self
            .providers
            .iter()
            .find(|p| same_host(p.url(), url))
            .cloned()
        {
            self.logger.debug(
                format!("navigation activated provider {}", provider.name()),
                Some("orchestrator"),
                None,
            );
            self.set_active(provider);
        }
    }

    /// Run the active provider's page cleanup. Call on every dom-ready.
    pub async fn page_loaded(&self) {
        let Some(provider) = self.active_provider() else {
            return;
        };
        if let Err(err) = provider.on_load().await {
            self.logger.error(
                format!("{} on_load failed: {err}", provider.name()),
                Some("orchestrator"),
                None,
            );
        }
    }

    /// Let the user pick a provider from the known list.
    pub async fn choose_provider(&self) {
        let names = self.provider_names();
        if let Some(choice) = self.host.picker.pick("Switch provider", &names).await {
            self.switch_provider(&choice).await;
        }
    }

    /// The "select text → create note → ask → append" workflow.
    ///
    /// User-input problems (no selection, unsupported view, no active
    /// provider) surface as notices and early returns. Everything after the
    /// note exists is reported as a whole: on failure the note is left in
    /// place, un-appended, the status indicator shows the error state, and a
    /// generic notice is shown.
    pub async fn chat_selection(&self, view: &dyn DocumentView) {
        if view.kind() == ViewKind::Other {
            self.host.notifier.notify("This view type is not supported");
            return;
        }
        let Some(selection) = view.selection().filter(|s| !s.trim().is_empty()) else {
            self.host.notifier.notify("Nothing is selected");
            return;
        };
        let Some(provider) = self.active_provider() else {
            self.host.notifier.notify("No active provider");
            return;
        };

        self.set_status(AnswerStatus::Busy);
        self.host.notifier.notify("Asking…");

        let note = match self.prepare_note(&selection, view).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                // User declined regenerating an existing note.
                self.set_status(AnswerStatus::Idle);
                return;
            }
            Err(err) => {
                self.report_failure("preparing the note failed", &err);
                return;
            }
        };

        match self.ask_and_append(provider.as_ref(), &selection, &note).await {
            Ok(()) => {
                self.set_status(AnswerStatus::Complete);
                self.host.notifier.notify("Answer saved");
            }
            Err(err) => self.report_failure("chat failed", &err),
        }
    }

    /// Fetch the active provider's latest reply for the host to place on the
    /// clipboard. Returns `None` when there is no provider or no reply.
    pub async fn copy_current_reply(&self) -> Option<String> {
        let provider = self.active_provider()?;
        match provider.get_current_reply().await {
            Ok(reply) if !reply.is_empty() => {
                self.host.notifier.notify("Copied the latest reply");
                Some(reply)
            }
            Ok(_) => None,
            Err(err) => {
                self.logger.error(
                    format!("fetching the latest reply failed: {err}"),
                    Some("orchestrator"),
                    None,
                );
                None
            }
        }
    }

    fn set_active(&self, provider: Arc<dyn ProviderAdapter>) {
        if let Ok(mut guard) = self.active.lock() {
            *guard = Some(provider);
        }
    }

    async fn prepare_note(
        &self,
        selection: &str,
        view: &dyn DocumentView,
    ) -> Result<Option<String>, WorkflowError> {
        let file_name = lint_file_name(selection);
        let mut content = String::new();
        match view.kind() {
            ViewKind::Markdown => {
                view.replace_selection(&format!("[[{file_name}|{selection}]]"));
            }
            ViewKind::Pdf => {
                if let Some(reference) = view.location_reference() {
                    content = format!("{reference}\n\n");
                }
            }
            ViewKind::Other => {}
        }

        let folder = self.config.notes_folder.trim_end_matches('/');
        if !self.host.notes.exists(folder).await? {
            self.host.notes.create_folder(folder).await?;
        }
        let path = format!("{folder}/{file_name}.md");
        if self.host.notes.exists(&path).await?
            && !self
                .host
                .picker
                .confirm("The note already exists. Regenerate it?")
                .await
        {
            return Ok(None);
        }
        self.host.notes.create(&path, &content).await?;
        Ok(Some(path))
    }

    async fn ask_and_append(
        &self,
        provider: &dyn ProviderAdapter,
        selection: &str,
        note_path: &str,
    ) -> Result<(), WorkflowError> {
        let reply = provider.chat(selection).await?;
        let url = self.surface.current_url().await?;
        let source = format!(
            "[From: {}]({url}#:~:text={})",
            provider.name(),
            urlencoding::encode(selection)
        );
        self.host
            .notes
            .append(note_path, &format!("{reply}\n\n{source}"))
            .await?;
        Ok(())
    }

    fn report_failure(&self, context: &str, err: &WorkflowError) {
        self.logger
            .error(format!("{context}: {err}"), Some("orchestrator"), None);
        self.set_status(AnswerStatus::Error);
        self.host.notifier.notify("Chat failed");
    }

    fn set_status(&self, status: AnswerStatus) {
        let autohide = Some(self.config.status_autohide_ms);
        let spec = match status {
            AnswerStatus::Idle => StatusSpec {
                display: String::new(),
                tooltip: None,
                autohide_ms: None,
            },
            AnswerStatus::Busy => StatusSpec {
                display: "Asking…".to_string(),
                tooltip: None,
                autohide_ms: None,
            },
            AnswerStatus::Complete => StatusSpec {
                display: "Answer ready".to_string(),
                tooltip: None,
                autohide_ms: autohide,
            },
            AnswerStatus::Error => StatusSpec {
                display: "Chat failed".to_string(),
                tooltip: Some("Open the developer console for details".to_string()),
                autohide_ms: autohide,
            },
        };
        self.host.status.set_status(status, &spec);
    }
}

/// Whether two URLs share a network host.
fn same_host(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(a), Ok(b)) => match (a.host_str(), b.host_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        },
        _ => false,
    }
}

/// Reduce a selection to a usable note file name: strip characters the note
/// store or wikilinks cannot carry, collapse whitespace, bound the length.
fn lint_file_name(selection: &str) -> String {
    const MAX_CHARS: usize = 60;
    let cleaned: String = selection
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let bounded: String = collapsed.chars().take(MAX_CHARS).collect();
    let trimmed = bounded.trim();
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}
