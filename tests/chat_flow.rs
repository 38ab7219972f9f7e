//! End-to-end workflow tests against in-process doubles.
//!
//! The scripted surface stands in for the embedded browser: it records every
//! submitted script and replays queued JSON responses, so the whole
//! select → note → ask → append workflow runs without a page.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use sidechat::host::{
    AnswerStatus, DocumentView, HostError, KeyValueStore, NoteStore, Notifier, Picker,
    StatusSink, StatusSpec, ViewKind,
};
use sidechat::orchestrator::SURFACE_PANE_KEY;
use sidechat::{BrowserSurface, HostBindings, Sidechat, SidechatConfig, SurfaceError};

#[derive(Default)]
struct ScriptedSurface {
    submitted: Mutex<Vec<String>>,
    responses: Mutex<Vec<Result<JsonValue, String>>>,
    url: Mutex<String>,
    navigations: Mutex<Vec<String>>,
}

impl ScriptedSurface {
    fn at(url: &str, responses: Vec<Result<JsonValue, String>>) -> Arc<Self> {
        Arc::new(Self {
            submitted: Mutex::new(Vec::new()),
            responses: Mutex::new(responses),
            url: Mutex::new(url.to_string()),
            navigations: Mutex::new(Vec::new()),
        })
    }

    fn scripts(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
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
        Ok(self.url.lock().unwrap().clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.navigations.lock().unwrap().push(url.to_string());
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotes {
    folders: Mutex<HashSet<String>>,
    files: Mutex<HashMap<String, String>>,
    appends: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl NoteStore for RecordingNotes {
    async fn exists(&self, path: &str) -> Result<bool, HostError> {
        Ok(self.folders.lock().unwrap().contains(path)
            || self.files.lock().unwrap().contains_key(path))
    }

    async fn create_folder(&self, path: &str) -> Result<(), HostError> {
        self.folders.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    async fn create(&self, path: &str, content: &str) -> Result<(), HostError> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn append(&self, path: &str, content: &str) -> Result<(), HostError> {
        self.appends
            .lock()
            .unwrap()
            .push((path.to_string(), content.to_string()));
        if let Some(existing) = self.files.lock().unwrap().get_mut(path) {
            existing.push_str(content);
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
struct RecordingStatus {
    states: Mutex<Vec<(AnswerStatus, String)>>,
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, status: AnswerStatus, spec: &StatusSpec) {
        self.states
            .lock()
            .unwrap()
            .push((status, spec.display.clone()));
    }
}

#[derive(Default)]
struct MemoryKv {
    values: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryKv {
    fn load(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

struct ScriptedPicker {
    confirm_answer: bool,
    pick_answer: Option<String>,
}

impl Default for ScriptedPicker {
    fn default() -> Self {
        Self {
            confirm_answer: true,
            pick_answer: None,
        }
    }
}

#[async_trait]
impl Picker for ScriptedPicker {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.confirm_answer
    }

    async fn pick(&self, _prompt: &str, _items: &[String]) -> Option<String> {
        self.pick_answer.clone()
    }
}

struct FakeView {
    kind: ViewKind,
    selection: Option<String>,
    location: Option<String>,
    replacements: Mutex<Vec<String>>,
}

impl FakeView {
    fn markdown(selection: &str) -> Self {
        Self {
            kind: ViewKind::Markdown,
            selection: Some(selection.to_string()),
            location: None,
            replacements: Mutex::new(Vec::new()),
        }
    }
}

impl DocumentView for FakeView {
    fn kind(&self) -> ViewKind {
        self.kind
    }

    fn selection(&self) -> Option<String> {
        self.selection.clone()
    }

    fn replace_selection(&self, text: &str) {
        self.replacements.lock().unwrap().push(text.to_string());
    }

    fn location_reference(&self) -> Option<String> {
        self.location.clone()
    }
}

struct Fixture {
    surface: Arc<ScriptedSurface>,
    notes: Arc<RecordingNotes>,
    notifier: Arc<RecordingNotifier>,
    status: Arc<RecordingStatus>,
    kv: Arc<MemoryKv>,
    orchestrator: Sidechat,
}

fn fixture_with(
    url: &str,
    responses: Vec<Result<JsonValue, String>>,
    picker: ScriptedPicker,
) -> Fixture {
    let surface = ScriptedSurface::at(url, responses);
    let notes = Arc::new(RecordingNotes::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let status = Arc::new(RecordingStatus::default());
    let kv = Arc::new(MemoryKv::default());
    let orchestrator = Sidechat::new(
        SidechatConfig::default(),
        surface.clone(),
        HostBindings {
            notes: notes.clone(),
            notifier: notifier.clone(),
            status: status.clone(),
            kv: kv.clone(),
            picker: Arc::new(picker),
        },
    );
    orchestrator.surface_ready();
    Fixture {
        surface,
        notes,
        notifier,
        status,
        kv,
        orchestrator,
    }
}

fn fixture(url: &str, responses: Vec<Result<JsonValue, String>>) -> Fixture {
    fixture_with(url, responses, ScriptedPicker::default())
}

fn statuses(fixture: &Fixture) -> Vec<AnswerStatus> {
    fixture
        .status
        .states
        .lock()
        .unwrap()
        .iter()
        .map(|(status, _)| *status)
        .collect()
}

#[tokio::test]
async fn navigation_to_a_known_host_activates_that_provider() -> Result<()> {
    let f = fixture("about:blank", Vec::new());
    assert_eq!(f.orchestrator.active_provider_name(), None);

    f.orchestrator
        .handle_navigation("https://www.qianwen.com/chat/session-1");
    assert_eq!(f.orchestrator.active_provider_name().as_deref(), Some("Qwen"));

    // Unrelated destinations leave the previous provider active.
    f.orchestrator.handle_navigation("https://example.com/");
    assert_eq!(f.orchestrator.active_provider_name().as_deref(), Some("Qwen"));

    f.orchestrator.handle_navigation("https://chatgpt.com/c/1");
    assert_eq!(
        f.orchestrator.active_provider_name().as_deref(),
        Some("ChatGPT")
    );
    Ok(())
}

#[tokio::test]
async fn switching_by_name_navigates_the_surface() -> Result<()> {
    let f = fixture("about:blank", Vec::new());

    f.orchestrator.switch_provider("kimi").await;
    assert_eq!(f.orchestrator.active_provider_name().as_deref(), Some("KIMI"));
    assert_eq!(
        f.surface.navigations.lock().unwrap().as_slice(),
        ["https://www.kimi.com".to_string()]
    );

    f.orchestrator.switch_provider("missing").await;
    assert_eq!(f.orchestrator.active_provider_name().as_deref(), Some("KIMI"));
    let notices = f.notifier.notices.lock().unwrap();
    assert!(notices.iter().any(|n| n.contains("missing")));
    Ok(())
}

#[tokio::test]
async fn chat_workflow_creates_the_note_and_appends_reply_with_back_link() -> Result<()> {
    let f = fixture(
        "https://www.qianwen.com/chat",
        vec![Ok(json!("<p>Recursion is a function calling itself.</p>"))],
    );
    f.orchestrator.handle_navigation("https://www.qianwen.com/chat");

    let view = FakeView::markdown("Explain recursion");
    f.orchestrator.chat_selection(&view).await;

    // Selection replaced with a wikilink to the destination note.
    let replacements = view.replacements.lock().unwrap();
    assert_eq!(
        replacements.as_slice(),
        ["[[Explain recursion|Explain recursion]]".to_string()]
    );

    // Note created under the configured folder.
    assert!(f.notes.folders.lock().unwrap().contains("Wiki"));
    assert!(f
        .notes
        .files
        .lock()
        .unwrap()
        .contains_key("Wiki/Explain recursion.md"));

    // Reply appended with the provider back-link and a text fragment.
    let appends = f.notes.appends.lock().unwrap();
    assert_eq!(appends.len(), 1);
    let (path, content) = &appends[0];
    assert_eq!(path, "Wiki/Explain recursion.md");
    assert!(content.contains("Recursion is a function calling itself."));
    assert!(content.contains("[From: Qwen](https://www.qianwen.com/chat#:~:text=Explain%20recursion)"));

    // One script carried the whole flow, using Qwen's textarea strategy.
    let scripts = f.surface.scripts();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].contains("HTMLTextAreaElement.prototype, 'value'"));
    assert!(scripts[0].contains("`Explain recursion`"));
    assert!(scripts[0].contains("span:has( use[*|href='#pcicon-sendingBold-line'])"));

    assert_eq!(statuses(&f), [AnswerStatus::Busy, AnswerStatus::Complete]);
    Ok(())
}

#[tokio::test]
async fn chat_failure_reports_error_and_leaves_the_note_unappended() -> Result<()> {
    let f = fixture(
        "https://www.qianwen.com/chat",
        vec![Err(
            "Timeout waiting for element: span[data-icon-type='pcicon-upvote-line']".to_string(),
        )],
    );
    f.orchestrator.handle_navigation("https://www.qianwen.com/chat");

    let view = FakeView::markdown("Explain recursion");
    f.orchestrator.chat_selection(&view).await;

    // Note exists but nothing was appended.
    assert!(f
        .notes
        .files
        .lock()
        .unwrap()
        .contains_key("Wiki/Explain recursion.md"));
    assert!(f.notes.appends.lock().unwrap().is_empty());

    assert_eq!(statuses(&f), [AnswerStatus::Busy, AnswerStatus::Error]);
    let notices = f.notifier.notices.lock().unwrap();
    assert!(notices.iter().any(|n| n == "Chat failed"));
    Ok(())
}

#[tokio::test]
async fn empty_selection_and_unsupported_views_fail_visibly_without_side_effects() -> Result<()> {
    let f = fixture("https://www.qianwen.com/", Vec::new());
    f.orchestrator.handle_navigation("https://www.qianwen.com/");

    let no_selection = FakeView {
        kind: ViewKind::Markdown,
        selection: None,
        location: None,
        replacements: Mutex::new(Vec::new()),
    };
    f.orchestrator.chat_selection(&no_selection).await;

    let unsupported = FakeView {
        kind: ViewKind::Other,
        selection: Some("text".to_string()),
        location: None,
        replacements: Mutex::new(Vec::new()),
    };
    f.orchestrator.chat_selection(&unsupported).await;

    assert!(f.surface.scripts().is_empty());
    assert!(f.notes.files.lock().unwrap().is_empty());
    assert!(statuses(&f).is_empty());

    let notices = f.notifier.notices.lock().unwrap();
    assert!(notices.iter().any(|n| n.contains("Nothing is selected")));
    assert!(notices.iter().any(|n| n.contains("not supported")));
    Ok(())
}

#[tokio::test]
async fn chat_without_an_active_provider_fails_visibly() -> Result<()> {
    let f = fixture("about:blank", Vec::new());

    let view = FakeView::markdown("Explain recursion");
    f.orchestrator.chat_selection(&view).await;

    assert!(f.surface.scripts().is_empty());
    let notices = f.notifier.notices.lock().unwrap();
    assert!(notices.iter().any(|n| n.contains("No active provider")));
    Ok(())
}

#[tokio::test]
async fn declining_regeneration_leaves_the_existing_note_alone() -> Result<()> {
    let f = fixture_with(
        "https://www.qianwen.com/chat",
        Vec::new(),
        ScriptedPicker {
            confirm_answer: false,
            pick_answer: None,
        },
    );
    f.orchestrator.handle_navigation("https://www.qianwen.com/chat");
    f.notes.create_folder("Wiki").await?;
    f.notes.create("Wiki/Explain recursion.md", "original").await?;

    let view = FakeView::markdown("Explain recursion");
    f.orchestrator.chat_selection(&view).await;

    assert_eq!(
        f.notes.files.lock().unwrap()["Wiki/Explain recursion.md"],
        "original"
    );
    assert!(f.surface.scripts().is_empty());
    assert_eq!(statuses(&f), [AnswerStatus::Busy, AnswerStatus::Idle]);
    Ok(())
}

#[tokio::test]
async fn pdf_views_seed_the_note_with_a_location_reference() -> Result<()> {
    let f = fixture(
        "https://www.qianwen.com/chat",
        vec![Ok(json!("<p>answer</p>"))],
    );
    f.orchestrator.handle_navigation("https://www.qianwen.com/chat");

    let view = FakeView {
        kind: ViewKind::Pdf,
        selection: Some("tail call".to_string()),
        location: Some("[[paper.pdf#page=4|tail call]]".to_string()),
        replacements: Mutex::new(Vec::new()),
    };
    f.orchestrator.chat_selection(&view).await;

    // Paginated views never get in-place replacement.
    assert!(view.replacements.lock().unwrap().is_empty());
    let files = f.notes.files.lock().unwrap();
    let content = &files["Wiki/tail call.md"];
    assert!(content.starts_with("[[paper.pdf#page=4|tail call]]\n\n"));
    Ok(())
}

#[tokio::test]
async fn copy_current_reply_returns_the_normalized_latest_reply() -> Result<()> {
    let f = fixture(
        "https://www.kimi.com/chat",
        vec![Ok(json!("<p>first</p>\n\n\n<p>second</p>"))],
    );
    f.orchestrator.handle_navigation("https://www.kimi.com/chat");

    let reply = f.orchestrator.copy_current_reply().await;
    let reply = reply.expect("reply available");
    assert!(reply.contains("first"));
    assert!(!reply.contains("\n\n"));

    let notices = f.notifier.notices.lock().unwrap();
    assert!(notices.iter().any(|n| n.contains("Copied")));
    Ok(())
}

#[tokio::test]
async fn copy_current_reply_without_provider_is_a_silent_no_op() -> Result<()> {
    let f = fixture("about:blank", Vec::new());
    assert!(f.orchestrator.copy_current_reply().await.is_none());
    assert!(f.notifier.notices.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn choose_provider_switches_via_the_picker() -> Result<()> {
    let f = fixture_with(
        "about:blank",
        Vec::new(),
        ScriptedPicker {
            confirm_answer: true,
            pick_answer: Some("Yuanbao".to_string()),
        },
    );

    f.orchestrator.choose_provider().await;
    assert_eq!(
        f.orchestrator.active_provider_name().as_deref(),
        Some("Yuanbao")
    );
    Ok(())
}

#[tokio::test]
async fn activate_default_selects_the_configured_provider() -> Result<()> {
    let f = fixture("about:blank", Vec::new());

    f.orchestrator.activate_default().await;
    assert_eq!(f.orchestrator.active_provider_name().as_deref(), Some("Qwen"));
    assert_eq!(
        f.surface.navigations.lock().unwrap().as_slice(),
        ["https://www.qianwen.com/".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn surface_pane_identity_round_trips_through_the_store() -> Result<()> {
    let f = fixture("about:blank", Vec::new());

    assert_eq!(f.orchestrator.stored_surface_pane(), None);
    f.orchestrator.remember_surface_pane("leaf-42");
    assert_eq!(
        f.orchestrator.stored_surface_pane().as_deref(),
        Some("leaf-42")
    );
    assert_eq!(f.kv.load(SURFACE_PANE_KEY).as_deref(), Some("leaf-42"));
    Ok(())
}

#[tokio::test]
async fn page_loaded_runs_the_active_providers_cleanup() -> Result<()> {
    let f = fixture("https://www.kimi.com/", Vec::new());
    f.orchestrator.handle_navigation("https://www.kimi.com/");

    f.orchestrator.page_loaded().await;

    let scripts = f.surface.scripts();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].contains("await sleep(600);"));
    assert!(scripts[0].contains(".header-center"));
    assert!(scripts[0].contains(".show-case-container"));
    Ok(())
}

#[tokio::test]
async fn search_history_drives_the_active_providers_history_panel() -> Result<()> {
    let f = fixture("https://yuanbao.tencent.com/chat", Vec::new());
    f.orchestrator
        .handle_navigation("https://yuanbao.tencent.com/chat");

    f.orchestrator.search_history(Some("recursion")).await;

    let scripts = f.surface.scripts();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].contains("[dt-button-id='search_bar']"));
    assert!(scripts[0].contains("`recursion`"));

    // Without an active provider the request fails visibly instead.
    let bare = fixture("about:blank", Vec::new());
    bare.orchestrator.search_history(None).await;
    let notices = bare.notifier.notices.lock().unwrap();
    assert!(notices.iter().any(|n| n.contains("No active provider")));
    Ok(())
}

#[tokio::test]
async fn commands_cover_chat_and_copy() -> Result<()> {
    let f = fixture("about:blank", Vec::new());
    let commands = f.orchestrator.commands();
    let ids: Vec<&str> = commands.iter().map(|c| c.id).collect();
    assert_eq!(ids, ["chat-selection", "copy-latest-reply"]);
    assert!(commands.iter().all(|c| c.hotkey.is_some()));
    Ok(())
}
