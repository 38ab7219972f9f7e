//! Host application boundary.
//!
//! The orchestrator never talks to a concrete editor, vault, or status bar;
//! it consumes these traits. A hosting application implements them over its
//! own primitives, and tests implement them with recording doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by host collaborators.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0}")]
    Message(String),
}

/// What kind of document view the user is working in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// A text-editing view whose selection can be replaced in place.
    Markdown,
    /// A paginated document view with a structured location reference.
    Pdf,
    /// Anything else; the chat workflow declines these.
    Other,
}

/// The active document view at the moment the user triggers a chat.
pub trait DocumentView: Send + Sync {
    fn kind(&self) -> ViewKind;

    /// The currently selected text, if any.
    fn selection(&self) -> Option<String>;

    /// Replace the current selection (text views only).
    fn replace_selection(&self, text: &str);

    /// A back-reference to the current location (paginated views only).
    fn location_reference(&self) -> Option<String>;
}

/// Note storage: existence checks, folder and file creation, appends.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, HostError>;
    async fn create_folder(&self, path: &str) -> Result<(), HostError>;
    async fn create(&self, path: &str, content: &str) -> Result<(), HostError>;
    async fn append(&self, path: &str, content: &str) -> Result<(), HostError>;
}

/// Transient user-facing notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// States shown by the persistent status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Idle,
    Busy,
    Complete,
    Error,
}

/// Presentation data for one status state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSpec {
    pub display: String,
    pub tooltip: Option<String>,
    /// Terminal states clear themselves after this delay.
    pub autohide_ms: Option<u64>,
}

/// The host's persistent status indicator.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: AnswerStatus, spec: &StatusSpec);
}

/// Small process-wide key/value persistence, e.g. for remembering which
/// pane hosts the browser surface across restarts.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str);
}

/// Interactive prompts: confirmation and fuzzy picking.
#[async_trait]
pub trait Picker: Send + Sync {
    /// Ask the user a yes/no question.
    async fn confirm(&self, prompt: &str) -> bool;

    /// Let the user choose one item from a candidate list.
    async fn pick(&self, prompt: &str, items: &[String]) -> Option<String>;
}

/// A command the host should register with its command palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub hotkey: Option<&'static str>,
}
