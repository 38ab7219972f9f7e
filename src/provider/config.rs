//! Declarative per-site descriptors.
//!
//! A provider is fully described by selector data plus an input-simulation
//! strategy; the shared adapter interprets these into statement chains. The
//! descriptors are immutable once constructed.

use serde::{Deserialize, Serialize};

use crate::script::InputStrategy;

/// An input element plus the simulation strategy its framework expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTarget {
    pub selector: String,
    #[serde(default)]
    pub strategy: InputStrategy,
}

/// Selectors for composing and sending a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSelectors {
    /// The "start a new conversation" control.
    pub new_chat: String,
    pub input: InputTarget,
    /// The send trigger.
    pub send: String,
}

/// Selectors for locating replies and telling when one has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySelectors {
    /// Matches every assistant reply element; the newest match is the
    /// current reply.
    pub filter: String,
    /// Appears inside a reply once the provider has finished streaming it.
    pub finish_flag: String,
    /// The rich-text content node within a reply.
    pub content: String,
}

/// Selectors for the history panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySelectors {
    /// Opens the history panel.
    pub show: String,
    /// Extra control that must be clicked before `show` becomes reachable.
    #[serde(default)]
    pub reveal: Option<String>,
    /// Search field, for providers that support history search.
    #[serde(default)]
    pub input: Option<InputTarget>,
}

/// Everything the shared adapter needs to drive one chat site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    pub url: String,
    pub chat: ChatSelectors,
    pub reply: ReplySelectors,
    pub history: HistorySelectors,
    /// Promotional/visual-noise elements removed after each page load.
    #[serde(default)]
    pub cleanup: Vec<String>,
}
