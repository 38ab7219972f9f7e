//! sidechat: drive third-party web chat sites from a host notes application.
//!
//! The crate automates human-facing chat pages through an embedded browser
//! surface: select text in a document, forward it to the active provider's
//! page via injected DOM scripts, wait for the page to signal that the reply
//! finished, and persist the normalized reply (plus a source back-link) into
//! a note.
//!
//! Layering, bottom up:
//! - [`script`] — fluent statement chains compiled into injectable scripts,
//!   and the executor that ships them across the surface boundary.
//! - [`surface`] — the [`surface::BrowserSurface`] trait plus a bundled
//!   chromiumoxide implementation.
//! - [`provider`] — the uniform chat protocol, the shared site adapter, and
//!   the declarative per-site configurations.
//! - [`orchestrator`] — the top-level controller wiring providers, surface,
//!   and the host application together.

pub mod config;
pub mod host;
pub mod logging;
pub mod markdown;
pub mod orchestrator;
pub mod provider;
pub mod script;
pub mod surface;

pub use config::{ChainTiming, SidechatConfig, Verbosity};
pub use orchestrator::{HostBindings, Sidechat};
pub use provider::{AdapterError, ProviderAdapter, ProviderConfig, SiteAdapter};
pub use script::{InputStrategy, ScriptChain, ScriptExecutor};
pub use surface::{BrowserSurface, SurfaceError};
