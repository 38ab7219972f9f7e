//! DOM scripting layer: fluent statement chains and their executor.
//!
//! Nothing in this module touches a real page. [`builder::ScriptChain`]
//! accumulates symbolic DOM operations and compiles them into one
//! self-contained script string; [`executor::ScriptExecutor`] ships that
//! string across the browser-surface boundary and decodes the result.

pub mod builder;
pub mod executor;

pub use builder::{ChainError, ElementListRef, ElementRef, InputStrategy, ScriptChain};
pub use executor::{ScriptError, ScriptExecutor};
