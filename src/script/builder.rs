//! Fluent builder for injectable DOM scripts.
//!
//! A [`ScriptChain`] records an ordered list of DOM operations as script
//! statements over symbolic variable names (`_e0`, `_l1`, `_r2`, ...). The
//! chain tracks at most one "current value" plus a map of named results, and
//! compiles everything into a single immediately-invoked function whose
//! wrapper is asynchronous exactly when some statement needs to suspend.
//!
//! Element handles borrow the chain exclusively and are consumed by every
//! chained call, so statements are emitted strictly in call order and a
//! handle cannot be carried over into another chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default timeout for element polling.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;
/// Default poll interval for element polling.
pub const DEFAULT_WAIT_INTERVAL_MS: u64 = 200;

const SLEEP_HELPER: &str = "const sleep = ms => new Promise(r => setTimeout(r, ms));";

const WAIT_HELPER: &str = "\
const waitUntilElement = async (sel, timeout, interval = 200) => {
  const start = Date.now();
  while (Date.now() - start < timeout) {
    const el = document.querySelector(sel);
    if (el) return el;
    await sleep(interval);
  }
  return null;
};";

/// Chain construction errors. These indicate a programming or configuration
/// mistake, never a page/runtime failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("result key \"{0}\" is already used")]
    DuplicateResultKey(String),
}

/// How simulated text entry should be dispatched to an input element.
///
/// Web front-ends differ in which mutation/event combination their reactive
/// state layer actually observes, so the strategy is part of each provider's
/// configuration rather than a global choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputStrategy {
    /// Set `textContent` directly on a contenteditable element.
    Contenteditable,
    /// Dispatch a paste-style `InputEvent` carrying the text as data.
    Lexical,
    /// Invoke the native `<textarea>` value setter, then dispatch `input`.
    Textarea,
    /// Set `.value`, rewind the internal value tracker, then dispatch
    /// `input` and `change` so shadow-tracking frameworks see the edit.
    Controlled,
    /// Set `.value` and dispatch a bubbling keyboard `input` event.
    #[default]
    Normal,
}

/// Replace double quotes so a selector can sit inside a `"..."` literal.
///
/// Deliberately narrow: only quote substitution, mirroring the behaviour of
/// the pages this was tuned against. Selectors that rely on double-quoted
/// attribute values are rewritten to single quotes, which CSS accepts.
fn escape_selector(selector: &str) -> String {
    selector.replace('"', "'")
}

/// Escape text for embedding inside a JS template literal.
fn escape_template(text: &str) -> String {
    text.replace('`', "\\`").replace('$', "\\$")
}

/// An ordered, not-yet-executed sequence of DOM operations destined for one
/// script submission.
#[derive(Debug, Default)]
pub struct ScriptChain {
    statements: Vec<String>,
    last_result: Option<String>,
    named: Vec<(String, String)>,
    next_id: u32,
    needs_async: bool,
}

impl ScriptChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any emitted statement requires suspension.
    pub fn is_async(&self) -> bool {
        self.needs_async
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Number of statements emitted so far.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Clear all accumulated state, returning the chain to its freshly
    /// constructed form.
    pub fn reset(&mut self) {
        self.statements.clear();
        self.last_result = None;
        self.named.clear();
        self.next_id = 0;
        self.needs_async = false;
    }

    fn next_var(&mut self, prefix: char) -> String {
        let var = format!("_{prefix}{}", self.next_id);
        self.next_id += 1;
        var
    }

    fn push(&mut self, statement: String) {
        self.statements.push(statement);
    }

    fn set_last_result(&mut self, expr: &str, key: Option<&str>) -> Result<(), ChainError> {
        let var = self.next_var('r');
        self.push(format!("const {var} = {expr};"));
        self.last_result = Some(var.clone());
        if let Some(key) = key {
            if self.named.iter().any(|(existing, _)| existing == key) {
                return Err(ChainError::DuplicateResultKey(key.to_string()));
            }
            self.named.push((key.to_string(), var));
        }
        Ok(())
    }

    fn perform(&mut self, expr: &str, action: &str) {
        self.push(format!("{expr}?.{action};"));
        self.last_result = None;
    }

    /// Bind a fresh variable to `document.querySelector(selector)`.
    pub fn query(&mut self, selector: &str) -> ElementRef<'_> {
        let selector = escape_selector(selector);
        let var = self.next_var('e');
        self.push(format!(
            "const {var} = document.querySelector(\"{selector}\");"
        ));
        ElementRef { chain: self, expr: var }
    }

    /// Bind a fresh variable to all matches of `selector` as an array.
    pub fn query_all(&mut self, selector: &str) -> ElementListRef<'_> {
        let selector = escape_selector(selector);
        let var = self.next_var('l');
        self.push(format!(
            "const {var} = Array.from(document.querySelectorAll(\"{selector}\"));"
        ));
        ElementListRef { chain: self, expr: var }
    }

    /// Poll for `selector` with the default timeout and interval.
    pub fn wait_for(&mut self, selector: &str) -> ElementRef<'_> {
        self.wait_for_with(selector, DEFAULT_WAIT_TIMEOUT_MS, DEFAULT_WAIT_INTERVAL_MS)
    }

    /// Poll for `selector`, failing the script with a timeout error once
    /// `timeout_ms` elapses. Marks the chain asynchronous.
    pub fn wait_for_with(
        &mut self,
        selector: &str,
        timeout_ms: u64,
        interval_ms: u64,
    ) -> ElementRef<'_> {
        let selector = escape_selector(selector);
        self.needs_async = true;
        let var = self.next_var('e');
        self.push(format!(
            "const {var} = await waitUntilElement(\"{selector}\", {timeout_ms}, {interval_ms});\n\
             if (!{var}) throw new Error(\"Timeout waiting for element: {selector}\");"
        ));
        ElementRef { chain: self, expr: var }
    }

    /// Suspend the script for `ms` milliseconds. Delays have no return
    /// value, so the current-value pointer is cleared.
    pub fn delay(&mut self, ms: u64) -> &mut Self {
        self.needs_async = true;
        self.push(format!("await sleep({ms});"));
        self.last_result = None;
        self
    }

    /// `query` + click. Absent elements no-op.
    pub fn click(&mut self, selector: &str) -> &mut Self {
        self.query(selector).click()
    }

    /// `query` + remove. Absent elements no-op.
    pub fn remove(&mut self, selector: &str) -> &mut Self {
        self.query(selector).remove()
    }

    /// `query` + focus. Absent elements no-op.
    pub fn focus(&mut self, selector: &str) -> &mut Self {
        self.query(selector).focus()
    }

    /// `query` + simulated text entry with the given strategy.
    pub fn input(&mut self, selector: &str, text: &str, strategy: InputStrategy) -> &mut Self {
        self.query(selector).input(text, strategy)
    }

    /// Record a raw expression as the current value.
    pub fn eval(&mut self, script: &str) -> &mut Self {
        // Raw expressions cannot collide on a key, so the error is unreachable.
        let _ = self.set_last_result(&format!("({script})"), None);
        self
    }

    /// Record a raw expression as the current value under a named key.
    pub fn eval_named(&mut self, script: &str, key: &str) -> Result<&mut Self, ChainError> {
        self.set_last_result(&format!("({script})"), Some(key))?;
        Ok(self)
    }

    /// Compile the accumulated statements into one self-contained script.
    ///
    /// With `collect_all` the return clause is an object literal over the
    /// named-result map (an empty object when nothing was registered);
    /// otherwise it returns the last unconsumed current value, if any.
    pub fn compile(&self, collect_all: bool) -> String {
        let mut body = String::new();
        if self.needs_async {
            body.push_str(SLEEP_HELPER);
            body.push('\n');
            body.push_str(WAIT_HELPER);
            body.push('\n');
        }
        for statement in &self.statements {
            body.push_str(statement);
            body.push('\n');
        }

        if collect_all {
            if self.named.is_empty() {
                body.push_str("return {};");
            } else {
                let entries: Vec<String> = self
                    .named
                    .iter()
                    .map(|(key, var)| format!("\"{key}\": {var}"))
                    .collect();
                body.push_str(&format!("return {{ {} }};", entries.join(", ")));
            }
        } else if let Some(var) = &self.last_result {
            body.push_str(&format!("return {var};"));
        }

        if self.needs_async {
            format!("(async function() {{\n{body}\n}})()")
        } else {
            format!("(function() {{\n{body}\n}})()")
        }
    }
}

/// Handle to a script variable that will hold a single DOM node.
///
/// Owned by the chain that produced it; every method consumes the handle,
/// emitting statements back into that chain.
pub struct ElementRef<'c> {
    chain: &'c mut ScriptChain,
    expr: String,
}

impl<'c> ElementRef<'c> {
    /// Query within this element.
    pub fn query(self, selector: &str) -> ElementRef<'c> {
        let selector = escape_selector(selector);
        let var = self.chain.next_var('e');
        self.chain.push(format!(
            "const {var} = {}.querySelector(\"{selector}\");",
            self.expr
        ));
        ElementRef { chain: self.chain, expr: var }
    }

    /// Query all matches within this element (empty list when the element
    /// itself is absent).
    pub fn query_all(self, selector: &str) -> ElementListRef<'c> {
        let selector = escape_selector(selector);
        let var = self.chain.next_var('l');
        self.chain.push(format!(
            "const {var} = {src} ? Array.from({src}.querySelectorAll(\"{selector}\")) : [];",
            src = self.expr
        ));
        ElementListRef { chain: self.chain, expr: var }
    }

    /// Poll for a descendant of this element, failing on timeout. Marks the
    /// chain asynchronous.
    pub fn wait_for(self, selector: &str, timeout_ms: u64, interval_ms: u64) -> ElementRef<'c> {
        let selector = escape_selector(selector);
        self.chain.needs_async = true;
        let var = self.chain.next_var('e');
        self.chain.push(format!(
            "const {var} = await (async () => {{\n\
             \x20 const start = Date.now();\n\
             \x20 while (Date.now() - start < {timeout_ms}) {{\n\
             \x20   const el = {src}.querySelector(\"{selector}\");\n\
             \x20   if (el) return el;\n\
             \x20   await sleep({interval_ms});\n\
             \x20 }}\n\
             \x20 return null;\n\
             }})();\n\
             if (!{var}) throw new Error(\"Timeout waiting for element: {selector} inside {src}\");",
            src = self.expr
        ));
        ElementRef { chain: self.chain, expr: var }
    }

    pub fn click(self) -> &'c mut ScriptChain {
        self.chain.perform(&self.expr, "click()");
        self.chain
    }

    pub fn focus(self) -> &'c mut ScriptChain {
        self.chain.perform(&self.expr, "focus()");
        self.chain
    }

    pub fn remove(self) -> &'c mut ScriptChain {
        self.chain.perform(&self.expr, "remove()");
        self.chain
    }

    /// Read an arbitrary property off the element as the current value.
    pub fn attr(self, name: &str, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.chain
            .set_last_result(&format!("{}?.{name}", self.expr), key)?;
        Ok(self.chain)
    }

    /// Read `textContent`.
    pub fn text(self, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.attr("textContent", key)
    }

    /// Read `innerHTML`.
    pub fn html(self, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.attr("innerHTML", key)
    }

    /// Record whether the element is present.
    pub fn exists(self, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.chain
            .set_last_result(&format!("!!({})", self.expr), key)?;
        Ok(self.chain)
    }

    /// Set a single inline style property.
    pub fn set_style(self, property: &str, value: &str) -> &'c mut ScriptChain {
        self.chain.push(format!(
            "{}?.style.setProperty(\"{property}\", \"{value}\");",
            self.expr
        ));
        self.chain.last_result = None;
        self.chain
    }

    pub fn hide(self) -> &'c mut ScriptChain {
        self.set_style("display", "none")
    }

    pub fn show(self) -> &'c mut ScriptChain {
        self.set_style("display", "")
    }

    /// Record whether the element is present and not display-hidden.
    pub fn is_visible(self, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.chain.set_last_result(
            &format!(
                "{src} ? {src}.style.display !== \"none\" : false",
                src = self.expr
            ),
            key,
        )?;
        Ok(self.chain)
    }

    /// Simulate user text entry using the given strategy. The text is escaped
    /// for embedding inside a template literal.
    pub fn input(self, text: &str, strategy: InputStrategy) -> &'c mut ScriptChain {
        let text = escape_template(text);
        let el = &self.expr;
        let code = match strategy {
            InputStrategy::Contenteditable => {
                format!("{el}.textContent = `{text}`;")
            }
            InputStrategy::Lexical => format!(
                "{el}.dispatchEvent(new InputEvent(\"input\", {{ inputType: \"insertFromPaste\", data: `{text}`, bubbles: true }}));"
            ),
            InputStrategy::Textarea => format!(
                "(() => {{\n\
                 \x20 const e = {el};\n\
                 \x20 if (!e) return;\n\
                 \x20 Object.getOwnPropertyDescriptor(HTMLTextAreaElement.prototype, 'value')?.set?.call(e, `{text}`);\n\
                 \x20 e.dispatchEvent(new Event(\"input\", {{ bubbles: true }}));\n\
                 }})();"
            ),
            InputStrategy::Controlled => format!(
                "(() => {{\n\
                 \x20 const e = {el};\n\
                 \x20 if (!e) return;\n\
                 \x20 const last = e.value;\n\
                 \x20 e.value = `{text}`;\n\
                 \x20 const ev = new Event(\"input\", {{ bubbles: true }});\n\
                 \x20 ev.simulated = true;\n\
                 \x20 const tracker = e._valueTracker;\n\
                 \x20 if (tracker) tracker.setValue(last);\n\
                 \x20 e.dispatchEvent(ev);\n\
                 \x20 e.dispatchEvent(new Event(\"change\", {{ bubbles: true }}));\n\
                 }})();"
            ),
            InputStrategy::Normal => format!(
                "{el}.value = `{text}`;\n\
                 {el}.dispatchEvent(new KeyboardEvent(\"input\", {{ bubbles: true }}));"
            ),
        };
        self.chain.push(code);
        self.chain.last_result = None;
        self.chain
    }
}

/// Handle to a script variable holding an array of DOM nodes.
pub struct ElementListRef<'c> {
    chain: &'c mut ScriptChain,
    expr: String,
}

impl<'c> ElementListRef<'c> {
    /// Index into the list. Negative indices count from the end, so `at(-1)`
    /// is the most recent match of an append-only container.
    pub fn at(self, index: i64) -> ElementRef<'c> {
        let idx = self.chain.next_var('i');
        self.chain.push(format!(
            "const {idx} = (({list}.length + ({index} % {list}.length)) % {list}.length);",
            list = self.expr
        ));
        let expr = format!("{}[{idx}]", self.expr);
        ElementRef { chain: self.chain, expr }
    }

    pub fn first(self) -> ElementRef<'c> {
        self.at(0)
    }

    pub fn last(self) -> ElementRef<'c> {
        self.at(-1)
    }

    /// Record the list length as the current value.
    pub fn len(self, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.chain
            .set_last_result(&format!("{}.length", self.expr), key)?;
        Ok(self.chain)
    }

    /// Record whether the list is non-empty.
    pub fn exists(self, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.chain
            .set_last_result(&format!("{}.length > 0", self.expr), key)?;
        Ok(self.chain)
    }

    /// Bind the first element whose text content equals `text`.
    pub fn find_by_text(self, text: &str) -> ElementRef<'c> {
        let text = escape_selector(text);
        let var = self.chain.next_var('e');
        self.chain.push(format!(
            "const {var} = {}.find(el => el?.textContent === \"{text}\");",
            self.expr
        ));
        ElementRef { chain: self.chain, expr: var }
    }

    /// Bind the first element whose attribute `name` equals `value`.
    pub fn find_by_attr(self, name: &str, value: &str) -> ElementRef<'c> {
        let name = escape_selector(name);
        let value = escape_selector(value);
        let var = self.chain.next_var('e');
        self.chain.push(format!(
            "const {var} = {}.find(el => el?.getAttribute(\"{name}\") === \"{value}\");",
            self.expr
        ));
        ElementRef { chain: self.chain, expr: var }
    }

    /// Record the list's text contents as the current value.
    pub fn map_text(self, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        self.chain
            .set_last_result(&format!("{}.map(el => el?.textContent)", self.expr), key)?;
        Ok(self.chain)
    }

    /// Record the list's values for attribute `name` as the current value.
    pub fn map_attr(self, name: &str, key: Option<&str>) -> Result<&'c mut ScriptChain, ChainError> {
        let name = escape_selector(name);
        self.chain.set_last_result(
            &format!("{}.map(el => el?.getAttribute(\"{name}\"))", self.expr),
            key,
        )?;
        Ok(self.chain)
    }
}
