//! The known providers and their registry.
//!
//! Selector tables are page data observed on each site; when a provider
//! redesigns its front-end, the fix is a data edit here. Several sites serve
//! a localized UI, so some selectors match non-English attribute values.

use std::sync::Arc;

use crate::config::ChainTiming;
use crate::provider::config::{
    ChatSelectors, HistorySelectors, InputTarget, ProviderConfig, ReplySelectors,
};
use crate::provider::{ProviderAdapter, SiteAdapter};
use crate::script::{InputStrategy, ScriptExecutor};

pub fn chatgpt() -> ProviderConfig {
    ProviderConfig {
        name: "ChatGPT".to_string(),
        url: "https://chatgpt.com/".to_string(),
        chat: ChatSelectors {
            new_chat: "a[aria-label=\"新聊天\"]".to_string(),
            input: InputTarget {
                selector: ".ProseMirror>p".to_string(),
                strategy: InputStrategy::Contenteditable,
            },
            send: "#composer-submit-button".to_string(),
        },
        reply: ReplySelectors {
            filter: "article[data-turn='assistant']".to_string(),
            finish_flag: "button[data-testid='copy-turn-action-button']".to_string(),
            content: ".markdown".to_string(),
        },
        history: HistorySelectors {
            show: "a[data-testid=\"create-new-chat-button\"]+div".to_string(),
            reveal: Some("button[data-testid=\"open-sidebar-button\"]".to_string()),
            input: Some(InputTarget {
                selector: "input[placeholder=\"搜索聊天…\"]".to_string(),
                strategy: InputStrategy::Controlled,
            }),
        },
        cleanup: Vec::new(),
    }
}

pub fn kimi() -> ProviderConfig {
    ProviderConfig {
        name: "KIMI".to_string(),
        url: "https://www.kimi.com".to_string(),
        chat: ChatSelectors {
            new_chat: ".new-chat-btn".to_string(),
            input: InputTarget {
                selector: ".chat-input-editor".to_string(),
                strategy: InputStrategy::Lexical,
            },
            send: ".send-button".to_string(),
        },
        reply: ReplySelectors {
            filter: ".segment-assistant".to_string(),
            finish_flag: "svg[name='Refresh']".to_string(),
            content: ".markdown".to_string(),
        },
        history: HistorySelectors {
            show: "a.more-history".to_string(),
            reveal: None,
            input: Some(InputTarget {
                selector: "input[placeholder='搜索历史会话']".to_string(),
                strategy: InputStrategy::Normal,
            }),
        },
        cleanup: vec![
            ".header-center".to_string(),
            ".show-case-container".to_string(),
        ],
    }
}

pub fn qwen() -> ProviderConfig {
    ProviderConfig {
        name: "Qwen".to_string(),
        url: "https://www.qianwen.com/".to_string(),
        chat: ChatSelectors {
            new_chat: "span[data-icon-type=\"pcicon-addDialogue-line\"]".to_string(),
            input: InputTarget {
                selector: "textarea[placeholder=\"向千问提问\"]".to_string(),
                strategy: InputStrategy::Textarea,
            },
            send: "span:has( use[*|href=\"#pcicon-sendingBold-line\"])".to_string(),
        },
        reply: ReplySelectors {
            filter: "div[class^='answerItem']".to_string(),
            finish_flag: "span[data-icon-type='pcicon-upvote-line']".to_string(),
            content: ".tongyi-markdown".to_string(),
        },
        history: HistorySelectors {
            show: "span[data-icon-type=\"pcicon-kongzhi-control-line\"]".to_string(),
            reveal: Some("span[data-icon-type='pcicon-operateRight-line']".to_string()),
            input: Some(InputTarget {
                selector: "input[placeholder=\"搜索历史记录\"]".to_string(),
                strategy: InputStrategy::Controlled,
            }),
        },
        cleanup: Vec::new(),
    }
}

pub fn yuanbao() -> ProviderConfig {
    ProviderConfig {
        name: "Yuanbao".to_string(),
        url: "https://yuanbao.tencent.com/chat".to_string(),
        chat: ChatSelectors {
            new_chat: "[data-desc='new-chat']".to_string(),
            input: InputTarget {
                selector: ".ql-editor>p".to_string(),
                strategy: InputStrategy::Contenteditable,
            },
            send: "#yuanbao-send-btn".to_string(),
        },
        reply: ReplySelectors {
            filter: "div[data-conv-speaker=\"ai\"]".to_string(),
            finish_flag: ".agent-chat__toolbar__copy__icon".to_string(),
            content: ".hyc-common-markdown".to_string(),
        },
        history: HistorySelectors {
            show: "[dt-button-id='search_bar']".to_string(),
            reveal: None,
            input: Some(InputTarget {
                selector: "input[placeholder=\"搜索对话\"]".to_string(),
                strategy: InputStrategy::Controlled,
            }),
        },
        cleanup: vec![
            "div[class^='index_downloadPC']".to_string(),
            "div.agent-dialogue__tool".to_string(),
            ".input-guide-v2".to_string(),
        ],
    }
}

/// Build one adapter per known provider.
pub fn load_providers(timing: &ChainTiming) -> Vec<Arc<dyn ProviderAdapter>> {
    [chatgpt(), kimi(), qwen(), yuanbao()]
        .into_iter()
        .map(|config| {
            Arc::new(SiteAdapter::new(config, timing.clone())) as Arc<dyn ProviderAdapter>
        })
        .collect()
}

/// Wire every adapter to the shared executor once the surface is ready.
pub fn bind_executor(providers: &[Arc<dyn ProviderAdapter>], executor: &Arc<ScriptExecutor>) {
    for provider in providers {
        provider.bind_executor(Arc::clone(executor));
    }
}
