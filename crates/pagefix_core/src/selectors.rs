use std::fmt;

use serde::Deserialize;

/// Logical page regions the tuner addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorRole {
    ScrollContainer,
    MessageItem,
    CodeBlockContainer,
    CodeContent,
    CopyButton,
    CookieBanner,
}

impl fmt::Display for SelectorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectorRole::ScrollContainer => "scroll_container",
            SelectorRole::MessageItem => "message_item",
            SelectorRole::CodeBlockContainer => "code_block_container",
            SelectorRole::CodeContent => "code_content",
            SelectorRole::CopyButton => "copy_button",
            SelectorRole::CookieBanner => "cookie_banner",
        };
        f.write_str(name)
    }
}

/// Page-specific query expressions keyed by role.
///
/// Values are opaque to the tuner; an empty or blank value means the role is
/// not defined for the current page markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub scroll_container: String,
    pub message_item: String,
    pub code_block_container: String,
    pub code_content: String,
    pub copy_button: String,
    pub cookie_banner: String,
    /// Classes the host keeps on `<html>`/`<body>` while the banner is shown.
    pub banner_page_classes: Vec<String>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            scroll_container: ".ms-autoscroll-container".to_string(),
            message_item: ".ms-chat-turn".to_string(),
            code_block_container: "div.syntax-highlighted-code-wrapper".to_string(),
            code_content: "div.syntax-highlighted-code".to_string(),
            copy_button: "footer button[mattooltip*=\"Copy\"]".to_string(),
            cookie_banner: ".glue-cookie-notification-bar".to_string(),
            banner_page_classes: vec!["glue-cookie-notification-bar-visible".to_string()],
        }
    }
}

impl SelectorSet {
    pub fn get(&self, role: SelectorRole) -> Option<&str> {
        let raw = match role {
            SelectorRole::ScrollContainer => &self.scroll_container,
            SelectorRole::MessageItem => &self.message_item,
            SelectorRole::CodeBlockContainer => &self.code_block_container,
            SelectorRole::CodeContent => &self.code_content,
            SelectorRole::CopyButton => &self.copy_button,
            SelectorRole::CookieBanner => &self.cookie_banner,
        };
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn banner_page_classes(&self) -> impl Iterator<Item = &str> {
        self.banner_page_classes
            .iter()
            .map(|class| class.trim())
            .filter(|class| !class.is_empty())
    }
}
