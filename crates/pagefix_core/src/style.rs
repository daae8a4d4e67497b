//! Stylesheet generation.
//!
//! The generator is a pure function of the configuration and selector set. It
//! emits a fixed list of independent rule groups; a group whose feature is off
//! or whose selector is undefined is skipped and reported, never half-written.

use std::fmt;

use crate::config::{enabled_value, TunerConfig};
use crate::selectors::{SelectorRole, SelectorSet};

pub const PRODUCT_NAME: &str = "pagefix";
pub const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

const MONOSPACE_STACK: &str =
    "'Fira Code', Consolas, Monaco, 'Andale Mono', 'Ubuntu Mono', monospace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleGroup {
    ScrollContainer,
    MessageItem,
    CodeBlockContainer,
    CodeContent,
    CopyButton,
    CodeFooter,
    ForcedTheme,
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleGroup::ScrollContainer => "scroll container",
            RuleGroup::MessageItem => "message item",
            RuleGroup::CodeBlockContainer => "code block container",
            RuleGroup::CodeContent => "code content area",
            RuleGroup::CopyButton => "copy button",
            RuleGroup::CodeFooter => "code block footer",
            RuleGroup::ForcedTheme => "forced code block theme",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FeatureDisabled,
    SelectorMissing(SelectorRole),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedGroup {
    pub group: RuleGroup,
    pub reason: SkipReason,
}

/// Generated CSS plus a record of which groups made it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSheet {
    pub css: String,
    pub emitted: Vec<RuleGroup>,
    pub skipped: Vec<SkippedGroup>,
}

impl StyleSheet {
    pub fn contains_group(&self, group: RuleGroup) -> bool {
        self.emitted.contains(&group)
    }

    /// Undefined selector roles that caused a skip, each listed once.
    pub fn missing_roles(&self) -> Vec<SelectorRole> {
        let mut roles = Vec::new();
        for skipped in &self.skipped {
            if let SkipReason::SelectorMissing(role) = skipped.reason {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }
        roles
    }
}

struct Rule {
    selector: String,
    declarations: Vec<String>,
}

impl Rule {
    fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            declarations: Vec::new(),
        }
    }

    fn decl(mut self, property: &str, value: &str) -> Self {
        self.declarations.push(format!("{property}: {value};"));
        self
    }

    fn important(mut self, property: &str, value: &str) -> Self {
        self.declarations
            .push(format!("{property}: {value} !important;"));
        self
    }

    fn important_if(self, condition: bool, property: &str, value: &str) -> Self {
        if condition {
            self.important(property, value)
        } else {
            self
        }
    }

    /// Zeroes motion, including the duration longhands that inherited rules may set.
    fn motion_off(self, disable: bool) -> Self {
        if !disable {
            return self;
        }
        self.important("transition", "none")
            .important("animation", "none")
            .important("animation-duration", "0s")
            .important("transition-duration", "0s")
    }

    fn render(&self, out: &mut String) {
        out.push_str(&self.selector);
        out.push_str(" {\n");
        for declaration in &self.declarations {
            out.push_str("  ");
            out.push_str(declaration);
            out.push('\n');
        }
        out.push_str("}\n");
    }
}

struct SheetBuilder {
    css: String,
    emitted: Vec<RuleGroup>,
    skipped: Vec<SkippedGroup>,
}

impl SheetBuilder {
    fn new() -> Self {
        Self {
            css: format!("/* {PRODUCT_NAME} v{PRODUCT_VERSION} */\n"),
            emitted: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn group(&mut self, group: RuleGroup, rules: Result<Vec<Rule>, SkipReason>) {
        match rules {
            Ok(rules) if !rules.is_empty() => {
                self.css.push_str(&format!("\n/* {group} */\n"));
                for rule in &rules {
                    rule.render(&mut self.css);
                }
                self.emitted.push(group);
            }
            Ok(_) => self.skipped.push(SkippedGroup {
                group,
                reason: SkipReason::FeatureDisabled,
            }),
            Err(reason) => self.skipped.push(SkippedGroup { group, reason }),
        }
    }

    fn finish(self) -> StyleSheet {
        StyleSheet {
            css: self.css,
            emitted: self.emitted,
            skipped: self.skipped,
        }
    }
}

/// Composes the tuner stylesheet. Never fails; undefined selectors and disabled
/// features only remove their group.
pub fn generate_stylesheet(config: &TunerConfig, selectors: &SelectorSet) -> StyleSheet {
    let mut sheet = SheetBuilder::new();

    sheet.group(
        RuleGroup::ScrollContainer,
        scroll_container(config, selectors),
    );
    sheet.group(RuleGroup::MessageItem, message_item(config, selectors));

    match code_block_selectors(config, selectors) {
        Ok(code) => {
            sheet.group(
                RuleGroup::CodeBlockContainer,
                Ok(vec![code_block_container(config, code.container)]),
            );
            sheet.group(
                RuleGroup::CodeContent,
                Ok(vec![code_content(config, code.content)]),
            );
            sheet.group(
                RuleGroup::CopyButton,
                copy_button(config, code.container, code.copy_button),
            );
            sheet.group(RuleGroup::CodeFooter, Ok(vec![code_footer(code.container)]));
            sheet.group(RuleGroup::ForcedTheme, forced_theme(config, &code));
        }
        Err(reason) => {
            for group in [
                RuleGroup::CodeBlockContainer,
                RuleGroup::CodeContent,
                RuleGroup::CopyButton,
                RuleGroup::CodeFooter,
                RuleGroup::ForcedTheme,
            ] {
                sheet.group(group, Err(reason));
            }
        }
    }

    sheet.finish()
}

fn scroll_container(
    config: &TunerConfig,
    selectors: &SelectorSet,
) -> Result<Vec<Rule>, SkipReason> {
    let selector = require(selectors, SelectorRole::ScrollContainer)?;
    let behavior = if config.smooth_scroll { "smooth" } else { "auto" };
    Ok(vec![Rule::new(selector)
        .decl("contain", "layout paint style")
        .decl("will-change", "transform")
        .important("scroll-behavior", behavior)
        .decl("scrollbar-gutter", "stable both-edges")])
}

fn message_item(config: &TunerConfig, selectors: &SelectorSet) -> Result<Vec<Rule>, SkipReason> {
    let selector = require(selectors, SelectorRole::MessageItem)?;
    let mut rule = Rule::new(selector)
        .decl("contain", "content")
        .motion_off(config.disable_animations);
    if config.content_visibility.enabled {
        rule = rule.decl("content-visibility", "auto");
        if let Some(size) = enabled_value(&config.content_visibility.placeholder_size) {
            rule = rule.decl("contain-intrinsic-size", size);
        }
    }
    Ok(vec![rule])
}

struct CodeSelectors<'a> {
    container: &'a str,
    content: &'a str,
    copy_button: Option<&'a str>,
}

fn code_block_selectors<'a>(
    config: &TunerConfig,
    selectors: &'a SelectorSet,
) -> Result<CodeSelectors<'a>, SkipReason> {
    if !config.code_blocks.optimize {
        return Err(SkipReason::FeatureDisabled);
    }
    Ok(CodeSelectors {
        container: require(selectors, SelectorRole::CodeBlockContainer)?,
        content: require(selectors, SelectorRole::CodeContent)?,
        copy_button: selectors.get(SelectorRole::CopyButton),
    })
}

fn code_block_container(config: &TunerConfig, container: &str) -> Rule {
    Rule::new(container)
        .important("display", "block")
        .important("position", "relative")
        .decl("contain", "layout style paint")
        .decl("box-sizing", "border-box")
        .motion_off(config.disable_animations)
        .important("margin-top", "8px")
        .important("margin-bottom", "8px")
}

fn code_content(config: &TunerConfig, content: &str) -> Rule {
    let max_height = enabled_value(&config.code_blocks.max_height);
    Rule::new(content)
        .important("display", "block")
        .decl("box-sizing", "border-box")
        .decl("contain", "content")
        .decl("will-change", "scroll-position")
        .important_if(max_height.is_some(), "max-height", max_height.unwrap_or_default())
        .important("overflow-y", "auto")
        .important("overflow-x", "auto")
        .important("padding", "0.8em 1em")
        .important("padding-right", "55px")
        .important("padding-bottom", "0.8em")
        .important("margin", "0")
        .important("min-height", "unset")
        .motion_off(config.disable_animations)
        .important("white-space", "pre")
        .important("word-wrap", "normal")
}

fn copy_button(
    config: &TunerConfig,
    container: &str,
    copy_button: Option<&str>,
) -> Result<Vec<Rule>, SkipReason> {
    let button = copy_button.ok_or(SkipReason::SelectorMissing(SelectorRole::CopyButton))?;
    let positioned = Rule::new(format!("{container} {button}"))
        .important("position", "absolute")
        .important("top", "5px")
        .important("right", "5px")
        .important("z-index", "10")
        .important("opacity", "0.6")
        .important_if(
            !config.disable_animations,
            "transition",
            "opacity 0.2s ease-in-out",
        )
        .important("cursor", "pointer");
    let revealed = Rule::new(format!(
        "{container}:hover {button},\n{container} {button}:hover,\n{container} {button}:focus"
    ))
    .important("opacity", "1");
    Ok(vec![positioned, revealed])
}

fn code_footer(container: &str) -> Rule {
    Rule::new(format!("{container} > footer")).important("margin", "0")
}

fn forced_theme(config: &TunerConfig, code: &CodeSelectors<'_>) -> Result<Vec<Rule>, SkipReason> {
    if !config.code_blocks.force_basic_style {
        return Err(SkipReason::FeatureDisabled);
    }
    let theme = &config.code_blocks.theme;
    let content = code.content;

    let mut surface = Rule::new(content);
    if let Some(background) = enabled_value(&theme.background_color) {
        surface = surface.important("background-color", background);
    }
    if let Some(border) = enabled_value(&theme.border) {
        surface = surface.important("border", border);
    }
    if let Some(color) = enabled_value(&theme.text_color) {
        surface = surface.important("color", color);
    }

    let mut rules = vec![
        surface,
        Rule::new(format!("{content} pre, {content} code, {content} span"))
            .important("font-family", MONOSPACE_STACK)
            .important("font-size", "0.9em")
            .important("line-height", "1.4")
            .important("color", "inherit")
            .important("background", "none")
            .important("white-space", "inherit"),
    ];

    if let Some(button) = code.copy_button {
        let container = code.container;
        rules.push(
            Rule::new(format!("{container} {button}"))
                .important("background-color", "#444")
                .important("color", "#ccc")
                .important("border", "1px solid #666")
                .important("border-radius", "4px")
                .important("padding", "2px 6px"),
        );
        rules.push(
            Rule::new(format!("{container} {button}:hover"))
                .important("background-color", "#555")
                .important("color", "#eee"),
        );
    }
    Ok(rules)
}

fn require(selectors: &SelectorSet, role: SelectorRole) -> Result<&str, SkipReason> {
    selectors
        .get(role)
        .ok_or(SkipReason::SelectorMissing(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TunerConfig;
    use pretty_assertions::assert_eq;

    fn all_groups_config() -> TunerConfig {
        let mut config = TunerConfig::default();
        config.code_blocks.force_basic_style = true;
        config.content_visibility.enabled = true;
        config
    }

    #[test]
    fn default_config_emits_every_group_except_forced_theme() {
        let sheet = generate_stylesheet(&TunerConfig::default(), &SelectorSet::default());
        assert_eq!(
            sheet.emitted,
            vec![
                RuleGroup::ScrollContainer,
                RuleGroup::MessageItem,
                RuleGroup::CodeBlockContainer,
                RuleGroup::CodeContent,
                RuleGroup::CopyButton,
                RuleGroup::CodeFooter,
            ]
        );
        assert_eq!(
            sheet.skipped,
            vec![SkippedGroup {
                group: RuleGroup::ForcedTheme,
                reason: SkipReason::FeatureDisabled,
            }]
        );
        assert!(sheet.css.starts_with("/* pagefix v"));
    }

    #[test]
    fn default_chat_rules_target_classes() {
        let sheet = generate_stylesheet(&TunerConfig::default(), &SelectorSet::default());
        assert!(sheet.css.contains(".ms-autoscroll-container {"));
        assert!(sheet.css.contains(".ms-chat-turn {"));
        assert!(sheet
            .css
            .contains("div.syntax-highlighted-code-wrapper > footer {\n  margin: 0 !important;"));
        assert!(!sheet
            .css
            .lines()
            .any(|line| line.starts_with("ms-chat-turn") || line.starts_with("ms-autoscroll")));
    }

    #[test]
    fn max_height_is_interpolated_verbatim() {
        let sheet = generate_stylesheet(&TunerConfig::default(), &SelectorSet::default());
        assert!(sheet.css.contains(
            "div.syntax-highlighted-code {\n  display: block !important;"
        ));
        assert!(sheet.css.contains("max-height: 70vh !important;"));
        assert!(!sheet.css.contains("max-height: none"));
    }

    #[test]
    fn none_sentinel_drops_the_height_bound() {
        for sentinel in ["none", "None", " none ", ""] {
            let mut config = TunerConfig::default();
            config.code_blocks.max_height = sentinel.to_string();
            let sheet = generate_stylesheet(&config, &SelectorSet::default());
            assert!(sheet.contains_group(RuleGroup::CodeContent));
            assert!(!sheet.css.contains("max-height"), "sentinel {sentinel:?}");
        }
    }

    #[test]
    fn disabled_code_blocks_emit_no_code_rules() {
        let mut config = all_groups_config();
        config.code_blocks.optimize = false;
        let selectors = SelectorSet::default();
        let sheet = generate_stylesheet(&config, &selectors);

        assert!(!sheet.css.contains(&selectors.code_block_container));
        assert!(!sheet.css.contains(&selectors.code_content));
        assert!(!sheet.css.contains("max-height"));
        assert_eq!(
            sheet.emitted,
            vec![RuleGroup::ScrollContainer, RuleGroup::MessageItem]
        );
        assert!(sheet
            .skipped
            .iter()
            .all(|skipped| skipped.reason == SkipReason::FeatureDisabled));
    }

    #[test]
    fn disabled_forced_theme_emits_no_theme_rules() {
        let mut config = all_groups_config();
        config.code_blocks.force_basic_style = false;
        let sheet = generate_stylesheet(&config, &SelectorSet::default());
        assert!(!sheet.contains_group(RuleGroup::ForcedTheme));
        assert!(!sheet.css.contains(&config.code_blocks.theme.background_color));
        assert!(!sheet.css.contains("font-family"));
    }

    #[test]
    fn motion_flag_controls_every_motion_property() {
        let sheet = generate_stylesheet(&all_groups_config(), &SelectorSet::default());
        assert!(sheet.css.contains("animation-duration: 0s !important;"));
        assert!(sheet.css.contains("transition-duration: 0s !important;"));
        assert!(!sheet.css.contains("opacity 0.2s"));

        let mut config = all_groups_config();
        config.disable_animations = false;
        let sheet = generate_stylesheet(&config, &SelectorSet::default());
        assert!(!sheet.css.contains("animation"));
        assert!(!sheet.css.contains("transition: none"));
        assert!(!sheet.css.contains("transition-duration"));
        assert!(sheet.css.contains("transition: opacity 0.2s ease-in-out !important;"));
    }

    #[test]
    fn content_visibility_is_opt_in() {
        let sheet = generate_stylesheet(&TunerConfig::default(), &SelectorSet::default());
        assert!(!sheet.css.contains("content-visibility"));

        let sheet = generate_stylesheet(&all_groups_config(), &SelectorSet::default());
        assert!(sheet.css.contains("content-visibility: auto;"));
        assert!(sheet.css.contains("contain-intrinsic-size: auto 200px;"));
    }

    #[test]
    fn smooth_scroll_toggles_behavior_value() {
        let mut config = TunerConfig::default();
        config.smooth_scroll = false;
        let sheet = generate_stylesheet(&config, &SelectorSet::default());
        assert!(sheet.css.contains("scroll-behavior: auto !important;"));
        assert!(!sheet.css.contains("scroll-behavior: smooth"));
    }

    #[test]
    fn missing_code_selector_skips_all_code_groups() {
        let selectors = SelectorSet {
            code_content: String::new(),
            ..SelectorSet::default()
        };
        let sheet = generate_stylesheet(&all_groups_config(), &selectors);
        assert_eq!(
            sheet.emitted,
            vec![RuleGroup::ScrollContainer, RuleGroup::MessageItem]
        );
        assert_eq!(sheet.missing_roles(), vec![SelectorRole::CodeContent]);
        assert!(!sheet.css.contains(&selectors.code_block_container));
    }

    #[test]
    fn missing_copy_button_keeps_other_code_groups() {
        let selectors = SelectorSet {
            copy_button: " ".to_string(),
            ..SelectorSet::default()
        };
        let sheet = generate_stylesheet(&all_groups_config(), &selectors);
        assert!(sheet.contains_group(RuleGroup::CodeContent));
        assert!(sheet.contains_group(RuleGroup::ForcedTheme));
        assert!(!sheet.contains_group(RuleGroup::CopyButton));
        assert!(!sheet.css.contains("mattooltip"));
        assert_eq!(sheet.missing_roles(), vec![SelectorRole::CopyButton]);
    }

    #[test]
    fn every_selector_missing_still_yields_valid_css() {
        let selectors = SelectorSet {
            scroll_container: String::new(),
            message_item: String::new(),
            code_block_container: String::new(),
            code_content: String::new(),
            copy_button: String::new(),
            cookie_banner: String::new(),
            banner_page_classes: Vec::new(),
        };
        let sheet = generate_stylesheet(&all_groups_config(), &selectors);
        assert!(sheet.emitted.is_empty());
        assert_eq!(sheet.css.matches('{').count(), 0);
        assert_eq!(
            sheet.missing_roles(),
            vec![
                SelectorRole::ScrollContainer,
                SelectorRole::MessageItem,
                SelectorRole::CodeBlockContainer,
            ]
        );
    }

    #[test]
    fn braces_stay_balanced_for_all_groups() {
        let sheet = generate_stylesheet(&all_groups_config(), &SelectorSet::default());
        assert_eq!(sheet.css.matches('{').count(), sheet.css.matches('}').count());
        assert_eq!(sheet.emitted.len(), 7);
    }

    #[test]
    fn theme_values_are_used_literally() {
        let mut config = all_groups_config();
        config.code_blocks.theme.border = "2px dashed rebeccapurple".to_string();
        config.code_blocks.theme.text_color = "none".to_string();
        let sheet = generate_stylesheet(&config, &SelectorSet::default());
        assert!(sheet
            .css
            .contains("border: 2px dashed rebeccapurple !important;"));
        assert!(!sheet.css.contains("color: none"));
    }
}
