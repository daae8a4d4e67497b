//! Mutable document tree backing the simulated page.
//!
//! Markup is parsed with `scraper` and grafted into a single `ego_tree` arena.
//! Removed nodes are detached, so every traversal starts from the tree root.

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::HostError;

pub(crate) struct DomTree {
    html: Html,
}

impl DomTree {
    pub(crate) fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// A document at the earliest load phase: `<html>` with no head or body.
    pub(crate) fn bare() -> Self {
        let mut dom = Self::parse("");
        if let Some(root) = dom.document_element() {
            let children: Vec<NodeId> = dom
                .html
                .tree
                .get(root)
                .map(|node| node.children().map(|child| child.id()).collect())
                .unwrap_or_default();
            for child in children {
                if let Some(mut node) = dom.html.tree.get_mut(child) {
                    node.detach();
                }
            }
        }
        dom
    }

    pub(crate) fn document_element(&self) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .children()
            .find(|node| node.value().is_element())
            .map(|node| node.id())
    }

    pub(crate) fn head(&self) -> Option<NodeId> {
        self.child_element(self.document_element()?, "head")
    }

    pub(crate) fn body(&self) -> Option<NodeId> {
        self.child_element(self.document_element()?, "body")
    }

    fn child_element(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.html
            .tree
            .get(parent)?
            .children()
            .find(|node| {
                node.value()
                    .as_element()
                    .is_some_and(|element| element.name() == name)
            })
            .map(|node| node.id())
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    pub(crate) fn is_attached(&self, id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        match self.html.tree.get(id) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    /// True when `ancestor` is `node` itself or one of its ancestors.
    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        match self.html.tree.get(node) {
            Some(node) => node.id() == ancestor || node.ancestors().any(|a| a.id() == ancestor),
            None => false,
        }
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.html.tree.get(id)?.parent().map(|parent| parent.id())
    }

    pub(crate) fn query(&self, selector: &Selector) -> Option<NodeId> {
        self.find_below(self.html.tree.root(), selector)
    }

    pub(crate) fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches(element))
            .map(|element| element.id())
            .collect()
    }

    pub(crate) fn find_in_subtree(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        self.find_below(self.html.tree.get(id)?, selector)
    }

    fn find_below(&self, start: NodeRef<'_, Node>, selector: &Selector) -> Option<NodeId> {
        start
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|element| selector.matches(element))
            .map(|element| element.id())
    }

    pub(crate) fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.element(id)
            .is_some_and(|element| selector.matches(&element))
    }

    pub(crate) fn detach(&mut self, id: NodeId) -> Result<(), HostError> {
        if !self.is_attached(id) {
            return Err(HostError::Detached);
        }
        let mut node = self.html.tree.get_mut(id).ok_or(HostError::Detached)?;
        node.detach();
        Ok(())
    }

    /// Parses `markup` as a body fragment and appends its top-level nodes to `parent`.
    pub(crate) fn graft_fragment(
        &mut self,
        parent: NodeId,
        markup: &str,
    ) -> Result<Vec<NodeId>, HostError> {
        if !self.is_attached(parent) {
            return Err(HostError::Detached);
        }
        let fragment = Html::parse_fragment(markup);
        let mut added = Vec::new();
        for child in fragment.root_element().children() {
            if let Some(id) = copy_subtree(&mut self.html.tree, parent, child) {
                added.push(id);
            }
        }
        Ok(added)
    }

    /// Appends a `<head>` or `<body>` element parsed from `markup`.
    ///
    /// Fragment parsing drops these elements, so the markup is parsed as a
    /// whole document and the requested section is copied across.
    pub(crate) fn graft_section(
        &mut self,
        section: &str,
        markup: &str,
    ) -> Result<NodeId, HostError> {
        let root = self
            .document_element()
            .ok_or(HostError::Unavailable("document element"))?;
        if self.child_element(root, section).is_some() {
            return Err(HostError::Rejected(format!("<{section}> already exists")));
        }
        let parsed = Html::parse_document(&format!("<{section}>{markup}</{section}>"));
        let source = parsed
            .root_element()
            .children()
            .find(|node| {
                node.value()
                    .as_element()
                    .is_some_and(|element| element.name() == section)
            })
            .ok_or_else(|| HostError::Rejected(format!("markup has no <{section}>")))?;
        copy_subtree(&mut self.html.tree, root, source)
            .ok_or(HostError::Detached)
    }

    pub(crate) fn text(&self, id: NodeId) -> Option<String> {
        self.element(id).map(|element| element.text().collect())
    }

    pub(crate) fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .is_some_and(|element| element.value().classes().any(|c| c == class))
    }

    pub(crate) fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)
            .and_then(|element| element.value().attr(name).map(str::to_string))
    }

    /// Sets (`Some`) or removes (`None`) one attribute of an attached element.
    ///
    /// scraper elements are immutable, so the element is rebuilt from markup
    /// and swapped into the arena under the same node id.
    pub(crate) fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), HostError> {
        if !self.is_attached(id) {
            return Err(HostError::Detached);
        }
        let element = self
            .element(id)
            .ok_or_else(|| HostError::Rejected("not an element".to_string()))?;
        let tag = element.value().name().to_string();
        let mut attrs: Vec<(String, String)> = element
            .value()
            .attrs()
            .filter(|(key, _)| *key != name)
            .map(|(key, val)| (key.to_string(), val.to_string()))
            .collect();
        if let Some(value) = value {
            attrs.push((name.to_string(), value.to_string()));
        }
        let rebuilt = rebuild_element(&tag, &attrs)
            .ok_or_else(|| HostError::Rejected(format!("cannot rebuild <{tag}>")))?;
        let mut node = self.html.tree.get_mut(id).ok_or(HostError::Detached)?;
        *node.value() = rebuilt;
        Ok(())
    }

    pub(crate) fn serialize(&self) -> String {
        self.html.html()
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, HostError> {
    Selector::parse(selector).map_err(|err| HostError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{err:?}"),
    })
}

fn rebuild_element(tag: &str, attrs: &[(String, String)]) -> Option<Node> {
    let attrs: String = attrs
        .iter()
        .map(|(key, value)| {
            format!(" {key}=\"{}\"", value.replace('&', "&amp;").replace('"', "&quot;"))
        })
        .collect();
    let markup = format!("<{tag}{attrs}></{tag}>");
    let parsed = match tag {
        "html" => {
            let doc = Html::parse_document(&markup);
            return Some(Node::Element(doc.root_element().value().clone()));
        }
        "head" | "body" => Html::parse_document(&markup),
        _ => Html::parse_fragment(&markup),
    };
    let root = parsed.root_element();
    let element = root
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == tag)?;
    Some(Node::Element(element.value().clone()))
}

fn copy_subtree(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) -> Option<NodeId> {
    let id = tree.get_mut(parent)?.append(source.value().clone()).id();
    for child in source.children() {
        copy_subtree(tree, id, child);
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_document_has_only_the_root_element() {
        let dom = DomTree::bare();
        assert!(dom.document_element().is_some());
        assert_eq!(dom.head(), None);
        assert_eq!(dom.body(), None);
    }

    #[test]
    fn sections_can_be_attached_later() {
        let mut dom = DomTree::bare();
        dom.graft_section("body", "<div class=\"late\"></div>").unwrap();
        let body = dom.body().unwrap();
        let selector = parse_selector(".late").unwrap();
        let late = dom.query(&selector).unwrap();
        assert!(dom.contains(body, late));
        assert!(dom.graft_section("body", "").is_err());
    }

    #[test]
    fn detached_nodes_no_longer_match() {
        let mut dom = DomTree::parse("<body><p class=\"x\">a</p><p class=\"x\">b</p></body>");
        let selector = parse_selector("p.x").unwrap();
        let first = dom.query(&selector).unwrap();
        dom.detach(first).unwrap();
        assert!(!dom.is_attached(first));
        assert_eq!(dom.query_all(&selector).len(), 1);
        assert_eq!(dom.detach(first), Err(HostError::Detached));
    }

    #[test]
    fn grafted_fragment_is_searchable() {
        let mut dom = DomTree::parse("<body></body>");
        let body = dom.body().unwrap();
        let added = dom
            .graft_fragment(body, "<section><span id=\"deep\">x</span></section><p></p>")
            .unwrap();
        assert_eq!(added.len(), 2);
        let selector = parse_selector("#deep").unwrap();
        let deep = dom.find_in_subtree(added[0], &selector).unwrap();
        assert_eq!(dom.text(deep).as_deref(), Some("x"));
        assert_eq!(dom.find_in_subtree(added[1], &selector), None);
    }

    #[test]
    fn attribute_changes_are_visible_to_selectors() {
        let mut dom = DomTree::parse("<body class=\"a b\"><div class=\"x pending\">t</div></body>");
        let body = dom.body().unwrap();
        let pending = parse_selector("div.x:not(.pending)").unwrap();
        let div = dom.query(&parse_selector("div.x").unwrap()).unwrap();
        assert!(!dom.matches(div, &pending));

        dom.set_attribute(div, "class", Some("x")).unwrap();
        assert!(dom.matches(div, &pending));
        assert_eq!(dom.text(div).as_deref(), Some("t"));

        dom.set_attribute(body, "class", None).unwrap();
        assert!(!dom.has_class(body, "a"));
        assert_eq!(dom.body(), Some(body));
    }

    #[test]
    fn invalid_selector_is_reported() {
        assert!(matches!(
            parse_selector("div[[["),
            Err(HostError::InvalidSelector { .. })
        ));
    }
}
