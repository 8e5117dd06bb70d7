//! In-memory page implementing [`Dom`].
//!
//! Elements are declared with the exact selector strings they answer to, so
//! no CSS engine is involved: `query(sel)` returns the first connected element
//! (document order) whose selector list contains `sel`, or that carries the
//! class when `sel` is `.class`. Side effects are recorded as [`PageEvent`]s.
//!
//! Used by the tests, the replay driver and the interactive terminal mode.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::dom::{Dom, Element};

/// Declarative element description; also the TOML page format.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ElementSpec {
    pub name: String,
    pub tag: String,
    pub selectors: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub styles: BTreeMap<String, String>,
    pub classes: Vec<String>,
    /// Not rendered (no offset parent).
    pub hidden: bool,
    /// Not attached to the document until `attach` is called.
    pub detached: bool,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn selector(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn style(mut self, name: &str, value: &str) -> Self {
        self.styles.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// A whole page: top-level elements plus the initially focused element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageSpec {
    pub elements: Vec<ElementSpec>,
    pub focus: Option<String>,
}

/// Recorded side effect, identified by element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Clicked(String),
    Focused(String),
    TextSelected(String),
    ScrolledTo(String),
    OverlayShown(Vec<String>),
    OverlayHidden,
}

struct Node {
    name: String,
    tag: String,
    selectors: Vec<String>,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    classes: Vec<String>,
    rendered: bool,
    attached: bool,
    parent: Option<Element>,
    children: Vec<Element>,
}

#[derive(Default)]
pub struct MemoryPage {
    nodes: Vec<Node>,
    roots: Vec<Element>,
    focused: Option<Element>,
    overlay: Option<Vec<String>>,
    events: Vec<PageEvent>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_spec(spec: PageSpec) -> Result<Self> {
        let mut page = Self::new();
        for element in spec.elements {
            page.add(element);
        }
        if let Some(name) = spec.focus {
            let el = page
                .find(&name)
                .with_context(|| format!("focus target '{name}' is not declared"))?;
            page.focused = Some(el);
        }
        Ok(page)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let spec: PageSpec = toml::from_str(text).context("failed to parse page")?;
        Self::from_spec(spec)
    }

    /// Add a top-level element (with its children). Returns its handle.
    pub fn add(&mut self, spec: ElementSpec) -> Element {
        let el = self.insert(spec, None);
        self.roots.push(el);
        el
    }

    fn insert(&mut self, spec: ElementSpec, parent: Option<Element>) -> Element {
        let el = Element(self.nodes.len() as u32);
        let tag = if spec.tag.is_empty() {
            "DIV".to_string()
        } else {
            spec.tag.to_ascii_uppercase()
        };
        self.nodes.push(Node {
            name: spec.name,
            tag,
            selectors: spec.selectors,
            attrs: spec.attrs,
            styles: spec.styles,
            classes: spec.classes,
            rendered: !spec.hidden,
            attached: !spec.detached,
            parent,
            children: Vec::new(),
        });
        for child in spec.children {
            let child_el = self.insert(child, Some(el));
            self.nodes[el.0 as usize].children.push(child_el);
        }
        el
    }

    /// Look up an element by name.
    pub fn find(&self, name: &str) -> Option<Element> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| Element(i as u32))
    }

    pub fn name(&self, element: Element) -> &str {
        self.node(element).map(|n| n.name.as_str()).unwrap_or("?")
    }

    pub fn attach(&mut self, element: Element) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize) {
            debug!("page: attach {}", node.name);
            node.attached = true;
        }
    }

    pub fn detach(&mut self, element: Element) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize) {
            debug!("page: detach {}", node.name);
            node.attached = false;
        }
        if self.focused.is_some_and(|f| !self.is_connected(f)) {
            self.focused = None;
        }
    }

    pub fn set_rendered(&mut self, element: Element, rendered: bool) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize) {
            node.rendered = rendered;
        }
    }

    /// Move focus without recording an event (the user clicking into a field).
    pub fn set_focus(&mut self, element: Option<Element>) {
        self.focused = element;
    }

    pub fn has_class(&self, element: Element, class: &str) -> bool {
        self.node(element)
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    pub fn overlay(&self) -> Option<&[String]> {
        self.overlay.as_deref()
    }

    pub fn events(&self) -> &[PageEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<PageEvent> {
        std::mem::take(&mut self.events)
    }

    fn node(&self, element: Element) -> Option<&Node> {
        self.nodes.get(element.0 as usize)
    }

    /// Attached along the whole ancestor chain.
    fn is_connected(&self, element: Element) -> bool {
        let mut cur = Some(element);
        while let Some(el) = cur {
            match self.node(el) {
                Some(node) if node.attached => cur = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn matches(&self, element: Element, selector: &str) -> bool {
        let Some(node) = self.node(element) else {
            return false;
        };
        if node.selectors.iter().any(|s| s == selector) {
            return true;
        }
        match selector.strip_prefix('.') {
            Some(class) => node.classes.iter().any(|c| c == class),
            None => false,
        }
    }

    /// Pre-order traversal of the subtrees rooted at `roots`.
    fn preorder(&self, roots: &[Element], out: &mut Vec<Element>) {
        for &el in roots {
            out.push(el);
            if let Some(node) = self.node(el) {
                self.preorder(&node.children, out);
            }
        }
    }

    fn connected_in_order(&self) -> Vec<Element> {
        let mut all = Vec::new();
        self.preorder(&self.roots, &mut all);
        all.retain(|&el| self.is_connected(el));
        all
    }

    fn descendants(&self, root: Element) -> Vec<Element> {
        let mut out = Vec::new();
        if let Some(node) = self.node(root) {
            self.preorder(&node.children, &mut out);
        }
        // Detached subtrees stay queryable from their own root.
        out.retain(|&el| {
            let mut cur = Some(el);
            while let Some(c) = cur {
                if c == root {
                    return true;
                }
                match self.node(c) {
                    Some(node) if node.attached => cur = node.parent,
                    _ => return false,
                }
            }
            true
        });
        out
    }

    fn record(&mut self, event: PageEvent) {
        debug!("page: {event:?}");
        self.events.push(event);
    }
}

impl Dom for MemoryPage {
    fn query(&self, selector: &str) -> Option<Element> {
        self.connected_in_order()
            .into_iter()
            .find(|&el| self.matches(el, selector))
    }

    fn query_all(&self, selector: &str) -> Vec<Element> {
        self.connected_in_order()
            .into_iter()
            .filter(|&el| self.matches(el, selector))
            .collect()
    }

    fn query_in(&self, root: Element, selector: &str) -> Option<Element> {
        self.descendants(root)
            .into_iter()
            .find(|&el| self.matches(el, selector))
    }

    fn query_all_in(&self, root: Element, selector: &str) -> Vec<Element> {
        self.descendants(root)
            .into_iter()
            .filter(|&el| self.matches(el, selector))
            .collect()
    }

    fn children(&self, element: Element) -> Vec<Element> {
        self.node(element)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|&c| self.node(c).is_some_and(|cn| cn.attached))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn tag_name(&self, element: Element) -> String {
        self.node(element).map(|n| n.tag.clone()).unwrap_or_default()
    }

    fn attribute(&self, element: Element, name: &str) -> Option<String> {
        self.node(element)?.attrs.get(name).cloned()
    }

    fn style_property(&self, element: Element, name: &str) -> Option<String> {
        self.node(element)?
            .styles
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn is_rendered(&self, element: Element) -> bool {
        if !self.is_connected(element) {
            return false;
        }
        let mut cur = Some(element);
        while let Some(el) = cur {
            match self.node(el) {
                Some(node) if node.rendered => cur = node.parent,
                _ => return false,
            }
        }
        true
    }

    fn active_element(&self) -> Option<Element> {
        self.focused
    }

    fn click(&mut self, element: Element) {
        let name = self.name(element).to_string();
        self.record(PageEvent::Clicked(name));
    }

    fn focus(&mut self, element: Element) {
        self.focused = Some(element);
        let name = self.name(element).to_string();
        self.record(PageEvent::Focused(name));
    }

    fn select_text(&mut self, element: Element) {
        let name = self.name(element).to_string();
        self.record(PageEvent::TextSelected(name));
    }

    fn scroll_into_view(&mut self, element: Element) {
        let name = self.name(element).to_string();
        self.record(PageEvent::ScrolledTo(name));
    }

    fn add_class(&mut self, element: Element, class: &str) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize)
            && !node.classes.iter().any(|c| c == class)
        {
            node.classes.push(class.to_string());
        }
    }

    fn remove_class(&mut self, element: Element, class: &str) {
        if let Some(node) = self.nodes.get_mut(element.0 as usize) {
            node.classes.retain(|c| c != class);
        }
    }

    fn set_help_overlay(&mut self, lines: Option<&[String]>) {
        self.overlay = lines.map(<[String]>::to_vec);
        let event = match lines {
            Some(lines) => PageEvent::OverlayShown(lines.to_vec()),
            None => PageEvent::OverlayHidden,
        };
        self.record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryPage {
        let mut page = MemoryPage::new();
        page.add(
            ElementSpec::new("feed")
                .selector("feed")
                .child(ElementSpec::new("p0").selector("post"))
                .child(ElementSpec::new("p1").selector("post").hidden())
                .child(ElementSpec::new("p2").selector("post").detached()),
        );
        page
    }

    #[test]
    fn query_respects_document_order_and_attachment() {
        let page = sample();
        let posts = page.query_all("post");
        let names: Vec<&str> = posts.iter().map(|&p| page.name(p)).collect();
        assert_eq!(names, vec!["p0", "p1"]);
        assert_eq!(page.query("post").map(|p| page.name(p)), Some("p0"));
    }

    #[test]
    fn hidden_elements_are_queryable_but_not_rendered() {
        let page = sample();
        let p1 = page.find("p1").unwrap();
        assert!(page.query_all("post").contains(&p1));
        assert!(!page.is_rendered(p1));
        assert!(page.is_rendered(page.find("p0").unwrap()));
    }

    #[test]
    fn attach_makes_element_visible_to_queries() {
        let mut page = sample();
        let p2 = page.find("p2").unwrap();
        assert!(!page.query_all("post").contains(&p2));
        page.attach(p2);
        assert!(page.query_all("post").contains(&p2));
    }

    #[test]
    fn detaching_parent_hides_subtree() {
        let mut page = sample();
        let feed = page.find("feed").unwrap();
        page.detach(feed);
        assert!(page.query("post").is_none());
        // Still reachable from the detached root itself.
        assert!(page.query_in(feed, "post").is_some());
    }

    #[test]
    fn class_selector_matches() {
        let mut page = sample();
        let p0 = page.find("p0").unwrap();
        page.add_class(p0, "hl");
        assert_eq!(page.query(".hl"), Some(p0));
        page.remove_class(p0, "hl");
        assert!(page.query(".hl").is_none());
    }

    #[test]
    fn side_effects_are_recorded() {
        let mut page = sample();
        let p0 = page.find("p0").unwrap();
        page.click(p0);
        page.focus(p0);
        assert_eq!(
            page.take_events(),
            vec![
                PageEvent::Clicked("p0".into()),
                PageEvent::Focused("p0".into())
            ]
        );
        assert_eq!(page.active_element(), Some(p0));
        assert!(page.events().is_empty());
    }

    #[test]
    fn from_toml_builds_tree() {
        let text = r#"
            focus = "box"

            [[elements]]
            name = "box"
            tag = "textarea"

            [[elements]]
            name = "tabs"
            selectors = ["tabs"]
            [[elements.children]]
            name = "t0"
            styles = { "border-bottom-color" = "blue" }
        "#;
        let page = MemoryPage::from_toml(text).unwrap();
        let tabs = page.query("tabs").unwrap();
        let t0 = page.children(tabs)[0];
        assert_eq!(page.name(t0), "t0");
        assert_eq!(
            page.style_property(t0, "border-bottom-color").as_deref(),
            Some("blue")
        );
        assert_eq!(page.tag_name(page.active_element().unwrap()), "TEXTAREA");
    }

    #[test]
    fn unknown_focus_target_is_an_error() {
        let spec = PageSpec {
            elements: vec![],
            focus: Some("nowhere".into()),
        };
        assert!(MemoryPage::from_spec(spec).is_err());
    }
}
