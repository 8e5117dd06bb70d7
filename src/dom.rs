//! DOM collaborator: element handles, the query/side-effect trait, and the
//! host page selectors the engine relies on.
//!
//! The engine never owns page elements. An `Element` is a lookup-only handle;
//! whether it still refers to something live is for the `Dom` to decide.

/// Opaque handle to a page element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(pub u32);

/// Host page access. Queries take a selector string and return elements in
/// document order; side effects are fire-and-forget.
pub trait Dom {
    /// First element matching `selector`.
    fn query(&self, selector: &str) -> Option<Element>;
    /// All elements matching `selector`.
    fn query_all(&self, selector: &str) -> Vec<Element>;
    /// First descendant of `root` matching `selector`.
    fn query_in(&self, root: Element, selector: &str) -> Option<Element>;
    /// All descendants of `root` matching `selector`.
    fn query_all_in(&self, root: Element, selector: &str) -> Vec<Element>;
    fn children(&self, element: Element) -> Vec<Element>;
    /// Upper-case tag name (`INPUT`, `DIV`, ...).
    fn tag_name(&self, element: Element) -> String;
    fn attribute(&self, element: Element, name: &str) -> Option<String>;
    /// Inline style property value, `None` when unset or empty.
    fn style_property(&self, element: Element, name: &str) -> Option<String>;
    /// Whether the element takes part in layout (has an offset parent).
    fn is_rendered(&self, element: Element) -> bool;
    /// The element holding keyboard focus, if any.
    fn active_element(&self) -> Option<Element>;

    fn click(&mut self, element: Element);
    fn focus(&mut self, element: Element);
    fn select_text(&mut self, element: Element);
    fn scroll_into_view(&mut self, element: Element);
    fn add_class(&mut self, element: Element, class: &str);
    fn remove_class(&mut self, element: Element, class: &str);
    /// Show the help overlay with the given lines, or hide it with `None`.
    fn set_help_overlay(&mut self, lines: Option<&[String]>);
}

/// Whether `element` accepts typed text, in which case shortcuts stay out of
/// the way.
pub fn is_text_entry(dom: &dyn Dom, element: Element) -> bool {
    let tag = dom.tag_name(element);
    tag == "INPUT"
        || tag == "TEXTAREA"
        || dom.attribute(element, "role").as_deref() == Some("textbox")
}

/// Whether keyboard focus currently sits in a text entry control.
pub fn text_entry_focused(dom: &dyn Dom) -> bool {
    dom.active_element().is_some_and(|el| is_text_entry(dom, el))
}

// ---------------------------------------------------------------------------
// Host page selectors
// ---------------------------------------------------------------------------

/// Appears once the home timeline has mounted.
pub const APP_ROOT: &str = r#"div[data-testid="followingFeedPage-feed-flatlist"]"#;
/// Container whose children are the feed tabs.
pub const FEED_TABS: &str = r#"[data-testid="homeScreenFeedTabs"] > div > div"#;
pub const FEED_ITEM: &str = r#"div[data-testid*="feedItem-by-"]"#;
pub const THREAD_ITEM: &str = r#"div[data-testid*="postThreadItem-by-"]"#;
pub const LIKE_BUTTON: &str = r#"[aria-label*="Like ("]"#;
pub const UNLIKE_BUTTON: &str = r#"[aria-label*="Unlike ("]"#;
pub const REPLY_BUTTON: &str = r#"[aria-label*="Reply ("]"#;
pub const POST_LINK: &str = r#"a[role="link"]"#;
pub const PHOTO_THUMBNAIL: &str = r#"img[src*="feed_thumbnail"]:not(a img)"#;
pub const SEARCH_INPUT: &str = r#"input[aria-label="Search"]"#;
pub const SEARCH_LINK: &str = r#"a[aria-label="Search"]"#;
pub const LOAD_NEW_POSTS: &str = r#"[aria-label*="Load new posts"]"#;

pub const HIGHLIGHT_CLASS: &str = "feedkeys-highlighted-post";

/// Selector for the content list of the feed tab at `index` (0-based).
pub fn feed_content_selector(index: usize) -> String {
    format!(r#"[data-testid*="-feed-flatlist"]:nth-child({})"#, index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementSpec, MemoryPage};

    #[test]
    fn feed_selector_is_one_based() {
        assert_eq!(
            feed_content_selector(0),
            r#"[data-testid*="-feed-flatlist"]:nth-child(1)"#
        );
        assert!(feed_content_selector(2).ends_with(":nth-child(3)"));
    }

    #[test]
    fn text_entry_detection() {
        let mut page = MemoryPage::new();
        let input = page.add(ElementSpec::new("search").tag("input"));
        let area = page.add(ElementSpec::new("draft").tag("TEXTAREA"));
        let editor = page.add(ElementSpec::new("editor").attr("role", "textbox"));
        let button = page.add(ElementSpec::new("button").tag("button"));

        assert!(is_text_entry(&page, input));
        assert!(is_text_entry(&page, area));
        assert!(is_text_entry(&page, editor));
        assert!(!is_text_entry(&page, button));
    }
}
