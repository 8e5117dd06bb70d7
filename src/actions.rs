//! Single-post actions: selection movement, like, reply, open, photo,
//! search focus and loading new posts.
//!
//! Each action is one query plus one side effect on the page. Missing
//! targets surface as [`ActionError::NoMatch`]; the caller logs a warning.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use log::{debug, warn};
use regex::Regex;

use crate::cancel::CancellationToken;
use crate::dom::{
    Dom, Element, FEED_ITEM, HIGHLIGHT_CLASS, LIKE_BUTTON, LOAD_NEW_POSTS, PHOTO_THUMBNAIL,
    POST_LINK, REPLY_BUTTON, SEARCH_INPUT, SEARCH_LINK, THREAD_ITEM, UNLIKE_BUTTON,
};
use crate::waiter::WaitRequest;

/// Permalink of a single post.
static POST_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://bsky\.app/profile/[^/]+/post/[a-zA-Z0-9]+$").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("no {0} found")]
    NoMatch(&'static str),
}

pub type ActionResult<T = ()> = Result<T, ActionError>;

/// Rendered feed items followed by rendered thread items.
pub fn visible_posts(dom: &dyn Dom) -> Vec<Element> {
    dom.query_all(FEED_ITEM)
        .into_iter()
        .chain(dom.query_all(THREAD_ITEM))
        .filter(|&el| dom.is_rendered(el))
        .collect()
}

/// Step forward through visible posts, stopping at the last one.
pub fn next_post(dom: &mut dyn Dom, current: Option<Element>) -> ActionResult<Element> {
    let posts = visible_posts(dom);
    if posts.is_empty() {
        return Err(ActionError::NoMatch("visible posts"));
    }
    let next = match current.and_then(|c| posts.iter().position(|&p| p == c)) {
        Some(i) => posts[(i + 1).min(posts.len() - 1)],
        // Nothing selected, or the selection scrolled out of the list.
        None => posts[0],
    };
    highlight_and_scroll(dom, next);
    Ok(next)
}

/// Step backward through visible posts, stopping at the first one.
pub fn previous_post(dom: &mut dyn Dom, current: Option<Element>) -> ActionResult<Element> {
    let posts = visible_posts(dom);
    if posts.is_empty() {
        return Err(ActionError::NoMatch("visible posts"));
    }
    let prev = match current {
        None => posts[posts.len() - 1],
        Some(c) => match posts.iter().position(|&p| p == c) {
            Some(i) => posts[i.saturating_sub(1)],
            None => posts[0],
        },
    };
    highlight_and_scroll(dom, prev);
    Ok(prev)
}

/// Move the highlight to `post` and bring it into view.
pub fn highlight_and_scroll(dom: &mut dyn Dom, post: Element) {
    for el in dom.query_all(&format!(".{HIGHLIGHT_CLASS}")) {
        dom.remove_class(el, HIGHLIGHT_CLASS);
    }
    dom.add_class(post, HIGHLIGHT_CLASS);
    dom.scroll_into_view(post);
}

fn require_post(current: Option<Element>) -> ActionResult<Element> {
    current.ok_or(ActionError::NoMatch("selected post"))
}

pub fn like_post(dom: &mut dyn Dom, current: Option<Element>) -> ActionResult {
    let post = require_post(current)?;
    let button = dom
        .query_in(post, LIKE_BUTTON)
        .or_else(|| dom.query_in(post, UNLIKE_BUTTON))
        .ok_or(ActionError::NoMatch("like button"))?;
    dom.click(button);
    Ok(())
}

pub fn reply_to_post(dom: &mut dyn Dom, current: Option<Element>) -> ActionResult {
    let post = require_post(current)?;
    let button = dom
        .query_in(post, REPLY_BUTTON)
        .ok_or(ActionError::NoMatch("reply button"))?;
    dom.click(button);
    Ok(())
}

/// Click the first link inside the post that points at the post itself.
pub fn open_post(dom: &mut dyn Dom, current: Option<Element>) -> ActionResult {
    let post = require_post(current)?;
    let link = dom
        .query_all_in(post, POST_LINK)
        .into_iter()
        .find(|&link| {
            dom.attribute(link, "href")
                .is_some_and(|href| POST_URL_RE.is_match(&href))
        })
        .ok_or(ActionError::NoMatch("valid post link"))?;
    dom.click(link);
    Ok(())
}

pub fn expand_photo(dom: &mut dyn Dom, current: Option<Element>) -> ActionResult {
    let post = require_post(current)?;
    let photo = dom
        .query_in(post, PHOTO_THUMBNAIL)
        .ok_or(ActionError::NoMatch("valid photo link"))?;
    dom.click(photo);
    Ok(())
}

/// Focus the search field, opening the search page first when the field is
/// not mounted. In that case the returned wait yields the field once it
/// appears; pass it to [`finish_focus_search`].
pub fn focus_search(
    dom: &mut dyn Dom,
    timeout: Duration,
    now: Instant,
) -> ActionResult<Option<WaitRequest>> {
    if let Some(input) = dom.query(SEARCH_INPUT) {
        finish_focus_search(dom, input);
        return Ok(None);
    }
    let link = dom
        .query(SEARCH_LINK)
        .ok_or(ActionError::NoMatch("search field"))?;
    debug!("actions: opening search page");
    dom.click(link);
    Ok(Some(WaitRequest::new(
        SEARCH_INPUT,
        timeout,
        CancellationToken::new(),
        now,
    )))
}

pub fn finish_focus_search(dom: &mut dyn Dom, input: Element) {
    dom.focus(input);
    dom.select_text(input);
}

/// Click "Load new posts" if offered, then select the first post. Returns
/// the new selection; `None` when the refreshed feed shows no posts.
pub fn load_more(dom: &mut dyn Dom) -> ActionResult<Option<Element>> {
    let button = dom
        .query(LOAD_NEW_POSTS)
        .ok_or(ActionError::NoMatch("load new posts button"))?;
    dom.click(button);
    match next_post(dom, None) {
        Ok(post) => Ok(Some(post)),
        Err(e) => {
            warn!("actions: load more: {e}");
            Ok(None)
        }
    }
}
