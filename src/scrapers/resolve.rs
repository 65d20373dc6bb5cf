//! Resolution of article links and embedded asset references.
//!
//! Source pages reference assets in three shapes, and each is resolved
//! differently against the URL of the page it was found on:
//!
//! | Shape | Example | Result |
//! |-------|---------|--------|
//! | web | `https://cdn.example.com/a.png` | returned unchanged |
//! | absolute | `/upload/a.png` | page origin + this path |
//! | relative | `../upload/a.png` | joined onto the page's directory |
//!
//! Absolute and relative results are percent-decoded as a whole after the
//! join, so `%E5%9B%BE.png` comes back as `图.png`.

use std::borrow::Cow;
use url::Url;

/// The shape of a reference found in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Already scheme-qualified (`http://` or `https://`).
    Web,
    /// A filesystem-style absolute path without a scheme.
    Absolute,
    /// Anything else.
    Relative,
}

/// Classify a raw `href`/`src` value.
pub fn classify(candidate: &str) -> RefKind {
    if candidate.starts_with('/') {
        RefKind::Absolute
    } else if candidate.starts_with("http://") || candidate.starts_with("https://") {
        RefKind::Web
    } else {
        RefKind::Relative
    }
}

/// Resolve `candidate` against the page at `base_url`.
///
/// # Arguments
///
/// * `base_url` - URL of the page the reference was found on
/// * `candidate` - Raw `href` or `src` value
///
/// # Returns
///
/// Web candidates unchanged. Absolute and relative candidates are joined
/// onto `base_url`, which loses its query and fragment, and the whole result
/// is percent-decoded. `None` when the candidate is empty, when `base_url`
/// is not a hierarchical URL, or when the decoded result is not valid UTF-8.
///
/// # Examples
///
/// ```ignore
/// let url = resolve("https://a.com/dir/page.htm", "../img.png");
/// assert_eq!(url.as_deref(), Some("https://a.com/img.png"));
/// ```
pub fn resolve(base_url: &str, candidate: &str) -> Option<String> {
    if candidate.is_empty() {
        return None;
    }

    let kind = classify(candidate);
    if kind == RefKind::Web {
        return Some(candidate.to_string());
    }

    let mut url = Url::parse(base_url).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    let path = match kind {
        RefKind::Absolute => candidate.to_string(),
        _ => join_path(parent_dir(url.path()), candidate),
    };
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    urlencoding::decode(url.as_str()).ok().map(Cow::into_owned)
}

/// The directory part of a URL path: everything before the last `/`.
fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Join `candidate` onto `dir`, collapsing `.`, `..` and repeated slashes.
/// `..` never climbs above the root.
fn join_path(dir: &str, candidate: &str) -> String {
    let joined = format!("{dir}/{candidate}");
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut path = format!("/{}", segments.join("/"));
    if candidate.ends_with('/') && path.len() > 1 {
        path.push('/');
    }
    path
}
