//! HTML page extractor
//!
//! This module turns a fetched HTML document into a `PageRecord`:
//! - Robots meta directives (noindex/nofollow short-circuit the page)
//! - Title, meta description, H1, viewport, canonical, ld+json presence
//! - Images with their alt text
//! - Same-site outbound links
//! - Visible body text with boilerplate regions removed
//!
//! `scraper::Html` is not `Send`, so callers on the async runtime run
//! extraction on the blocking pool.

use crate::url::Normalizer;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use url::Url;

/// Regions removed before collecting visible text
const BOILERPLATE_SELECTORS: &[&str] = &[
    "nav",
    "footer",
    "header",
    "[role=navigation]",
    ".menu",
    ".sidebar",
    ".cookie",
    ".advert",
    ".ad",
    ".ads",
    ".banner",
    "script",
    "style",
    "noscript",
    "template",
];

/// Elements that start a new paragraph in the extracted text
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "dd",
    "details",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "main",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "td",
    "th",
    "tr",
    "ul",
];

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("valid regex pattern"))
}

/// One `<img>` element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageEntry {
    /// `src` attribute, empty if missing
    pub src: String,

    /// `alt` attribute, empty if missing
    pub alt: String,
}

/// Structured data extracted from one successfully fetched page
///
/// `word_count` and `paragraph_count` are always derived from `text`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRecord {
    /// URL as enqueued
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    pub status: u16,

    /// Discovery depth (0 for the seed)
    pub depth: u32,

    pub title: String,
    pub meta_description: String,

    /// Text of the first `<h1>`
    pub h1: String,
    pub h1_count: usize,

    /// Content of the viewport meta tag
    pub viewport: String,

    /// Whether an `application/ld+json` script is present
    pub has_ldjson: bool,

    pub images: Vec<ImageEntry>,

    /// Same-site outbound links, normalized and deduplicated
    pub links: BTreeSet<String>,

    /// Resolved canonical link href, empty if absent
    pub canonical: String,

    pub redirected: bool,

    /// Visible text of the main content, paragraphs separated by blank lines
    pub text: String,
    pub word_count: usize,
    pub paragraph_count: usize,
}

/// Outcome of parsing a page
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// The page is usable
    Page(Box<PageRecord>),

    /// The page asked not to be indexed or followed
    SkipByMeta,
}

/// Returns true if a robots directive value contains noindex or nofollow
///
/// Applies to both the robots meta tag and the `X-Robots-Tag` header.
pub fn is_skip_directive(content: &str) -> bool {
    let content = content.to_ascii_lowercase();
    content.contains("noindex") || content.contains("nofollow")
}

/// Counts `\w+` tokens
pub fn count_words(text: &str) -> usize {
    word_pattern().find_iter(text).count()
}

/// Counts non-blank segments separated by blank lines
pub fn count_paragraphs(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}

/// Parses HTML content into a page record
///
/// # Extraction Rules
///
/// **Skip:**
/// - `<meta name="robots">` containing `noindex` or `nofollow`
///
/// **From the whole document:**
/// - title, meta description, first `<h1>` and the `<h1>` count, viewport
/// - `<script type="application/ld+json">` presence
/// - every `<img>` `src`/`alt`
/// - `<link rel="canonical">`
/// - `<a href>` links (not `download`), kept only if same-site
///
/// **Visible text:**
/// - boilerplate regions (`nav`, `header`, `footer`, menus, banners, ...)
///   and `script`/`style`/`noscript`/`template` are removed
/// - text comes from `<main>`, else `<article>`, else `<body>`
///
/// # Arguments
///
/// * `base_url` - The URL the page was served from, used to resolve links
/// * `html` - The HTML content to parse
/// * `normalizer` - Decides which links are same-site
pub fn extract(base_url: &Url, html: &str, normalizer: &Normalizer) -> Extraction {
    let mut document = Html::parse_document(html);

    if has_robots_skip_meta(&document) {
        return Extraction::SkipByMeta;
    }

    let (h1, h1_count) = extract_h1(&document);

    let mut record = PageRecord {
        url: base_url.to_string(),
        final_url: base_url.to_string(),
        status: 200,
        title: extract_title(&document),
        meta_description: meta_content(&document, "description"),
        h1,
        h1_count,
        viewport: meta_content(&document, "viewport"),
        has_ldjson: has_ldjson(&document),
        images: extract_images(&document),
        links: extract_links(&document, base_url, normalizer),
        canonical: extract_canonical(&document, base_url),
        ..Default::default()
    };

    strip_boilerplate(&mut document);

    record.text = extract_text(&document);
    record.word_count = count_words(&record.text);
    record.paragraph_count = count_paragraphs(&record.text);

    Extraction::Page(Box::new(record))
}

fn has_robots_skip_meta(document: &Html) -> bool {
    if let Ok(selector) = Selector::parse("meta[name]") {
        for element in document.select(&selector) {
            let is_robots = element
                .value()
                .attr("name")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("robots"));
            if is_robots {
                let content = element.value().attr("content").unwrap_or("");
                if is_skip_directive(content) {
                    return true;
                }
            }
        }
    }
    false
}

/// Joins the trimmed text pieces of an element with single spaces
fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next().map(joined_text))
        .unwrap_or_default()
}

fn extract_h1(document: &Html) -> (String, usize) {
    let Ok(selector) = Selector::parse("h1") else {
        return (String::new(), 0);
    };

    let mut headings = document.select(&selector);
    let first = headings.next().map(joined_text);
    let count = usize::from(first.is_some()) + headings.count();
    (first.unwrap_or_default(), count)
}

/// Content of the first `<meta name=...>` with the given name (case-insensitive)
fn meta_content(document: &Html, name: &str) -> String {
    let Ok(selector) = Selector::parse("meta[name]") else {
        return String::new();
    };

    document
        .select(&selector)
        .find(|element| {
            element
                .value()
                .attr("name")
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
        })
        .and_then(|element| element.value().attr("content"))
        .unwrap_or("")
        .to_string()
}

fn has_ldjson(document: &Html) -> bool {
    let Ok(selector) = Selector::parse("script[type]") else {
        return false;
    };

    document.select(&selector).any(|element| {
        element
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
    })
}

fn extract_images(document: &Html) -> Vec<ImageEntry> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|element| ImageEntry {
            src: element.value().attr("src").unwrap_or("").to_string(),
            alt: element.value().attr("alt").unwrap_or("").to_string(),
        })
        .collect()
}

/// Extracts same-site links from `<a href>` tags
fn extract_links(document: &Html, base_url: &Url, normalizer: &Normalizer) -> BTreeSet<String> {
    let mut links = BTreeSet::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(url) = normalizer.resolve_in_scope(base_url, href) {
                    links.insert(url.to_string());
                }
            }
        }
    }

    links
}

fn extract_canonical(document: &Html, base_url: &Url) -> String {
    let Ok(selector) = Selector::parse("link[rel][href]") else {
        return String::new();
    };

    document
        .select(&selector)
        .find(|element| {
            element.value().attr("rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("canonical"))
            })
        })
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| base_url.join(href.trim()).ok())
        .map(|url| url.to_string())
        .unwrap_or_default()
}

/// Detaches boilerplate subtrees from the document
fn strip_boilerplate(document: &mut Html) {
    let mut doomed = Vec::new();
    let root = document.root_element();

    for raw in BOILERPLATE_SELECTORS {
        if let Ok(selector) = Selector::parse(raw) {
            doomed.extend(root.select(&selector).map(|element| element.id()));
        }
    }

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Picks the content root: `<main>`, else `<article>`, else `<body>`
fn content_root(document: &Html) -> ElementRef<'_> {
    let root = document.root_element();
    for name in ["main", "article", "body"] {
        if let Ok(selector) = Selector::parse(name) {
            if let Some(element) = root.select(&selector).next() {
                return element;
            }
        }
    }
    root
}

/// Collects visible text, one paragraph per block element
///
/// Text pieces sharing the same nearest block ancestor are joined with a
/// space; a new block starts a new paragraph.
fn extract_text(document: &Html) -> String {
    let root = content_root(document);
    let mut text = String::new();
    let mut current_block = None;

    for node in root.descendants() {
        let Some(piece) = node.value().as_text() else {
            continue;
        };
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }

        let block = node
            .ancestors()
            .find(|ancestor| {
                ancestor.id() == root.id()
                    || ancestor
                        .value()
                        .as_element()
                        .is_some_and(|e| BLOCK_TAGS.contains(&e.name()))
            })
            .map(|ancestor| ancestor.id());

        if !text.is_empty() {
            text.push_str(if block == current_block { " " } else { "\n\n" });
        }
        text.push_str(piece);
        current_block = block;
    }

    text
}
