//! Rule-based page metrics
//!
//! Turns a kept `PageRecord` into presence flags, coverage ratios, audit
//! issue flags, and two heuristic scores (SEO and UX), each capped at 100.

use crate::crawler::PageRecord;
use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;

/// Title lengths, in characters, that are not flagged
pub const TITLE_LENGTH: RangeInclusive<usize> = 30..=65;

/// Meta description lengths, in characters, that are not flagged
pub const DESCRIPTION_LENGTH: RangeInclusive<usize> = 70..=160;

/// Share of images without alt text above which a page is flagged
pub const MISSING_ALT_THRESHOLD: f64 = 0.3;

/// Phrases that suggest a call to action in the page text
const CTA_KEYWORDS: &[&str] = &[
    "お問い合わせ",
    "予約",
    "資料請求",
    "無料相談",
    "contact",
    "apply",
    "signup",
    "申し込み",
];

/// Metrics and scores for one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetrics {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub depth: u32,
    pub redirected: bool,

    pub title: String,

    /// Empty when the title length is fine
    pub title_issue: String,

    pub meta_description: String,

    /// Empty when the meta description length is fine
    pub description_issue: String,

    pub h1_count: usize,

    /// No `<h1>`, or more than one
    pub h1_anomaly: bool,

    /// Resolved canonical href, empty if absent
    pub canonical: String,

    pub word_count: usize,

    /// Number of `<img>` elements
    pub images: usize,

    /// Images with a non-blank `alt`
    pub images_alt_filled: usize,

    /// `images_alt_filled / images`, rounded to two places (0 without images)
    pub images_alt_ratio: f64,

    pub images_missing_alt: usize,

    /// More than `MISSING_ALT_THRESHOLD` of the images lack alt text
    pub alt_missing_heavy: bool,

    /// Distinct same-site links
    pub internal_links: usize,

    pub has_ldjson: bool,
    pub has_viewport: bool,
    pub has_meta_description: bool,
    pub has_h1: bool,

    pub seo_score: u32,
    pub ux_score: u32,
}

impl PageMetrics {
    /// Returns true if any audit issue flag is raised
    pub fn has_issues(&self) -> bool {
        !self.title_issue.is_empty()
            || !self.description_issue.is_empty()
            || self.h1_anomaly
            || self.alt_missing_heavy
    }
}

/// Describes a text whose length falls outside `range`
///
/// Returns an empty string when the length is acceptable.
fn length_issue(text: &str, range: &RangeInclusive<usize>) -> String {
    let len = text.chars().count();
    if len == 0 {
        "missing".to_string()
    } else if len < *range.start() {
        format!("too short ({})", len)
    } else if len > *range.end() {
        format!("too long ({})", len)
    } else {
        String::new()
    }
}

/// Groups pages sharing a non-empty title
///
/// Returns `(title, urls)` pairs for titles used by more than one page,
/// ordered by title, with URLs sorted.
pub fn duplicate_titles(metrics: &[PageMetrics]) -> Vec<(String, Vec<String>)> {
    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for page in metrics.iter().filter(|page| !page.title.is_empty()) {
        groups.entry(page.title.as_str()).or_default().push(page.url.clone());
    }

    groups
        .into_iter()
        .filter(|(_, urls)| urls.len() > 1)
        .map(|(title, mut urls)| {
            urls.sort();
            (title.to_string(), urls)
        })
        .collect()
}

fn ratio(a: usize, b: usize) -> f64 {
    if b == 0 {
        0.0
    } else {
        a as f64 / b as f64
    }
}

/// Computes metrics and heuristic scores for a page
///
/// # Arguments
///
/// * `page` - A kept page record
///
/// # Returns
///
/// The page's metrics. Pure; never fails.
pub fn compute_metrics(page: &PageRecord) -> PageMetrics {
    let title = page.title.trim();
    let meta_description = page.meta_description.trim();
    let h1 = page.h1.trim();
    let word_count = page.word_count;
    let paragraphs = page.paragraph_count;
    let viewport = page.viewport.to_lowercase();
    let has_viewport = viewport.contains("width=device-width");

    let total_images = page.images.len();
    let alt_filled = page
        .images
        .iter()
        .filter(|image| !image.alt.trim().is_empty())
        .count();
    let alt_ratio = ratio(alt_filled, total_images);
    let missing_alt = total_images - alt_filled;

    // Depth proxy: slashes in the URL, scheme included
    let url_depth = page.url.matches('/').count();

    let unique_links = page.links.iter().collect::<HashSet<_>>().len();

    let mut seo = 0;
    if !title.is_empty() {
        seo += 15;
    }
    if !meta_description.is_empty() {
        seo += 15;
    }
    if !h1.is_empty() {
        seo += 10;
    }
    if page.has_ldjson {
        seo += 10;
    }
    seo += if alt_ratio >= 0.66 {
        10
    } else if alt_ratio >= 0.33 {
        5
    } else {
        0
    };
    seo += if unique_links >= 10 {
        10
    } else if unique_links >= 3 {
        5
    } else {
        0
    };
    seo += if (500..=3000).contains(&word_count) {
        10
    } else if word_count > 3000 {
        5
    } else {
        0
    };
    if paragraphs >= 5 {
        seo += 10;
    }

    let text = page.text.to_lowercase();
    let cta_hits = CTA_KEYWORDS
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .count();

    let mut ux = 0;
    if has_viewport {
        ux += 20;
    }
    ux += if (500..=2500).contains(&word_count) {
        10
    } else {
        5
    };
    ux += if paragraphs >= 6 {
        10
    } else if paragraphs >= 3 {
        5
    } else {
        0
    };
    ux += match cta_hits {
        0 => 0,
        1 => 5,
        _ => 10,
    };
    ux += if url_depth <= 6 { 10 } else { 5 };
    if unique_links >= 5 {
        ux += 10;
    }

    PageMetrics {
        url: page.url.clone(),
        final_url: page.final_url.clone(),
        status: page.status,
        depth: page.depth,
        redirected: page.redirected,
        title: title.to_string(),
        title_issue: length_issue(title, &TITLE_LENGTH),
        meta_description: meta_description.to_string(),
        description_issue: length_issue(meta_description, &DESCRIPTION_LENGTH),
        h1_count: page.h1_count,
        h1_anomaly: page.h1_count != 1,
        canonical: page.canonical.clone(),
        word_count,
        images: total_images,
        images_alt_filled: alt_filled,
        images_alt_ratio: (alt_ratio * 100.0).round() / 100.0,
        images_missing_alt: missing_alt,
        alt_missing_heavy: ratio(missing_alt, total_images) > MISSING_ALT_THRESHOLD,
        internal_links: unique_links,
        has_ldjson: page.has_ldjson,
        has_viewport,
        has_meta_description: !meta_description.is_empty(),
        has_h1: !h1.is_empty(),
        seo_score: seo.min(100),
        ux_score: ux.min(100),
    }
}
