use std::sync::LazyLock;

use roster_common::media::{dimension_hints, resolve_url};
use roster_common::ImageCandidate;
use scraper::{ElementRef, Selector};

static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").expect("valid selector"));

/// Attributes that carry a single image URL, in preference order. Lazy
/// loaders park the real URL in a `data-*` attribute and a placeholder in `src`.
const URL_ATTRIBUTES: &[&str] = &["src", "data-src", "data-lazy-src", "data-original"];
const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "data-srcset"];

/// Every image reference under `root` (and `root` itself when it is an
/// `<img>`), resolved against `base`. One entry per distinct URL.
pub fn collect_images(root: ElementRef<'_>, base: &str) -> Vec<ImageCandidate> {
    let mut out: Vec<ImageCandidate> = Vec::new();
    let self_img = (root.value().name() == "img").then_some(root);
    for img in self_img.into_iter().chain(root.select(&IMG)) {
        for candidate in image_refs(img, base) {
            if !out.iter().any(|c| c.url == candidate.url) {
                out.push(candidate);
            }
        }
    }
    out
}

fn image_refs(img: ElementRef<'_>, base: &str) -> Vec<ImageCandidate> {
    let el = img.value();
    let alt_text = el
        .attr("alt")
        .map(|a| a.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|a| !a.is_empty());
    let attr_width = el.attr("width").and_then(parse_dimension);
    let attr_height = el.attr("height").and_then(parse_dimension);

    let mut refs = Vec::new();
    for attr in URL_ATTRIBUTES {
        let Some(url) = el.attr(attr).and_then(|raw| resolve_url(base, raw)) else {
            continue;
        };
        let (hint_w, hint_h) = dimension_hints(&url);
        refs.push(ImageCandidate {
            width: attr_width.or(hint_w),
            height: attr_height.or(hint_h),
            url,
            alt_text: alt_text.clone(),
            source_attribute: attr.to_string(),
        });
    }

    for attr in SRCSET_ATTRIBUTES {
        let Some((raw, descriptor_width)) = el.attr(attr).and_then(largest_srcset_entry) else {
            continue;
        };
        let Some(url) = resolve_url(base, raw) else {
            continue;
        };
        let (hint_w, hint_h) = dimension_hints(&url);
        // A width descriptor describes the file, not the layout box, so the
        // height is scaled from the attribute aspect when we have one.
        let width = descriptor_width.or(attr_width).or(hint_w);
        let height = match (descriptor_width, attr_width, attr_height) {
            (Some(dw), Some(aw), Some(ah)) if aw > 0 => Some((ah as u64 * dw as u64 / aw as u64) as u32),
            _ => attr_height.or(hint_h),
        };
        refs.push(ImageCandidate {
            url,
            width,
            height,
            alt_text: alt_text.clone(),
            source_attribute: attr.to_string(),
        });
    }
    refs
}

/// `"300"`, `"300px"`; percentages and garbage are ignored.
fn parse_dimension(raw: &str) -> Option<u32> {
    raw.trim().trim_end_matches("px").trim().parse().ok()
}

/// Pick the largest entry of a `srcset`. Returns the URL and its width
/// descriptor when it has one.
fn largest_srcset_entry(srcset: &str) -> Option<(&str, Option<u32>)> {
    let mut best: Option<(&str, f64, Option<u32>)> = None;
    for entry in srcset.split(',') {
        let mut parts = entry.split_whitespace();
        let Some(url) = parts.next() else {
            continue;
        };
        let descriptor = parts.next().unwrap_or("1x");
        let (weight, width) = if let Some(w) = descriptor.strip_suffix('w') {
            match w.parse::<u32>() {
                Ok(w) => (w as f64, Some(w)),
                Err(_) => continue,
            }
        } else if let Some(x) = descriptor.strip_suffix('x') {
            match x.parse::<f64>() {
                Ok(x) => (x, None),
                Err(_) => continue,
            }
        } else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, w, _)| weight > *w) {
            best = Some((url, weight, width));
        }
    }
    best.map(|(url, _, width)| (url, width))
}
