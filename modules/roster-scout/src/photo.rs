//! Best-photo selection for one athlete.
//!
//! Tiers run in strict order and the first that yields a URL wins:
//! known headshot selectors, then allow-listed media hosts scored by
//! geometry, then alt text naming the athlete. Whatever wins goes through
//! the same quality post-process.

use roster_common::media::{
    decode_proxy_reference, is_absolute_http, is_data_uri, upgrade_resize_params, url_on_hosts,
};
use roster_common::{normalize_name, name_tokens, Document, ImageCandidate, PhotoConfig, PhotoResolution, ResolutionTier};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::images::collect_images;

/// URL path fragments typical of roster crop/resize endpoints.
const ROSTER_PATH_HINTS: &[&str] = &["/roster", "/crop", "headshot", "/players/", "resize"];

/// Geometry score used when an image's dimensions are unknown: worse than a
/// good portrait, better than a poor one.
const UNKNOWN_GEOMETRY_SCORE: f64 = 50.0;

pub struct PhotoResolver {
    config: PhotoConfig,
    headshot_selectors: Vec<Selector>,
}

impl PhotoResolver {
    pub fn new(config: PhotoConfig) -> Self {
        let headshot_selectors = config
            .headshot_selectors
            .iter()
            .filter_map(|css| match Selector::parse(css) {
                Ok(sel) => Some(sel),
                Err(e) => {
                    warn!(selector = css.as_str(), error = %e, "Ignoring invalid headshot selector");
                    None
                }
            })
            .collect();
        Self {
            config,
            headshot_selectors,
        }
    }

    /// Resolve the best photo on a fetched page (usually a profile page).
    pub fn resolve(&self, doc: &Document, target_name: Option<&str>) -> PhotoResolution {
        if doc.is_empty() {
            return PhotoResolution::none();
        }
        let html = Html::parse_document(&doc.html);

        if let Some(url) = self.selector_tier(&html, &doc.url) {
            return self.finish(url, ResolutionTier::Selector);
        }

        let images = collect_images(html.root_element(), &doc.url);
        self.resolve_inline(&images, target_name)
    }

    /// Resolve from already-collected image references, e.g. the inline
    /// images next to a name on the roster listing. The selector tier needs
    /// page structure and does not apply.
    pub fn resolve_inline(&self, images: &[ImageCandidate], target_name: Option<&str>) -> PhotoResolution {
        if let Some(url) = self.domain_tier(images) {
            return self.finish(url, ResolutionTier::DomainHeuristic);
        }
        if let Some(url) = target_name.and_then(|name| self.alt_text_tier(images, name)) {
            return self.finish(url, ResolutionTier::AltText);
        }
        PhotoResolution::none()
    }

    // --- Tiers ---

    fn selector_tier(&self, html: &Html, base: &str) -> Option<String> {
        for sel in &self.headshot_selectors {
            for el in html.select(sel) {
                if let Some(img) = collect_images(el, base).into_iter().find(|c| self.passes_rejection(c)) {
                    debug!(url = img.url.as_str(), "Headshot selector matched");
                    return Some(img.url);
                }
            }
        }
        None
    }

    fn domain_tier(&self, images: &[ImageCandidate]) -> Option<String> {
        let mut best: Option<(&ImageCandidate, f64, u64)> = None;
        for img in images {
            if !url_on_hosts(&img.url, &self.config.media_hosts) || !self.passes_rejection(img) {
                continue;
            }
            let Some(score) = self.score(img) else {
                continue;
            };
            let area = match (img.width, img.height) {
                (Some(w), Some(h)) => w as u64 * h as u64,
                _ => 0,
            };
            // Strictly better only, so the first-seen image wins ties.
            let better = match &best {
                None => true,
                Some((_, s, a)) => score > *s || (score == *s && area > *a),
            };
            if better {
                best = Some((img, score, area));
            }
        }
        best.map(|(img, score, _)| {
            debug!(url = img.url.as_str(), score, "Domain heuristic picked image");
            img.url.clone()
        })
    }

    fn alt_text_tier(&self, images: &[ImageCandidate], target_name: &str) -> Option<String> {
        let target = normalize_name(target_name);
        let tokens = name_tokens(&target);
        if tokens.is_empty() {
            return None;
        }
        images
            .iter()
            .filter(|img| url_on_hosts(&img.url, &self.config.media_hosts) && self.passes_rejection(img))
            .find(|img| {
                img.alt_text.as_deref().is_some_and(|alt| {
                    let alt = normalize_name(alt);
                    tokens.iter().all(|t| alt.contains(t))
                })
            })
            .map(|img| img.url.clone())
    }

    // --- Filters and scoring ---

    /// Rejects data URIs, relative junk, placeholder/logo/sponsor markers and
    /// anything known to be smaller than the minimum dimension.
    pub fn passes_rejection(&self, img: &ImageCandidate) -> bool {
        if is_data_uri(&img.url) || !is_absolute_http(&img.url) {
            return false;
        }
        let lowered = img.url.to_lowercase();
        if self
            .config
            .reject_markers
            .iter()
            .any(|m| !m.is_empty() && lowered.contains(&m.to_lowercase()))
        {
            return false;
        }
        let min = self.config.min_dimension;
        !(img.width.is_some_and(|w| w < min) || img.height.is_some_and(|h| h < min))
    }

    /// Portrait closeness plus roster-path boost. `None` when the known
    /// aspect ratio falls outside the configured band.
    fn score(&self, img: &ImageCandidate) -> Option<f64> {
        let geometry = match (img.width, img.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => {
                let ratio = w as f64 / h as f64;
                if ratio < self.config.min_ratio || ratio > self.config.max_ratio {
                    return None;
                }
                let ideal = self.config.ideal_ratio;
                (100.0 * (1.0 - (ratio - ideal).abs() / ideal)).max(0.0)
            }
            _ => UNKNOWN_GEOMETRY_SCORE,
        };
        let path = url::Url::parse(&img.url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_default();
        let boost = if ROSTER_PATH_HINTS.iter().any(|h| path.contains(h)) {
            self.config.roster_path_boost
        } else {
            0.0
        };
        Some(geometry + boost)
    }

    // --- Post-process ---

    /// Unwrap proxy references that point at direct storage, then bump resize
    /// parameters. Any failure keeps the URL as it was.
    fn finish(&self, url: String, tier: ResolutionTier) -> PhotoResolution {
        let mut url = url;
        let mut upgraded = false;

        if url_on_hosts(&url, &self.config.proxy_hosts) {
            match decode_proxy_reference(&url) {
                Ok(direct) if url_on_hosts(&direct, &self.config.direct_storage_hosts) => {
                    debug!(proxy = url.as_str(), direct = direct.as_str(), "Unwrapped proxy reference");
                    url = direct;
                    upgraded = true;
                }
                Ok(other) => {
                    debug!(decoded = other.as_str(), "Proxy payload is not on a direct-storage host")
                }
                Err(e) => debug!(url = url.as_str(), error = %e, "Keeping proxy reference"),
            }
        }

        if let Some(bigger) = upgrade_resize_params(&url, self.config.upgrade_width) {
            url = bigger;
            upgraded = true;
        }

        PhotoResolution {
            url: Some(url),
            tier,
            upgraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_common::EngineConfig;

    const PAGE: &str = "https://gostate.com/sports/swimming/roster/jane-doe/101";

    fn resolver() -> PhotoResolver {
        PhotoResolver::new(EngineConfig::default().photo)
    }

    fn img(url: &str, w: Option<u32>, h: Option<u32>, alt: Option<&str>) -> ImageCandidate {
        ImageCandidate {
            url: url.to_string(),
            width: w,
            height: h,
            alt_text: alt.map(String::from),
            source_attribute: "src".to_string(),
        }
    }

    fn page(body: &str) -> Document {
        Document::new(PAGE, format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn selector_tier_wins_outright() {
        let doc = page(r#"
            <img src="https://storage.googleapis.com/b/roster/big.jpg" width="600" height="900">
            <div class="sidearm-roster-player-image"><img src="/images/2024/jane.jpg" alt="Jane Doe"></div>
        "#);
        let r = resolver().resolve(&doc, Some("Jane Doe"));
        assert_eq!(r.tier, ResolutionTier::Selector);
        assert_eq!(r.url.as_deref(), Some("https://gostate.com/images/2024/jane.jpg"));
    }

    #[test]
    fn selector_match_failing_rejection_falls_through() {
        let doc = page(r#"
            <div class="player-headshot"><img src="/images/silhouette.png"></div>
            <img src="https://storage.googleapis.com/b/roster/jane.jpg" width="400" height="600">
        "#);
        let r = resolver().resolve(&doc, None);
        assert_eq!(r.tier, ResolutionTier::DomainHeuristic);
        assert_eq!(r.url.as_deref(), Some("https://storage.googleapis.com/b/roster/jane.jpg"));
    }

    #[test]
    fn data_uri_never_selected() {
        let images = vec![
            img("data:image/jpeg;base64,/9j/4AAQSkZJRgABAQ", Some(400), Some(600), Some("Jane Doe")),
            img("https://storage.googleapis.com/b/x/jane.jpg", Some(100), Some(300), None),
        ];
        let r = resolver().resolve_inline(&images, Some("Jane Doe"));
        // The second is outside the ratio band; nothing else qualifies.
        assert!(r.is_none());
        assert_eq!(r.tier, ResolutionTier::None);
        assert!(!resolver().passes_rejection(&images[0]));
    }

    #[test]
    fn lazy_headshot_skips_data_placeholder() {
        let doc = page(r#"
            <div class="sidearm-roster-player-image">
                <img src="data:image/gif;base64,R0lGODlhAQABAAAAACw=" data-src="/images/2025/jane-doe.jpg" width="240" height="360" alt="Jane Doe">
            </div>
        "#);
        let r = resolver().resolve(&doc, Some("Jane Doe"));
        assert_eq!(r.tier, ResolutionTier::Selector);
        assert_eq!(r.url.as_deref(), Some("https://gostate.com/images/2025/jane-doe.jpg"));
    }

    #[test]
    fn geometry_prefers_portrait_and_roster_paths() {
        let images = vec![
            img("https://storage.googleapis.com/b/banner.jpg", Some(1000), Some(1000), None),
            img("https://storage.googleapis.com/b/roster/jane.jpg", Some(400), Some(600), None),
            img("https://storage.googleapis.com/b/news/jane.jpg", Some(400), Some(600), None),
        ];
        let r = resolver().resolve_inline(&images, None);
        assert_eq!(r.url.as_deref(), Some("https://storage.googleapis.com/b/roster/jane.jpg"));
    }

    #[test]
    fn area_breaks_ties_and_first_seen_wins_exact_ties() {
        let images = vec![
            img("https://storage.googleapis.com/b/a.jpg", Some(200), Some(300), None),
            img("https://storage.googleapis.com/b/b.jpg", Some(400), Some(600), None),
            img("https://storage.googleapis.com/b/c.jpg", Some(400), Some(600), None),
        ];
        let r = resolver().resolve_inline(&images, None);
        assert_eq!(r.url.as_deref(), Some("https://storage.googleapis.com/b/b.jpg"));
    }

    #[test]
    fn rejects_small_logos_and_off_list_hosts() {
        let images = vec![
            img("https://storage.googleapis.com/b/tiny.jpg", Some(60), Some(90), None),
            img("https://storage.googleapis.com/b/team-logo.png", Some(400), Some(600), None),
            img("https://ads.example.com/jane.jpg", Some(400), Some(600), None),
        ];
        assert!(resolver().resolve_inline(&images, Some("Jane Doe")).is_none());
    }

    #[test]
    fn alt_text_tier_requires_every_token() {
        let images = vec![
            img("https://storage.googleapis.com/b/x1.jpg", Some(1600), Some(400), Some("Jane Smith")),
            img("https://storage.googleapis.com/b/x2.jpg", Some(1600), Some(400), Some("Photo of Jane Doe swimming")),
        ];
        let r = resolver().resolve_inline(&images, Some("Jane Doe"));
        assert_eq!(r.tier, ResolutionTier::AltText);
        assert_eq!(r.url.as_deref(), Some("https://storage.googleapis.com/b/x2.jpg"));
    }

    #[test]
    fn upgrade_rewrites_resize_params_once() {
        let images = vec![img(
            "https://images.sidearmdev.com/crop?url=https%3A%2F%2Fx&width=300&height=450",
            None,
            None,
            None,
        )];
        let r = resolver().resolve_inline(&images, None);
        assert!(r.upgraded);
        let url = r.url.unwrap();
        assert!(url.contains("width=1200"));

        let again = resolver().resolve_inline(&[img(&url, None, None, None)], None);
        assert_eq!(again.url.as_deref(), Some(url.as_str()));
        assert!(!again.upgraded);
    }

    #[test]
    fn proxy_reference_unwrapped_only_to_direct_storage() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;

        let direct = "https://storage.googleapis.com/bucket/roster/jane.jpg";
        let proxy = format!("https://images.sidearmdev.com/convert/{}.jpg", URL_SAFE_NO_PAD.encode(direct));
        let r = resolver().resolve_inline(&[img(&proxy, None, None, None)], None);
        assert_eq!(r.url.as_deref(), Some(direct));
        assert!(r.upgraded);

        let elsewhere = format!(
            "https://images.sidearmdev.com/convert/{}.jpg",
            URL_SAFE_NO_PAD.encode("https://someothercdn.net/jane.jpg")
        );
        let r = resolver().resolve_inline(&[img(&elsewhere, None, None, None)], None);
        assert_eq!(r.url.as_deref(), Some(elsewhere.as_str()));
        assert!(!r.upgraded);
    }

    #[test]
    fn undecodable_proxy_kept() {
        let url = "https://images.sidearmdev.com/convert/not-base64!.jpg";
        let r = resolver().resolve_inline(&[img(url, None, None, None)], None);
        assert_eq!(r.url.as_deref(), Some(url));
        assert!(!r.upgraded);
    }
}
