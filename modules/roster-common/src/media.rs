//! Helpers for reasoning about image URLs from their text alone: host
//! membership, encoded dimensions, resize-parameter rewriting and
//! proxy-reference unwrapping. Nothing here touches the network.

use std::sync::LazyLock;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use regex::Regex;
use url::Url;

use crate::error::DecodeError;

const WIDTH_PARAMS: &[&str] = &["width", "w", "maxwidth", "mw"];
const HEIGHT_PARAMS: &[&str] = &["height", "h", "maxheight", "mh"];
const SIZE_PARAMS: &[&str] = &["size", "s"];

/// WordPress-style `name-150x150.jpg` suffixes.
static PATH_DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[-_](\d{2,4})x(\d{2,4})\.(?:jpe?g|png|webp|gif)$").expect("valid regex")
});

/// Lowercased host without a leading `www.`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// True when `host` equals one of `domains` or is a subdomain of one.
pub fn host_matches(host: &str, domains: &[String]) -> bool {
    domains.iter().any(|d| {
        let d = d.trim().to_lowercase();
        !d.is_empty() && (host == d || host.ends_with(&format!(".{d}")))
    })
}

/// Host of `url` is covered by `domains`.
pub fn url_on_hosts(url: &str, domains: &[String]) -> bool {
    host_of(url).is_some_and(|h| host_matches(&h, domains))
}

pub fn is_data_uri(url: &str) -> bool {
    url.trim_start()
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Absolute `http`/`https` URL with a host.
pub fn is_absolute_http(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(u) => (u.scheme() == "http" || u.scheme() == "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Resolve `raw` against `base`. Protocol-relative and root-relative refs are
/// supported; `javascript:`/`mailto:` and friends are dropped. Data URIs pass
/// through untouched so callers can reject them explicitly.
pub fn resolve_url(base: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    if is_data_uri(raw) {
        return Some(raw.to_string());
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") || lowered.starts_with("tel:") {
        return None;
    }
    let resolved = match Url::parse(raw) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(raw).ok()?,
        Err(_) => return None,
    };
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    Some(resolved.to_string())
}

fn numeric_param(parsed: &Url, names: &[&str]) -> Option<u32> {
    parsed
        .query_pairs()
        .find(|(k, _)| names.iter().any(|n| k.eq_ignore_ascii_case(n)))
        .and_then(|(_, v)| v.trim().parse::<u32>().ok())
}

/// Dimensions encoded in the URL itself, either as resize query parameters
/// or as a `-WxH.ext` filename suffix.
pub fn dimension_hints(url: &str) -> (Option<u32>, Option<u32>) {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return (None, None);
    };
    let width = numeric_param(&parsed, WIDTH_PARAMS);
    let height = numeric_param(&parsed, HEIGHT_PARAMS);
    if width.is_some() || height.is_some() {
        return (width, height);
    }
    if let Some(caps) = PATH_DIMENSIONS.captures(parsed.path()) {
        return (caps[1].parse().ok(), caps[2].parse().ok());
    }
    (None, None)
}

/// Smallest size the URL asks the image server for, if any.
pub fn requested_size(url: &str) -> Option<u32> {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return None;
    };
    let (width, height) = dimension_hints(url);
    let size = numeric_param(&parsed, SIZE_PARAMS);
    [width, height, size].into_iter().flatten().min()
}

/// Bump recognizable resize parameters so the image server returns a large
/// rendition. Width is raised to `target_width` and height scaled by the
/// same factor; a lone height or `size` parameter is raised to the target.
///
/// Returns `None` when nothing needed rewriting, which makes the rewrite
/// idempotent: an already-upgraded URL comes back unchanged.
pub fn upgrade_resize_params(url: &str, target_width: u32) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    parsed.query()?;

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let is_any = |k: &str, names: &[&str]| names.iter().any(|n| k.eq_ignore_ascii_case(n));
    let value_of = |names: &[&str]| {
        pairs
            .iter()
            .find(|(k, _)| is_any(k, names))
            .and_then(|(_, v)| v.trim().parse::<u32>().ok())
    };

    let width = value_of(WIDTH_PARAMS);
    let height = value_of(HEIGHT_PARAMS);
    let size = value_of(SIZE_PARAMS);

    let (new_width, new_height, new_size) = match (width, height) {
        (Some(w), h) if w > 0 && w < target_width => {
            let factor = target_width as f64 / w as f64;
            (
                Some(target_width),
                h.map(|h| (h as f64 * factor).round() as u32),
                None,
            )
        }
        (None, Some(h)) if h > 0 && h < target_width => (None, Some(target_width), None),
        (None, None) => match size {
            Some(s) if s > 0 && s < target_width => (None, None, Some(target_width)),
            _ => return None,
        },
        _ => return None,
    };

    let rewritten: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(k, v)| {
            if let Some(w) = new_width.filter(|_| is_any(&k, WIDTH_PARAMS)) {
                (k, w.to_string())
            } else if let Some(h) = new_height.filter(|_| is_any(&k, HEIGHT_PARAMS)) {
                (k, h.to_string())
            } else if let Some(s) = new_size.filter(|_| is_any(&k, SIZE_PARAMS)) {
                (k, s.to_string())
            } else {
                (k, v)
            }
        })
        .collect();

    parsed.query_pairs_mut().clear().extend_pairs(rewritten);
    let out = parsed.to_string();
    (out != url).then_some(out)
}

/// Decode a proxy-encoded image reference: a URL whose final path segment
/// is a base64 payload carrying the true origin URL.
pub fn decode_proxy_reference(url: &str) -> Result<String, DecodeError> {
    let parsed = Url::parse(url.trim()).map_err(|_| DecodeError::InvalidUrl)?;
    let segment = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or(DecodeError::NoPayload)?;

    let payload = segment.split('.').next().unwrap_or(segment);
    let payload = payload
        .replace("%3D", "=")
        .replace("%3d", "=")
        .replace("%2B", "+")
        .replace("%2b", "+");
    if payload.len() < 12 {
        return Err(DecodeError::NotBase64);
    }

    let bytes = [URL_SAFE_NO_PAD, URL_SAFE, STANDARD, STANDARD_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(payload.as_bytes()).ok())
        .ok_or(DecodeError::NotBase64)?;
    let text = String::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;

    let decoded = Url::parse(text.trim()).map_err(|_| DecodeError::NotUrl)?;
    if decoded.scheme() != "http" && decoded.scheme() != "https" {
        return Err(DecodeError::NotUrl);
    }
    Ok(decoded.to_string())
}

/// A proxy-host URL whose payload still decodes, i.e. one nobody unwrapped.
pub fn is_proxy_reference(url: &str, proxy_hosts: &[String]) -> bool {
    url_on_hosts(url, proxy_hosts) && decode_proxy_reference(url).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn encode(url: &str) -> String {
        URL_SAFE_NO_PAD.encode(url.as_bytes())
    }

    #[test]
    fn host_matching_covers_subdomains() {
        let allowed = hosts(&["sidearmdev.com"]);
        assert!(url_on_hosts("https://images.sidearmdev.com/a.jpg", &allowed));
        assert!(url_on_hosts("https://www.sidearmdev.com/a.jpg", &allowed));
        assert!(!url_on_hosts("https://notsidearmdev.com/a.jpg", &allowed));
        assert!(!url_on_hosts("/relative/a.jpg", &allowed));
    }

    #[test]
    fn data_uri_detection() {
        assert!(is_data_uri("data:image/png;base64,AAAA"));
        assert!(is_data_uri("  DATA:image/gif;base64,R0lG"));
        assert!(!is_data_uri("https://example.com/data.png"));
    }

    #[test]
    fn resolves_relative_refs() {
        let base = "https://gostate.com/sports/swimming/roster";
        assert_eq!(
            resolve_url(base, "/roster/aj-terry").as_deref(),
            Some("https://gostate.com/roster/aj-terry")
        );
        assert_eq!(
            resolve_url(base, "//cdn.example.com/x.jpg").as_deref(),
            Some("https://cdn.example.com/x.jpg")
        );
        assert_eq!(resolve_url(base, "javascript:void(0)"), None);
        assert_eq!(resolve_url(base, "#top"), None);
    }

    #[test]
    fn dimension_hints_from_query_and_path() {
        assert_eq!(
            dimension_hints("https://x.com/crop?url=a&width=300&height=450"),
            (Some(300), Some(450))
        );
        assert_eq!(
            dimension_hints("https://x.com/uploads/jane-150x150.jpg"),
            (Some(150), Some(150))
        );
        assert_eq!(dimension_hints("https://x.com/jane.jpg"), (None, None));
    }

    #[test]
    fn upgrade_scales_width_and_height() {
        let url = "https://images.sidearmdev.com/crop?url=abc&width=200&height=300&type=webp";
        let upgraded = upgrade_resize_params(url, 1200).unwrap();
        assert!(upgraded.contains("width=1200"));
        assert!(upgraded.contains("height=1800"));
        assert!(upgraded.contains("type=webp"));
    }

    #[test]
    fn upgrade_is_idempotent() {
        let url = "https://images.sidearmdev.com/crop?url=abc&width=200&height=300";
        let once = upgrade_resize_params(url, 1200).unwrap();
        assert_eq!(upgrade_resize_params(&once, 1200), None);
    }

    #[test]
    fn upgrade_leaves_large_and_paramless_urls() {
        assert_eq!(upgrade_resize_params("https://x.com/a.jpg?width=2000", 1200), None);
        assert_eq!(upgrade_resize_params("https://x.com/a.jpg", 1200), None);
        assert_eq!(upgrade_resize_params("https://x.com/a.jpg?v=3", 1200), None);
    }

    #[test]
    fn decodes_proxy_payload() {
        let origin = "https://storage.googleapis.com/bucket/roster/jane.jpg";
        let proxy = format!("https://images.sidearmdev.com/convert/{}.jpg", encode(origin));
        assert_eq!(decode_proxy_reference(&proxy).unwrap(), origin);
        assert!(is_proxy_reference(&proxy, &hosts(&["images.sidearmdev.com"])));
    }

    #[test]
    fn decode_failures_are_typed() {
        assert_eq!(
            decode_proxy_reference("https://x.com/photos/jane-doe.jpg"),
            Err(DecodeError::NotBase64)
        );
        assert_eq!(decode_proxy_reference("not a url"), Err(DecodeError::InvalidUrl));
        let not_url = format!("https://x.com/{}", encode("hello there, not a url"));
        assert_eq!(decode_proxy_reference(&not_url), Err(DecodeError::NotUrl));
    }
}
