//! Roster-listing candidate extraction.
//!
//! Each strategy is a pure function over the parsed page that knows one
//! family of markup. Strategies run in order and the first one producing a
//! plausible candidate wins; adding support for a new site layout means
//! adding a strategy here.

use std::collections::HashSet;
use std::sync::LazyLock;

use roster_common::media::resolve_url;
use roster_common::{is_plausible_name, Document, ScrapedCandidate};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::images::collect_images;

type Strategy = fn(&Html, &str) -> Vec<ScrapedCandidate>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("tagged_player_links", tagged_player_links),
    ("table_rows", table_rows),
    ("card_grid", card_grid),
    ("list_items", list_items),
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static TAGGED: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "[data-player-name], \
         .sidearm-roster-player-name a, \
         [data-test-id='s-person-details__personal-single-line'] a, \
         a.roster-player-link",
    )
});
static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td, th"));
static CARD: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        ".roster-card, .player-card, .s-person-card, .roster-list-item, \
         [class*='roster-card'], [class*='player-card']",
    )
});
static CARD_NAME: LazyLock<Selector> = LazyLock::new(|| {
    selector(".player-name, .name, .s-person-details__personal-single-line, h3, h4")
});
static LIST_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("li"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static CLASS_YEAR: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        ".sidearm-roster-player-academic-year, .player-class, .class-year, \
         [data-player-class], .s-person-details__bio-stats-item--year",
    )
});
static HOMETOWN: LazyLock<Selector> = LazyLock::new(|| {
    selector(".sidearm-roster-player-hometown, .player-hometown, .hometown, [data-player-hometown]")
});

/// Extract roster candidates from a listing page. Never fails: markup no
/// strategy understands yields an empty list.
pub fn extract(doc: &Document) -> Vec<ScrapedCandidate> {
    if doc.is_empty() {
        return Vec::new();
    }
    let html = Html::parse_document(&doc.html);

    for (name, strategy) in STRATEGIES {
        let raw = strategy(&html, &doc.url);
        let plausible: Vec<ScrapedCandidate> = raw
            .into_iter()
            .filter(|c| is_plausible_name(&c.raw_name) && !c.normalized_name.is_empty())
            .collect();
        if plausible.is_empty() {
            debug!(url = doc.url.as_str(), strategy = name, "Strategy found nothing");
            continue;
        }
        let candidates = dedupe(plausible);
        info!(
            url = doc.url.as_str(),
            strategy = name,
            candidates = candidates.len(),
            "Extracted roster candidates"
        );
        return candidates;
    }
    Vec::new()
}

/// Keep the first candidate per profile URL (or per normalized name when
/// there is no URL), preserving page order.
fn dedupe(candidates: Vec<ScrapedCandidate>) -> Vec<ScrapedCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let key = match &c.profile_url {
                Some(url) => format!("url:{url}"),
                None => format!("name:{}", c.normalized_name),
            };
            seen.insert(key)
        })
        .collect()
}

// --- Strategies ---

/// Player links tagged by the site builder: `data-player-name` attributes or
/// the well-known roster-template name classes.
fn tagged_player_links(html: &Html, base: &str) -> Vec<ScrapedCandidate> {
    html.select(&TAGGED)
        .map(|el| {
            let name = el
                .value()
                .attr("data-player-name")
                .map(str::to_string)
                .unwrap_or_else(|| text_of(el));
            let link = if el.value().name() == "a" {
                Some(el)
            } else {
                el.select(&LINK).next()
            };
            let profile_url = link
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve_url(base, href));
            build_candidate(&name, profile_url, container_of(el), base)
        })
        .collect()
}

/// Roster tables: find the name column from the header row and read one
/// candidate per body row.
fn table_rows(html: &Html, base: &str) -> Vec<ScrapedCandidate> {
    let mut out = Vec::new();
    for table in html.select(&TABLE) {
        let Some(columns) = header_columns(table) else {
            continue;
        };
        for row in table.select(&ROW) {
            let cells: Vec<ElementRef> = row.select(&CELL).collect();
            // Header rows have only <th> cells.
            if cells.iter().all(|c| c.value().name() == "th") {
                continue;
            }
            let Some(name_cell) = cells.get(columns.name) else {
                continue;
            };
            let name = name_cell
                .select(&LINK)
                .next()
                .map(text_of)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| text_of(*name_cell));
            let profile_url = name_cell
                .select(&LINK)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| resolve_url(base, href));

            let mut candidate = ScrapedCandidate::new(&name, profile_url);
            candidate.image_candidates = collect_images(row, base);
            candidate.class_year = columns
                .class_year
                .and_then(|i| cells.get(i))
                .map(|c| text_of(*c))
                .filter(|t| !t.is_empty());
            candidate.hometown = columns
                .hometown
                .and_then(|i| cells.get(i))
                .map(|c| text_of(*c))
                .filter(|t| !t.is_empty());
            out.push(candidate);
        }
    }
    out
}

struct Columns {
    name: usize,
    class_year: Option<usize>,
    hometown: Option<usize>,
}

fn header_columns(table: ElementRef<'_>) -> Option<Columns> {
    let header_row = table
        .select(&ROW)
        .find(|row| row.select(&HEADER_CELL).next().is_some())?;
    let headers: Vec<String> = header_row
        .select(&CELL)
        .map(|c| text_of(c).to_lowercase())
        .collect();

    let name = headers
        .iter()
        .position(|h| h == "name" || h.contains("full name") || h.contains("player"))
        .or_else(|| headers.iter().position(|h| h.contains("name")))?;
    let class_year = headers.iter().position(|h| {
        matches!(h.trim_end_matches('.'), "yr" | "year" | "class" | "cl" | "academic year" | "elig")
    });
    let hometown = headers.iter().position(|h| h.contains("hometown"));

    Some(Columns {
        name,
        class_year,
        hometown,
    })
}

/// Card layouts: one element per athlete with a heading or name block.
fn card_grid(html: &Html, base: &str) -> Vec<ScrapedCandidate> {
    html.select(&CARD)
        .filter_map(|card| {
            let name = card
                .select(&CARD_NAME)
                .map(text_of)
                .find(|t| !t.is_empty())
                .or_else(|| card.select(&LINK).map(text_of).find(|t| !t.is_empty()))?;
            let profile_url = card
                .select(&LINK)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| resolve_url(base, href));
            Some(build_candidate(&name, profile_url, card, base))
        })
        .collect()
}

/// Bare lists whose items link to roster or player pages.
fn list_items(html: &Html, base: &str) -> Vec<ScrapedCandidate> {
    html.select(&LIST_ITEM)
        .filter_map(|li| {
            let link = li.select(&LINK).find(|a| {
                a.value()
                    .attr("href")
                    .map(|h| {
                        let h = h.to_lowercase();
                        h.contains("/roster/") || h.contains("player")
                    })
                    .unwrap_or(false)
            })?;
            let name = text_of(link);
            let profile_url = link
                .value()
                .attr("href")
                .and_then(|href| resolve_url(base, href));
            Some(build_candidate(&name, profile_url, li, base))
        })
        .collect()
}

// --- Helpers ---

fn build_candidate(
    name: &str,
    profile_url: Option<String>,
    container: ElementRef<'_>,
    base: &str,
) -> ScrapedCandidate {
    let mut candidate = ScrapedCandidate::new(name, profile_url);
    candidate.image_candidates = collect_images(container, base);
    candidate.class_year = field(container, &CLASS_YEAR, "data-player-class");
    candidate.hometown = field(container, &HOMETOWN, "data-player-hometown");
    candidate
}

fn field(container: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    if let Some(v) = container.value().attr(attr) {
        return Some(v.trim().to_string()).filter(|v| !v.is_empty());
    }
    container.select(sel).next().and_then(|el| {
        el.value()
            .attr(attr)
            .map(|v| v.trim().to_string())
            .or_else(|| Some(text_of(el)))
            .filter(|v| !v.is_empty())
    })
}

/// Nearest ancestor that plausibly wraps one athlete's entry: a list item,
/// row or article, else a card-like block.
fn container_of(el: ElementRef<'_>) -> ElementRef<'_> {
    let ancestors: Vec<ElementRef> = el.ancestors().filter_map(ElementRef::wrap).take(6).collect();
    ancestors
        .iter()
        .find(|anc| matches!(anc.value().name(), "li" | "tr" | "article"))
        .or_else(|| {
            ancestors.iter().find(|anc| {
                anc.value()
                    .classes()
                    .any(|c| c.to_lowercase().contains("card"))
            })
        })
        .copied()
        .unwrap_or(el)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://gostate.com/sports/swimming/roster";

    fn doc(body: &str) -> Document {
        Document::new(URL, format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn tagged_links_win_and_carry_images() {
        let page = doc(r#"
            <ul>
              <li class="sidearm-roster-player">
                <img data-src="/images/2024/jane.jpg" width="240" height="360" alt="Jane Doe">
                <div class="sidearm-roster-player-name"><a href="/roster/jane-doe/101">Jane Doe</a></div>
                <span class="sidearm-roster-player-academic-year">Jr.</span>
                <span class="sidearm-roster-player-hometown">Austin, Texas</span>
              </li>
              <li class="sidearm-roster-player">
                <div class="sidearm-roster-player-name"><a href="/roster/aj-terry/102">A. J. Terry</a></div>
              </li>
            </ul>
            <table><tr><th>Name</th></tr><tr><td>Not Me</td></tr></table>
        "#);
        let found = extract(&page);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].raw_name, "Jane Doe");
        assert_eq!(found[0].profile_url.as_deref(), Some("https://gostate.com/roster/jane-doe/101"));
        assert_eq!(found[0].class_year.as_deref(), Some("Jr."));
        assert_eq!(found[0].hometown.as_deref(), Some("Austin, Texas"));
        assert_eq!(found[0].image_candidates[0].url, "https://gostate.com/images/2024/jane.jpg");
        assert_eq!(found[1].normalized_name, "aj terry");
        assert!(found[1].image_candidates.is_empty());
    }

    #[test]
    fn table_header_maps_columns() {
        let page = doc(r#"
            <table>
              <thead><tr><th>#</th><th>Name</th><th>Yr.</th><th>Hometown / High School</th></tr></thead>
              <tbody>
                <tr><td>1</td><td><a href="/roster/sam-lee">Sam Lee</a></td><td>So.</td><td>Reno, Nev.</td></tr>
                <tr><td>2</td><td>Kim Park</td><td>Fr.</td><td></td></tr>
              </tbody>
            </table>
        "#);
        let found = extract(&page);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].profile_url.as_deref(), Some("https://gostate.com/roster/sam-lee"));
        assert_eq!(found[0].class_year.as_deref(), Some("So."));
        assert_eq!(found[0].hometown.as_deref(), Some("Reno, Nev."));
        assert_eq!(found[1].profile_url, None);
        assert_eq!(found[1].hometown, None);
    }

    #[test]
    fn card_grid_fallback() {
        let page = doc(r#"
            <div class="roster-card"><h3>Mia Chen</h3><a href="/players/mia-chen">Full Bio</a></div>
            <div class="roster-card"><h3>Full Bio</h3></div>
        "#);
        let found = extract(&page);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].raw_name, "Mia Chen");
        assert_eq!(found[0].profile_url.as_deref(), Some("https://gostate.com/players/mia-chen"));
    }

    #[test]
    fn list_items_last_resort() {
        let page = doc(r#"
            <ul>
              <li><a href="/roster/will-chen">Will Chen</a></li>
              <li><a href="/schedule">Schedule</a></li>
              <li><a href="/roster/will-chen">Will Chen</a></li>
            </ul>
        "#);
        let found = extract(&page);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].raw_name, "Will Chen");
    }

    #[test]
    fn boilerplate_only_page_yields_nothing() {
        let page = doc(r#"<ul><li><a href="/roster/x">Full Bio</a></li><li><a href="/roster/y">Al</a></li></ul>"#);
        assert!(extract(&page).is_empty());
    }

    #[test]
    fn unrelated_markup_is_empty_not_error() {
        assert!(extract(&doc("<p>Nothing to see</p>")).is_empty());
        assert!(extract(&Document::new(URL, "")).is_empty());
        assert!(extract(&Document::new(URL, "<<<not html")).is_empty());
    }

    #[test]
    fn dedupe_by_name_without_url() {
        let page = doc(r#"
            <table>
              <tr><th>Name</th></tr>
              <tr><td>Kim Park</td></tr>
              <tr><td>Kim  Park</td></tr>
            </table>
        "#);
        assert_eq!(extract(&page).len(), 1);
    }
}
