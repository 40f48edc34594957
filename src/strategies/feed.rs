//! RSS 2.0, RSS 1.0 (RDF) and Atom feeds.
//!
//! The strategy only applies when the head of the raw payload contains a feed
//! root marker (`<rss`, `<feed` or `<rdf:RDF`); everything else is
//! [`Outcome::NotApplicable`]. Feeds are deserialized with `quick_xml::de`.
//!
//! Real-world feeds are full of HTML named entities (`&nbsp;`, `&mdash;`)
//! that are not valid XML, and of bare ampersands. Before parsing, named
//! entities are rewritten to numeric character references and stray `&` to
//! `&amp;`.
//!
//! Text constructs may also carry child markup: Atom `type="xhtml"` content,
//! or an RSS `<title>` with inline `<b>`. The body of every `title`,
//! `summary`, `content`, `description` and `subtitle` element that contains a
//! child element is wrapped in a CDATA section before parsing, and the markup
//! is flattened to text afterwards.
//!
//! | Field | RSS 2.0 / RDF | Atom |
//! |-------|---------------|------|
//! | title | `title` | `title` |
//! | url | `link`, permalink `guid` | `link[rel=alternate]/@href` |
//! | published | `pubDate`, `dc:date` | `published`, `updated` |
//! | summary | `description` (HTML reduced to text) | `summary`, `content` |
//! | author | `author`, `dc:creator` | `author/name` |
//! | image | `enclosure`, `media:thumbnail`, `media:content`, first `<img>` | same media elements |
//! | tags | `category` | `category/@term` |

use crate::dates::DateNormalizer;
use crate::error::{PartialFailure, StrategyError};
use crate::models::{ExtractedArticle, collapse_whitespace};
use crate::strategies::dom::{attr, resolve_link};
use crate::strategies::{Extraction, ExtractionStrategy, Outcome, Page};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// How much of the payload is inspected for a root marker.
const SNIFF_CHARS: usize = 1024;

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#?[A-Za-z0-9]+;)?").expect("entity pattern compiles"));
static TEXT_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(title|summary|content|description|subtitle)(?:\s[^>]*)?>")
        .expect("text construct pattern compiles")
});
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("img selector"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Rss,
    Rdf,
    Atom,
}

fn sniff(markup: &str) -> Option<FeedKind> {
    let head: String = markup
        .trim_start()
        .chars()
        .take(SNIFF_CHARS)
        .collect::<String>()
        .to_ascii_lowercase();
    if head.contains("<rss") {
        Some(FeedKind::Rss)
    } else if head.contains("<rdf:rdf") {
        Some(FeedKind::Rdf)
    } else if head.contains("<feed") {
        Some(FeedKind::Atom)
    } else {
        None
    }
}

/// Make HTML-flavoured XML palatable to a strict XML parser.
fn scrub_entities(xml: &str) -> String {
    ENTITY
        .replace_all(xml, |caps: &Captures<'_>| {
            let Some(entity) = caps.get(1).map(|m| m.as_str()) else {
                return "&amp;".to_string();
            };
            let name = entity.trim_end_matches(';');
            if name.starts_with('#') || matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
                return format!("&{entity}");
            }
            let decoded = html_escape::decode_html_entities(&format!("&{entity}")).into_owned();
            if decoded == format!("&{entity}") {
                format!("&amp;{entity}")
            } else {
                decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
            }
        })
        .into_owned()
}

/// Wrap the body of text constructs holding child elements in CDATA.
fn wrap_inline_markup(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    while let Some(caps) = TEXT_OPEN.captures_at(xml, cursor) {
        let (Some(open), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        out.push_str(&xml[cursor..open.end()]);
        cursor = open.end();
        if open.as_str().ends_with("/>") {
            continue;
        }

        let close = format!("</{}>", name.as_str());
        let Some(len) = xml[cursor..].find(&close) else {
            continue;
        };
        let body = &xml[cursor..cursor + len];
        if body.contains('<') && !body.contains("<![CDATA[") {
            out.push_str("<![CDATA[");
            out.push_str(&body.replace("]]>", "]]]]><![CDATA[>"));
            out.push_str("]]>");
        } else {
            out.push_str(body);
        }
        out.push_str(&close);
        cursor += len + close.len();
    }
    out.push_str(&xml[cursor..]);
    out
}

/// `<link>` in RSS is text; in Atom (and `atom:link` inside RSS) it is an
/// empty element with attributes.
#[derive(Debug, Default, Deserialize)]
struct Link {
    #[serde(rename = "@href", default)]
    href: Option<String>,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Guid {
    #[serde(rename = "@isPermaLink", default)]
    is_perma_link: Option<String>,
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url", default)]
    url: Option<String>,
    #[serde(rename = "@type", default)]
    mime: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Vec<Link>,
    #[serde(default)]
    guid: Option<Guid>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
    #[serde(alias = "dc:date", default)]
    date: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(alias = "dc:creator", default)]
    creator: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
    #[serde(default)]
    enclosure: Vec<MediaRef>,
    #[serde(alias = "media:thumbnail", default)]
    thumbnail: Vec<MediaRef>,
    #[serde(alias = "media:content", default)]
    content: Vec<MediaRef>,
}

#[derive(Debug, Default, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

/// RSS 1.0: items are siblings of the channel under `rdf:RDF`.
#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomPerson {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term", default)]
    term: Option<String>,
    #[serde(rename = "@label", default)]
    label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Vec<Link>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    summary: Vec<String>,
    #[serde(default)]
    content: Vec<String>,
    #[serde(default)]
    author: Vec<AtomPerson>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
    #[serde(alias = "media:thumbnail", default)]
    thumbnail: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

/// Plain text of an HTML snippet, entities decoded.
fn html_to_text(snippet: &str) -> String {
    let fragment = Html::parse_fragment(snippet);
    collapse_whitespace(&fragment.root_element().text().collect::<String>())
}

fn first_img(snippet: &str, base: &Url) -> Option<Url> {
    let fragment = Html::parse_fragment(snippet);
    fragment
        .select(&IMG)
        .find_map(|img| attr(img, "src").and_then(|src| resolve_link(base, src)))
}

fn decode_text(text: &str) -> String {
    collapse_whitespace(&html_escape::decode_html_entities(text))
}

/// Title text: flattened when it still carries markup.
fn title_text(title: Option<&str>) -> String {
    match title.unwrap_or_default() {
        t if t.contains('<') => html_to_text(t),
        t => decode_text(t),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn first_media(candidates: &[&[MediaRef]], base: &Url) -> Option<Url> {
    candidates
        .iter()
        .flat_map(|list| list.iter())
        .filter(|m| m.mime.as_deref().is_none_or(|t| t.starts_with("image")))
        .find_map(|m| non_empty(m.url.as_deref()).and_then(|u| resolve_link(base, u)))
}

fn rss_article(
    index: usize,
    item: RssItem,
    base: &Url,
    dates: &DateNormalizer,
) -> Result<ExtractedArticle, PartialFailure> {
    let permalink = item.guid.as_ref().and_then(|g| {
        let perma = g
            .is_perma_link
            .as_deref()
            .is_none_or(|flag| !flag.trim().eq_ignore_ascii_case("false"));
        perma.then(|| non_empty(g.value.as_deref())).flatten()
    });
    let url = item
        .link
        .iter()
        .filter_map(|l| non_empty(l.text.as_deref()).or_else(|| non_empty(l.href.as_deref())))
        .chain(permalink)
        .find_map(|href| resolve_link(base, href))
        .ok_or_else(|| PartialFailure::new(format!("item {index}: no resolvable link")))?;

    let published_at = [item.pub_date.as_deref(), item.date.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|d| dates.parse(d));
    let description = item.description.as_deref().unwrap_or_default();
    let image_url = first_media(
        &[
            item.enclosure.as_slice(),
            item.thumbnail.as_slice(),
            item.content.as_slice(),
        ],
        base,
    )
        .or_else(|| first_img(description, base));
    let author = non_empty(item.creator.as_deref())
        .or(non_empty(item.author.as_deref()))
        .map(decode_text);

    Ok(ExtractedArticle::new(title_text(item.title.as_deref()), url)
        .with_published_at(published_at)
        .with_summary(Some(html_to_text(description)))
        .with_author(author)
        .with_image(image_url)
        .with_tags(item.categories.iter().map(|c| decode_text(c)).collect()))
}

fn atom_article(
    index: usize,
    entry: AtomEntry,
    base: &Url,
    dates: &DateNormalizer,
) -> Result<ExtractedArticle, PartialFailure> {
    let alternate = entry
        .link
        .iter()
        .filter(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .filter_map(|l| non_empty(l.href.as_deref()));
    let id_link = non_empty(entry.id.as_deref()).filter(|id| id.starts_with("http"));
    let url = alternate
        .chain(id_link)
        .find_map(|href| resolve_link(base, href))
        .ok_or_else(|| PartialFailure::new(format!("entry {index}: no resolvable link")))?;

    let published_at = [entry.published.as_deref(), entry.updated.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|d| dates.parse(d));
    let body = entry
        .summary
        .iter()
        .chain(entry.content.iter())
        .find(|s| !s.trim().is_empty())
        .map(String::as_str)
        .unwrap_or_default();
    let image_url = first_media(&[entry.thumbnail.as_slice()], base).or_else(|| first_img(body, base));
    let author = entry
        .author
        .iter()
        .find_map(|a| non_empty(a.name.as_deref()))
        .map(decode_text);
    let tags = entry
        .categories
        .iter()
        .filter_map(|c| non_empty(c.label.as_deref()).or(non_empty(c.term.as_deref())))
        .map(decode_text)
        .collect();

    Ok(ExtractedArticle::new(title_text(entry.title.as_deref()), url)
        .with_published_at(published_at)
        .with_summary(Some(html_to_text(body)))
        .with_author(author)
        .with_image(image_url)
        .with_tags(tags))
}

#[derive(Debug, Clone, Default)]
pub struct FeedStrategy;

impl FeedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionStrategy for FeedStrategy {
    fn id(&self) -> &str {
        "feed"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn extract(&self, page: &Page<'_>) -> Result<Outcome, StrategyError> {
        let Some(kind) = sniff(page.markup()) else {
            return Ok(Outcome::NotApplicable);
        };

        let xml = wrap_inline_markup(&scrub_entities(page.markup()));
        let malformed = |e: quick_xml::de::DeError| StrategyError::Malformed(e.to_string());
        let (base, dates) = (page.base_url(), page.dates());
        let mut extraction = Extraction::default();

        match kind {
            FeedKind::Rss => {
                let feed: Rss = quick_xml::de::from_str(&xml).map_err(malformed)?;
                for (i, item) in feed.channel.items.into_iter().enumerate() {
                    extraction.push(rss_article(i, item, base, dates));
                }
            }
            FeedKind::Rdf => {
                let feed: Rdf = quick_xml::de::from_str(&xml).map_err(malformed)?;
                for (i, item) in feed.items.into_iter().enumerate() {
                    extraction.push(rss_article(i, item, base, dates));
                }
            }
            FeedKind::Atom => {
                let feed: Atom = quick_xml::de::from_str(&xml).map_err(malformed)?;
                for (i, entry) in feed.entries.into_iter().enumerate() {
                    extraction.push(atom_article(i, entry, base, dates));
                }
            }
        }

        debug!(
            ?kind,
            count = extraction.articles.len(),
            skipped = extraction.partial_failures.len(),
            "Feed extraction"
        );
        Ok(Outcome::Extracted(extraction))
    }
}
