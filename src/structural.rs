use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

// Penalty weights for the 0-100 organization score.
const HIERARCHY_SKIP_PENALTY: i64 = 10;
const SHORT_PARAGRAPH_PENALTY: i64 = 2;
const LONG_PARAGRAPH_PENALTY: i64 = 3;
const MISSING_ALT_PENALTY: i64 = 5;
const SHORT_PARAGRAPH_WORDS: usize = 20;
const LONG_PARAGRAPH_WORDS: usize = 100;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(#{1,6})\s+(.*)$").unwrap());
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(?:[-*+]|\d+[.)])\s+\S").unwrap());
static MD_IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static HTML_IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").unwrap());
static HTML_ALT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)\balt\s*=\s*["'][^"']+["']"#).unwrap());
static MD_LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").unwrap());
static FENCED_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct Heading {
    pub level: usize,
    pub text: String,
    /// Zero-based line number in the article source.
    pub position: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchySkip {
    pub from_level: usize,
    pub to_level: usize,
    pub heading: String,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListBlock {
    pub items: usize,
    pub nested: bool,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParagraphStats {
    pub total: usize,
    pub short: usize,
    pub long: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LinkStats {
    pub internal: usize,
    pub external: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImageStats {
    pub total: usize,
    pub missing_alt: usize,
}

/// Raw element tallies used by the similarity engine's structural metric.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ElementCounts {
    pub headings: usize,
    pub list_items: usize,
    pub images: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructuralReport {
    pub article_id: String,
    pub headings: Vec<Heading>,
    pub hierarchy_skips: Vec<HierarchySkip>,
    pub lists: Vec<ListBlock>,
    pub paragraphs: ParagraphStats,
    pub links: LinkStats,
    pub images: ImageStats,
    /// 0-100 penalty-based organization score.
    pub score: u32,
    pub recommendations: Vec<String>,
}

pub fn parse_headings(content: &str) -> Vec<Heading> {
    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if let Some(caps) = HEADING_RE.captures(line) {
            out.push(Heading {
                level: caps[1].len(),
                text: caps[2].trim().to_string(),
                position: idx,
            });
        }
    }
    out
}

/// A skip is any heading whose level is more than one step deeper than the
/// heading immediately before it (h2 -> h4, h1 -> h3, ...).
pub fn find_hierarchy_skips(headings: &[Heading]) -> Vec<HierarchySkip> {
    headings
        .windows(2)
        .filter(|w| w[1].level > w[0].level + 1)
        .map(|w| HierarchySkip {
            from_level: w[0].level,
            to_level: w[1].level,
            heading: w[1].text.clone(),
            position: w[1].position,
        })
        .collect()
}

pub fn parse_lists(content: &str) -> Vec<ListBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<ListBlock> = None;
    for (idx, line) in content.lines().enumerate() {
        if let Some(caps) = LIST_ITEM_RE.captures(line) {
            let indented = caps[1].len() >= 2;
            match current.as_mut() {
                Some(block) => {
                    block.items += 1;
                    block.nested |= indented;
                }
                None => {
                    current = Some(ListBlock { items: 1, nested: indented, position: idx });
                }
            }
        } else if !line.trim().is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
        }
    }
    if let Some(block) = current {
        blocks.push(block);
    }
    blocks
}

fn paragraph_stats(content: &str) -> ParagraphStats {
    let without_code = FENCED_CODE_RE.replace_all(content, "");
    let mut stats = ParagraphStats { total: 0, short: 0, long: 0 };
    for block in without_code.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        // Headings and list blocks are not prose paragraphs.
        let lines: Vec<&str> = block.lines().collect();
        if lines.iter().all(|l| HEADING_RE.is_match(l) || LIST_ITEM_RE.is_match(l)) {
            continue;
        }
        let words = block.split_whitespace().count();
        stats.total += 1;
        if words < SHORT_PARAGRAPH_WORDS {
            stats.short += 1;
        } else if words > LONG_PARAGRAPH_WORDS {
            stats.long += 1;
        }
    }
    stats
}

pub fn link_stats(content: &str) -> LinkStats {
    let mut stats = LinkStats { internal: 0, external: 0 };
    for caps in MD_LINK_RE.captures_iter(content) {
        // A leading `!` marks image syntax, not a link.
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        if start > 0 && content.as_bytes()[start - 1] == b'!' {
            continue;
        }
        let target = caps[2].trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            stats.external += 1;
        } else {
            stats.internal += 1;
        }
    }
    stats
}

fn image_stats(content: &str) -> ImageStats {
    let mut stats = ImageStats { total: 0, missing_alt: 0 };
    for caps in MD_IMAGE_RE.captures_iter(content) {
        stats.total += 1;
        if caps[1].trim().is_empty() {
            stats.missing_alt += 1;
        }
    }
    for m in HTML_IMAGE_RE.find_iter(content) {
        stats.total += 1;
        if !HTML_ALT_RE.is_match(m.as_str()) {
            stats.missing_alt += 1;
        }
    }
    stats
}

pub fn element_counts(content: &str) -> ElementCounts {
    let headings = parse_headings(content).len();
    let list_items = parse_lists(content).iter().map(|b| b.items).sum();
    let images = image_stats(content).total;
    ElementCounts { headings, list_items, images }
}

/// Full structural pass over one article's content.
pub fn analyze_structure(article_id: &str, content: &str) -> StructuralReport {
    let headings = parse_headings(content);
    let hierarchy_skips = find_hierarchy_skips(&headings);
    let lists = parse_lists(content);
    let paragraphs = paragraph_stats(content);
    let links = link_stats(content);
    let images = image_stats(content);

    let penalty = HIERARCHY_SKIP_PENALTY * hierarchy_skips.len() as i64
        + SHORT_PARAGRAPH_PENALTY * paragraphs.short as i64
        + LONG_PARAGRAPH_PENALTY * paragraphs.long as i64
        + MISSING_ALT_PENALTY * images.missing_alt as i64;
    let score = (100i64 - penalty).clamp(0, 100) as u32;

    // Priority order: accessibility, then hierarchy, then paragraph length.
    let mut recommendations = Vec::new();
    if images.missing_alt > 0 {
        recommendations.push(format!(
            "Add alternative text to {} image(s) for accessibility",
            images.missing_alt
        ));
    }
    if !hierarchy_skips.is_empty() {
        recommendations.push(format!(
            "Fix {} heading hierarchy skip(s) (e.g. h{} followed by h{} at '{}')",
            hierarchy_skips.len(),
            hierarchy_skips[0].from_level,
            hierarchy_skips[0].to_level,
            hierarchy_skips[0].heading
        ));
    }
    if paragraphs.short > 0 {
        recommendations.push(format!(
            "Merge or expand {} short paragraph(s) (under {} words)",
            paragraphs.short, SHORT_PARAGRAPH_WORDS
        ));
    }
    if paragraphs.long > 0 {
        recommendations.push(format!(
            "Split {} long paragraph(s) (over {} words)",
            paragraphs.long, LONG_PARAGRAPH_WORDS
        ));
    }

    debug!(
        "Structural analysis - article={}, headings={}, skips={}, score={}",
        article_id,
        headings.len(),
        hierarchy_skips.len(),
        score
    );

    StructuralReport {
        article_id: article_id.to_string(),
        headings,
        hierarchy_skips,
        lists,
        paragraphs,
        links,
        images,
        score,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headings_with_levels_and_positions() {
        let content = "# Intro\n\nSome text.\n\n## Details\n\n### Fine print";
        let headings = parse_headings(content);
        assert_eq!(headings.len(), 3);
        assert_eq!(headings[0].level, 1);
        assert_eq!(headings[0].position, 0);
        assert_eq!(headings[2].text, "Fine print");
    }

    #[test]
    fn detects_hierarchy_skip() {
        let content = "# Intro\n\n### Deep dive\n\nbody";
        let report = analyze_structure("a1", content);
        assert_eq!(report.hierarchy_skips.len(), 1);
        assert_eq!(report.hierarchy_skips[0].from_level, 1);
        assert_eq!(report.hierarchy_skips[0].to_level, 3);
    }

    #[test]
    fn score_floors_at_zero() {
        // 20+ skips: alternate h1 / h3 so every second heading is a skip.
        let mut content = String::new();
        for _ in 0..25 {
            content.push_str("# top\n### deep\n");
        }
        let report = analyze_structure("a1", &content);
        assert_eq!(report.score, 0);
    }

    #[test]
    fn counts_list_blocks_and_nesting() {
        let content = "intro paragraph here\n- one\n- two\n  - nested\nclosing text\n\n1. first\n2. second";
        let lists = parse_lists(content);
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].items, 3);
        assert!(lists[0].nested);
        assert_eq!(lists[1].items, 2);
        assert!(!lists[1].nested);
    }

    #[test]
    fn flags_images_without_alt_text() {
        let content = "![](bare.png)\n![diagram](ok.png)\n<img src=\"x.png\">\n<img src=\"y.png\" alt=\"labeled\">";
        let report = analyze_structure("a1", content);
        assert_eq!(report.images.total, 4);
        assert_eq!(report.images.missing_alt, 2);
        // 2 missing-alt penalties plus one short paragraph (the image block).
        assert_eq!(report.score, 88);
        assert!(report.recommendations[0].contains("alternative text"));
    }

    #[test]
    fn classifies_internal_and_external_links() {
        let content = "See [setup](/kb/setup) and [docs](https://docs.example.com).";
        let report = analyze_structure("a1", content);
        assert_eq!(report.links.internal, 1);
        assert_eq!(report.links.external, 1);
    }

    #[test]
    fn adjacent_links_are_all_counted() {
        let content = "[a](/kb/a)[b](https://docs.example.com)[c](/kb/c)";
        let stats = link_stats(content);
        assert_eq!(stats.internal, 2);
        assert_eq!(stats.external, 1);
    }

    #[test]
    fn image_syntax_is_not_counted_as_a_link() {
        let content = "![chart](chart.png)[source](/kb/data)";
        let stats = link_stats(content);
        assert_eq!(stats.internal, 1);
        assert_eq!(stats.external, 0);
    }

    #[test]
    fn accessibility_recommendation_comes_first() {
        let content = "# A\n\n### skip\n\n![](img.png)\n\ntiny text";
        let report = analyze_structure("a1", content);
        assert!(report.recommendations.len() >= 3);
        assert!(report.recommendations[0].contains("alternative text"));
        assert!(report.recommendations[1].contains("hierarchy"));
    }
}
