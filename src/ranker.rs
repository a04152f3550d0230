use crate::types::{ContentItem, ContentStatus, DataSource, RawItem};
use uuid::Uuid;

/// Scores a single item in the 0-100 range. Implementations must be pure so
/// re-ranking the same batch always yields the same order; that keeps test
/// runs reproducible and retries safe.
pub trait ContentScorer: Send + Sync {
    fn score(&self, item: &RawItem) -> f64;
}

/// Keyword/length heuristic scorer. Deterministic by construction.
pub struct HeuristicScorer;

/// Topic keywords and their weights. Title hits count double.
const TOPIC_KEYWORDS: &[(&str, f64)] = &[
    ("artificial intelligence", 12.0),
    ("open source", 8.0),
    ("benchmark", 8.0),
    ("deepseek", 7.0),
    ("research", 6.0),
    ("release", 6.0),
    ("github", 6.0),
    ("model", 5.0),
    ("agent", 5.0),
    ("llm", 8.0),
    ("gpt", 6.0),
    ("ai", 10.0),
];

impl ContentScorer for HeuristicScorer {
    fn score(&self, item: &RawItem) -> f64 {
        let title = item.title.to_lowercase();
        let content = item.content.to_lowercase();

        let mut score: f64 = 40.0;
        for (keyword, weight) in TOPIC_KEYWORDS {
            if title.contains(keyword) {
                score += weight * 2.0;
            } else if content.contains(keyword) {
                score += weight;
            }
        }

        // Substantive bodies rank above one-liners.
        if content.chars().count() >= 400 {
            score += 6.0;
        }
        if content.chars().count() >= 1500 {
            score += 4.0;
        }
        if !item.media.is_empty() {
            score += 4.0;
        }

        score.clamp(0.0, 100.0)
    }
}

/// Turn a raw connector item into a scored draft content item.
pub fn build_content_item(
    source: &DataSource,
    raw: RawItem,
    scorer: &dyn ContentScorer,
) -> ContentItem {
    let score = scorer.score(&raw);
    let keywords = extract_keywords(&format!("{} {}", raw.title, raw.content));

    ContentItem {
        id: Uuid::new_v4(),
        source_id: source.id,
        title: raw.title,
        content: raw.content,
        url: raw.url,
        keywords,
        score,
        media: raw.media,
        status: ContentStatus::Draft,
        published_at: raw.published_at,
        summary: None,
    }
}

/// Deterministic total ordering: score descending, ties broken by most
/// recent publish timestamp, then by identifier.
pub fn rank(mut items: Vec<ContentItem>) -> Vec<ContentItem> {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.published_at.cmp(&a.published_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    items
}

/// Take the top `article_num` of an already-ranked batch and mark the
/// selection.
pub fn select(ranked: Vec<ContentItem>, article_num: usize) -> Vec<ContentItem> {
    ranked
        .into_iter()
        .take(article_num)
        .map(|mut item| {
            item.status = ContentStatus::Selected;
            item
        })
        .collect()
}

/// Extract up to ten notable keywords, skipping stop words, preserving the
/// order of first appearance.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in text.to_lowercase().split_whitespace() {
        let cleaned: String = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string();
        if cleaned.len() <= 3 || is_stop_word(&cleaned) {
            continue;
        }
        if !keywords.contains(&cleaned) {
            keywords.push(cleaned);
        }
        if keywords.len() >= 10 {
            break;
        }
    }
    keywords
}

fn is_stop_word(word: &str) -> bool {
    matches!(
        word,
        "the" | "and" | "that" | "this" | "these" | "those" | "with" | "from" | "have"
            | "has" | "had" | "will" | "would" | "could" | "should" | "been" | "were"
            | "was" | "are" | "for" | "into" | "about" | "over" | "their" | "than"
            | "more" | "most" | "some" | "such" | "what" | "when" | "where" | "which"
            | "while" | "after" | "before" | "today"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(title: &str, content: &str) -> RawItem {
        RawItem {
            url: format!("https://example.com/{}", title.replace(' ', "-")),
            title: title.to_string(),
            content: content.to_string(),
            published_at: None,
            media: Vec::new(),
        }
    }

    fn source() -> DataSource {
        DataSource {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            connector: crate::types::ConnectorKind::CustomApi,
            url: "https://example.com/feed".to_string(),
            enabled: true,
            health: crate::types::HealthStatus::Active,
            kinds: vec![crate::types::WorkflowKind::WeixinArticle],
            last_sync: None,
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn scoring_favors_topic_hits() {
        let scorer = HeuristicScorer;
        let relevant = scorer.score(&raw(
            "New AI benchmark results",
            "The LLM beat every open source model on the benchmark suite.",
        ));
        let irrelevant = scorer.score(&raw("Weekend recipes", "Five pasta dishes to try."));
        assert!(relevant > irrelevant);
    }

    #[test]
    fn ranking_is_deterministic() {
        let src = source();
        let scorer = HeuristicScorer;
        let items: Vec<ContentItem> = (0..20)
            .map(|i| {
                build_content_item(
                    &src,
                    raw(&format!("item {i}"), "AI model release notes"),
                    &scorer,
                )
            })
            .collect();

        let first = rank(items.clone());
        let second = rank(items);
        let first_ids: Vec<Uuid> = first.iter().map(|i| i.id).collect();
        let second_ids: Vec<Uuid> = second.iter().map(|i| i.id).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn ties_break_on_recency_then_id() {
        let src = source();
        let older = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 1, 14, 8, 0, 0).unwrap();

        let mut a = build_content_item(&src, raw("same", "same body"), &HeuristicScorer);
        let mut b = build_content_item(&src, raw("same", "same body"), &HeuristicScorer);
        a.published_at = Some(older);
        b.published_at = Some(newer);

        let ranked = rank(vec![a.clone(), b.clone()]);
        assert_eq!(ranked[0].id, b.id, "newer item should rank first on a tie");

        // Identical timestamps fall back to the identifier for stability.
        let mut c = a.clone();
        let mut d = b.clone();
        c.published_at = Some(newer);
        d.published_at = Some(newer);
        let ranked = rank(vec![c.clone(), d.clone()]);
        let expected_first = if c.id < d.id { c.id } else { d.id };
        assert_eq!(ranked[0].id, expected_first);
    }

    #[test]
    fn selection_bounds_the_prefix() {
        let src = source();
        let items: Vec<ContentItem> = (0..15)
            .map(|i| {
                build_content_item(
                    &src,
                    raw(&format!("item {i}"), "AI news"),
                    &HeuristicScorer,
                )
            })
            .collect();

        let selected = select(rank(items), 10);
        assert_eq!(selected.len(), 10);
        assert!(selected
            .iter()
            .all(|i| i.status == ContentStatus::Selected));
    }

    #[test]
    fn keyword_extraction_skips_stop_words() {
        let keywords = extract_keywords("The model release that surprised the research teams");
        assert!(keywords.contains(&"model".to_string()));
        assert!(keywords.contains(&"release".to_string()));
        assert!(!keywords.contains(&"that".to_string()));
    }
}
