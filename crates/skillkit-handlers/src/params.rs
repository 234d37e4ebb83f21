//! Parameter extraction from free-form queries, and file-name helpers.

use regex::Regex;
use std::sync::LazyLock;

static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+ideas?\b").expect("valid regex"));
static VERB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(generate|brainstorm|give me|create|come up with|i need)\b")
        .expect("valid regex")
});
static COUNT_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+\s+ideas?\b(\s+(for|about|on)\b)?").expect("valid regex")
});

/// Idea-generation parameters read from a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdeaParams {
    pub topic: String,
    pub num_ideas: u8,
}

/// Pull the idea count and topic out of a request such as
/// "Give me 3 ideas for a coffee shop".
///
/// The count is taken from "N idea(s)" when 1 <= N <= 10, otherwise
/// `default_count`. The topic is the query with request verbs and the count
/// phrase removed, or the whole query when nothing is left.
pub fn extract_idea_params(query: &str, default_count: u8) -> IdeaParams {
    let num_ideas = COUNT_RE
        .captures(query)
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|n| (1..=10).contains(n))
        .map(|n| n as u8)
        .unwrap_or(default_count);

    let topic = VERB_RE.replace_all(query, "");
    let topic = COUNT_PHRASE_RE.replace_all(&topic, "");
    let topic = topic.split_whitespace().collect::<Vec<_>>().join(" ");
    let topic = topic.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());

    IdeaParams {
        topic: if topic.is_empty() { query.trim().to_string() } else { topic.to_string() },
        num_ideas,
    }
}

/// File-name-safe stem: keeps alphanumerics, spaces and underscores, turns
/// spaces into underscores, and caps the length at 50 characters.
pub fn safe_stem(s: &str) -> String {
    let kept: String = s
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    kept.trim().replace(' ', "_").chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_topic() {
        let p = extract_idea_params("Give me 3 ideas for a sustainable coffee shop", 5);
        assert_eq!(p.num_ideas, 3);
        assert_eq!(p.topic, "a sustainable coffee shop");
    }

    #[test]
    fn test_count_out_of_range_uses_default() {
        assert_eq!(extract_idea_params("generate 25 ideas about drones", 5).num_ideas, 5);
        assert_eq!(extract_idea_params("generate 0 ideas about drones", 4).num_ideas, 4);
    }

    #[test]
    fn test_singular_idea() {
        let p = extract_idea_params("I need 1 idea on team offsites", 5);
        assert_eq!(p.num_ideas, 1);
        assert_eq!(p.topic, "team offsites");
    }

    #[test]
    fn test_verbs_inside_words_survive() {
        let p = extract_idea_params("Brainstorm creative names for a bakery", 5);
        assert_eq!(p.topic, "creative names for a bakery");
        assert_eq!(p.num_ideas, 5);
    }

    #[test]
    fn test_falls_back_to_full_query() {
        let p = extract_idea_params("  brainstorm  ", 5);
        assert_eq!(p.topic, "brainstorm");
    }

    #[test]
    fn test_safe_stem_rules() {
        assert_eq!(safe_stem("Team Meeting - Q4/Planning!"), "Team_Meeting__Q4Planning");
        assert_eq!(safe_stem(&"x".repeat(80)).len(), 50);
        assert_eq!(safe_stem("café menu"), "café_menu");
    }
}
