use serde::Serialize;
use std::str::FromStr;
use tracing::debug;

use crate::registry::SkillRegistry;

/// The router's decision for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Selected skill, or `None` when no trigger phrase occurred.
    pub skill: Option<String>,
    pub score: usize,
    /// Trigger phrases of the selected skill found in the query.
    pub matched: Vec<String>,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            skill: None,
            score: 0,
            matched: vec![],
        }
    }

    pub fn is_match(&self) -> bool {
        self.skill.is_some()
    }
}

/// Score of one skill against a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillScore {
    pub skill: String,
    pub score: usize,
    pub matched: Vec<String>,
}

/// How equal positive scores are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// The skill registered first wins.
    #[default]
    Registration,
    /// The skill whose longest matched phrase is longest wins; remaining
    /// ties fall back to registration order.
    LongestTrigger,
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(TieBreak::Registration),
            "longest-trigger" => Ok(TieBreak::LongestTrigger),
            other => Err(format!("unknown tie-break policy '{other}'")),
        }
    }
}

/// Keyword router: scores each skill by how many of its trigger phrases
/// occur (case-insensitively) in the query and selects the best one.
#[derive(Debug, Clone, Default)]
pub struct Router {
    tie_break: TieBreak,
    groups: Option<Vec<String>>,
}

impl Router {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            tie_break,
            groups: None,
        }
    }

    /// Only consider skills a caller in `groups` may use.
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Scores for every eligible skill, in registration order.
    pub fn score_all(&self, query: &str, registry: &SkillRegistry) -> Vec<SkillScore> {
        let query = query.to_lowercase();
        registry
            .list()
            .into_iter()
            .filter(|d| self.groups.as_deref().is_none_or(|g| d.has_access(g)))
            .map(|d| {
                let matched: Vec<String> = d
                    .triggers
                    .iter()
                    .filter(|t| query.contains(t.as_str()))
                    .cloned()
                    .collect();
                SkillScore {
                    skill: d.name.clone(),
                    score: matched.len(),
                    matched,
                }
            })
            .collect()
    }

    /// Pick the best skill for `query`. Deterministic; never mutates the
    /// registry. All-zero scores yield a "no match" result.
    pub fn match_query(&self, query: &str, registry: &SkillRegistry) -> MatchResult {
        let mut best: Option<SkillScore> = None;
        for candidate in self.score_all(query, registry) {
            if candidate.score == 0 {
                continue;
            }
            let better = match &best {
                None => true,
                Some(b) if candidate.score != b.score => candidate.score > b.score,
                Some(b) => match self.tie_break {
                    TieBreak::Registration => false,
                    TieBreak::LongestTrigger => longest(&candidate) > longest(b),
                },
            };
            if better {
                best = Some(candidate);
            }
        }

        let result = match best {
            Some(s) => MatchResult {
                skill: Some(s.skill),
                score: s.score,
                matched: s.matched,
            },
            None => MatchResult::none(),
        };
        debug!(skill = ?result.skill, score = result.score, matched = ?result.matched, "routed query");
        result
    }
}

fn longest(s: &SkillScore) -> usize {
    s.matched.iter().map(|m| m.chars().count()).max().unwrap_or(0)
}

/// Route with the default policy (registration-order tie-break, no group
/// filter).
pub fn match_query(query: &str, registry: &SkillRegistry) -> MatchResult {
    Router::default().match_query(query, registry)
}
