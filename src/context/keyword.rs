//! Keyword matching for navigation commands
//!
//! Deterministic matcher used when no LLM is configured. Utterance and
//! keywords are normalized (lowercase, accents folded) and keywords must
//! match on whole-word boundaries, so "carta" never triggers "tarjeta".

use regex::Regex;

use super::ConversationContext;

/// Lowercase `text` and fold Spanish accented vowels to their base letter
///
/// `ñ` is left alone: it is a distinct letter, not an accented `n`.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other => other,
        })
        .collect()
}

/// A keyword rule hit against an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch<'a> {
    /// Page the matched command navigates to
    pub target_page: &'a str,
    /// The keyword that matched, as written in the context
    pub keyword: &'a str,
    /// Priority of the matched command
    pub priority: i32,
}

struct CompiledRule {
    pattern: Regex,
    keyword: String,
    target_page: String,
    priority: i32,
}

/// Precompiled whole-word matcher for one context's navigation commands
///
/// Rules are ordered by descending priority at construction, so the first
/// hit is the winner. Commands sharing a priority keep their listed order.
pub struct KeywordMatcher {
    rules: Vec<CompiledRule>,
}

impl KeywordMatcher {
    /// Compile the matcher for `context`
    #[must_use]
    pub fn new(context: &ConversationContext) -> Self {
        let mut commands: Vec<&super::NavigationCommand> =
            context.navigation_commands.iter().collect();
        // stable sort keeps listed order within equal priorities
        commands.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut rules = Vec::new();
        for command in commands {
            for keyword in &command.keywords {
                let folded = normalize(keyword);
                if folded.trim().is_empty() {
                    continue;
                }
                let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&folded)))
                    .expect("escaped keyword is a valid regex");
                rules.push(CompiledRule {
                    pattern,
                    keyword: keyword.clone(),
                    target_page: command.target_page.clone(),
                    priority: command.priority,
                });
            }
        }
        Self { rules }
    }

    /// Match `text` against the rules, returning the highest-priority hit
    #[must_use]
    pub fn match_text(&self, text: &str) -> Option<KeywordMatch<'_>> {
        let folded = normalize(text);
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(&folded))
            .map(|rule| KeywordMatch {
                target_page: &rule.target_page,
                keyword: &rule.keyword,
                priority: rule.priority,
            })
    }

    /// Number of compiled keyword rules
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
