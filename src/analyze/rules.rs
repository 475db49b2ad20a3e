//! Keyword tables: matching primitives and longest-match category detection.
//!
//! Matching is case-insensitive over whitespace-collapsed text. A keyword
//! only matches on ASCII word boundaries, so `ai` hits "AI chips" but not
//! "said"; non-ASCII scripts (CJK) have no word boundaries and match as
//! plain substrings.

use crate::config::CategoryRule;

/// Lowercase + collapse whitespace.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            last_space = false;
        }
    }
    out.trim().to_string()
}

/// `text` and `keyword` must already be normalized.
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    text.match_indices(keyword).any(|(start, m)| {
        let before = text[..start].chars().next_back();
        let after = text[start + m.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

pub fn any_keyword(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| contains_keyword(text, k))
}

/// Category table with keywords pre-normalized, declaration order kept.
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    rules: Vec<(String, Vec<String>)>,
}

/// Winning category and the keyword that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch<'a> {
    pub category: &'a str,
    pub keyword: &'a str,
}

impl KeywordTable {
    pub fn new(rules: &[CategoryRule]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|r| (r.name.clone(), compile_keywords(&r.keywords)))
                .collect(),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }

    /// Longest matched keyword wins; on equal length the earlier-declared
    /// category keeps it. `None` means no rule matched.
    pub fn detect(&self, text: &str) -> Option<CategoryMatch<'_>> {
        let mut best: Option<(CategoryMatch<'_>, usize)> = None;
        for (name, keywords) in &self.rules {
            for kw in keywords {
                if !contains_keyword(text, kw) {
                    continue;
                }
                let len = kw.chars().count();
                if best.as_ref().map_or(true, |(_, l)| len > *l) {
                    best = Some((
                        CategoryMatch {
                            category: name,
                            keyword: kw,
                        },
                        len,
                    ));
                }
            }
        }
        best.map(|(m, _)| m)
    }
}

pub fn compile_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| normalize(k))
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_ascii_words() {
        let t = normalize("He  SAID the AI chip ships");
        assert!(contains_keyword(&t, "ai"));
        assert!(contains_keyword(&t, "ai chip"));
        assert!(!contains_keyword("he said so", "ai"));
        assert!(contains_keyword("美联储加息", "加息"));
        assert!(!contains_keyword("anything", ""));
    }

    #[test]
    fn longest_keyword_wins_over_declaration_order() {
        let ai_first = KeywordTable::new(&[
            CategoryRule::new("AI", &["ai"]),
            CategoryRule::new("Chips", &["semiconductor"]),
        ]);
        let chips_first = KeywordTable::new(&[
            CategoryRule::new("Chips", &["semiconductor"]),
            CategoryRule::new("AI", &["ai"]),
        ]);
        let text = normalize("AI demand lifts semiconductor orders");
        assert_eq!(ai_first.detect(&text).unwrap().category, "Chips");
        assert_eq!(chips_first.detect(&text).unwrap().category, "Chips");
    }

    #[test]
    fn equal_length_tie_goes_to_first_declared() {
        let table = KeywordTable::new(&[
            CategoryRule::new("Crypto", &["btc"]),
            CategoryRule::new("Finance", &["etf"]),
        ]);
        let m = table.detect("etf buys btc").unwrap();
        assert_eq!(m.category, "Crypto");
        assert_eq!(m.keyword, "btc");
        assert!(table.detect("nothing here").is_none());
    }
}
