//! `@mention` extraction and resolution against a team's aliases.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::team::TeamMemberIdentity;

const MIN_TOKEN_ALIAS_CHARS: usize = 2;
const FALLBACK_ALIAS_CHARS: usize = 8;

/// One key that matched exactly one team member.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedMention {
    pub key: String,
    pub user_id: String,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn starts_mention(previous: Option<char>) -> bool {
    previous.is_none_or(|c| c.is_whitespace() || c == '(')
}

fn ends_mention(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            ',' | ';' | ':' | '!' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>'
        )
}

/// Normalized keys following `@`, in first-seen order without duplicates.
///
/// An `@` only opens a mention at the start of the text or after whitespace or
/// `(`, so email addresses inside prose are not picked up.
pub fn extract_mention_keys(text: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut seen = HashSet::new();
    let mut previous = None;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if c == '@' && starts_mention(previous) {
            let start = index + c.len_utf8();
            let mut end = start;
            while let Some(&(next_index, next)) = chars.peek() {
                if ends_mention(next) {
                    break;
                }
                end = next_index + next.len_utf8();
                chars.next();
            }
            let key = normalize(&text[start..end]);
            if !key.is_empty() && seen.insert(key.clone()) {
                keys.push(key);
            }
            previous = text[..end].chars().next_back();
            continue;
        }
        previous = Some(c);
    }

    keys
}

/// Label with whitespace runs joined by `.` and everything outside
/// letters, digits, `.`, `_` and `-` stripped. Falls back to the first eight
/// characters of the user id when nothing survives.
pub fn sanitized_alias(label: &str, user_id: &str) -> String {
    let dotted = label.split_whitespace().collect::<Vec<_>>().join(".");
    let sanitized: String = dotted
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if sanitized.is_empty() {
        user_id.chars().take(FALLBACK_ALIAS_CHARS).collect()
    } else {
        sanitized
    }
}

/// Every normalized alias a teammate might type after `@` for `member`.
pub fn member_aliases(member: &TeamMemberIdentity) -> Vec<String> {
    let label = member.label().trim();
    let mut candidates = vec![
        member.user_id.clone(),
        label.to_string(),
        sanitized_alias(label, &member.user_id),
    ];
    if let Some(local_part) = member.email_local_part() {
        candidates.push(local_part.to_string());
    }
    let words: Vec<&str> = label.split_whitespace().collect();
    candidates.push(words.concat());
    candidates.push(words.join("."));
    candidates.push(words.join("_"));
    candidates.extend(
        words
            .iter()
            .filter(|word| word.chars().count() >= MIN_TOKEN_ALIAS_CHARS)
            .map(|word| word.to_string()),
    );

    let mut seen = HashSet::new();
    candidates
        .iter()
        .map(|alias| normalize(alias))
        .filter(|alias| !alias.is_empty())
        .filter(|alias| seen.insert(alias.clone()))
        .collect()
}

/// Alias to candidate user ids for one team, rebuilt per resolution.
#[derive(Clone, Debug, Default)]
pub struct AliasIndex {
    entries: HashMap<String, BTreeSet<String>>,
}

impl AliasIndex {
    pub fn build(members: &[TeamMemberIdentity]) -> Self {
        let mut entries: HashMap<String, BTreeSet<String>> = HashMap::new();
        for member in members {
            if member.user_id.trim().is_empty() {
                continue;
            }
            for alias in member_aliases(member) {
                entries
                    .entry(alias)
                    .or_default()
                    .insert(member.user_id.clone());
            }
        }
        Self { entries }
    }

    pub fn candidates(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys with exactly one candidate. Unknown and ambiguous keys are dropped.
    pub fn resolve(&self, keys: &[String]) -> Vec<ResolvedMention> {
        keys.iter()
            .filter_map(|key| {
                let candidates = self.candidates(key)?;
                if candidates.len() != 1 {
                    tracing::debug!(key, candidates = candidates.len(), "ambiguous mention dropped");
                    return None;
                }
                let user_id = candidates.iter().next()?;
                Some(ResolvedMention {
                    key: key.clone(),
                    user_id: user_id.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_mentions() {
        assert!(extract_mention_keys("").is_empty());
        assert!(extract_mention_keys("   ").is_empty());
        assert!(extract_mention_keys("@").is_empty());
    }

    #[test]
    fn mentions_start_after_whitespace_or_parenthesis() {
        assert_eq!(extract_mention_keys("hi @Alice"), vec!["alice"]);
        assert_eq!(extract_mention_keys("(@alice)"), vec!["alice"]);
        assert_eq!(extract_mention_keys("@alice, thanks"), vec!["alice"]);
        assert!(extract_mention_keys("mail bob@example.com").is_empty());
    }

    #[test]
    fn mentions_stop_at_punctuation_and_dedupe() {
        assert_eq!(
            extract_mention_keys("@jane.doe: see @Bob! and @JANE.DOE?"),
            vec!["jane.doe", "bob"]
        );
        assert_eq!(extract_mention_keys("@ana\u{00a0}later"), vec!["ana"]);
        assert_eq!(extract_mention_keys("ping @joão<br>"), vec!["joão"]);
    }

    #[test]
    fn consecutive_mentions_need_a_separator() {
        assert_eq!(extract_mention_keys("@a@b @c"), vec!["a@b", "c"]);
    }

    #[test]
    fn aliases_cover_name_variants_and_tokens() {
        let member = TeamMemberIdentity::new("7f3c2a9e-0000-4000-8000-000000000001")
            .with_full_name("Jane  Doe")
            .with_email("JD@example.com");
        let aliases = member_aliases(&member);

        for expected in [
            "7f3c2a9e-0000-4000-8000-000000000001",
            "jane  doe",
            "jane.doe",
            "jd",
            "janedoe",
            "jane_doe",
            "jane",
            "doe",
        ] {
            assert!(aliases.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn sanitized_alias_keeps_unicode_letters() {
        assert_eq!(sanitized_alias("José  Silva", "u"), "José.Silva");
        assert_eq!(sanitized_alias("李小龍", "abcdef123456"), "李小龍");
        assert_eq!(sanitized_alias("O'Brien (ops)", "u"), "OBrien.ops");
    }

    #[test]
    fn sanitized_alias_falls_back_to_user_id_prefix() {
        assert_eq!(sanitized_alias("!!! ???", "abcdef123456"), "abcdef12");
    }

    #[test]
    fn accented_names_resolve_through_their_alias() {
        let member = TeamMemberIdentity::new("u-jose").with_full_name("José Silva");
        let index = AliasIndex::build(std::slice::from_ref(&member));
        let resolved = index.resolve(&extract_mention_keys("obrigado @josé.silva"));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].user_id, "u-jose");
    }

    #[test]
    fn single_letter_tokens_are_not_aliases() {
        let member = TeamMemberIdentity::new("u-1").with_full_name("J R Tolkien");
        let aliases = member_aliases(&member);
        assert!(!aliases.contains(&"j".to_string()));
        assert!(aliases.contains(&"tolkien".to_string()));
    }

    #[test]
    fn ambiguous_keys_are_dropped() {
        let members = vec![
            TeamMemberIdentity::new("u-1").with_full_name("Jane Doe"),
            TeamMemberIdentity::new("u-2").with_full_name("Jane Smith"),
        ];
        let index = AliasIndex::build(&members);
        let keys = extract_mention_keys("@jane and @jane.doe");

        let resolved = index.resolve(&keys);
        assert_eq!(
            resolved,
            vec![ResolvedMention {
                key: "jane.doe".into(),
                user_id: "u-1".into(),
            }]
        );
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let index = AliasIndex::build(&[TeamMemberIdentity::new("u-1").with_full_name("Bob")]);
        assert!(index.resolve(&["carol".to_string()]).is_empty());
        assert_eq!(index.resolve(&["bob".to_string()]).len(), 1);
    }
}
