use std::path::Path;

use anyhow::Context;
use quotedesk_domain::quotes::QuoteRef;
use quotedesk_domain::team::TeamMemberIdentity;
use serde::Deserialize;

use super::memory::{InMemoryQuoteRepository, InMemoryTeamDirectory};

/// Quotes and team members loaded into the in-memory backend for local runs.
#[derive(Debug, Default, Deserialize)]
pub struct MemorySeed {
    #[serde(default)]
    pub quotes: Vec<SeedQuote>,
    #[serde(default)]
    pub members: Vec<SeedMember>,
}

#[derive(Debug, Deserialize)]
pub struct SeedQuote {
    pub id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    /// Users allowed to read the quote.
    #[serde(default)]
    pub viewers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedMember {
    pub team_id: String,
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl MemorySeed {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read memory seed {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse memory seed {}", path.display()))
    }

    pub async fn apply(self, quotes: &InMemoryQuoteRepository, team: &InMemoryTeamDirectory) {
        let quote_count = self.quotes.len();
        let member_count = self.members.len();
        for seed in self.quotes {
            let mut quote = QuoteRef::new(seed.id);
            if let Some(team_id) = seed.team_id {
                quote = quote.with_team(team_id);
            }
            if let Some(number) = seed.number {
                quote = quote.with_number(number);
            }
            quotes.insert(quote, seed.viewers).await;
        }
        for seed in self.members {
            let mut member = TeamMemberIdentity::new(seed.user_id);
            if let Some(full_name) = seed.full_name {
                member = member.with_full_name(full_name);
            }
            if let Some(email) = seed.email {
                member = member.with_email(email);
            }
            team.add_member(&seed.team_id, member).await;
        }
        tracing::info!(quotes = quote_count, members = member_count, "memory backend seeded");
    }
}
