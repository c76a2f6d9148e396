use quotedesk_domain::comments::{Comment, NewComment};
use quotedesk_domain::quotes::QuoteRef;
use quotedesk_domain::team::TeamMemberIdentity;
use serde::{Deserialize, Serialize};

pub(crate) const QUOTE_COLUMNS: &str = "id,team_id,number";
const COMMENT_COLUMNS_SCOPED: &str = "id,quote_id,team_id,body,created_by,created_at";
const COMMENT_COLUMNS_UNSCOPED: &str = "id,quote_id,body,created_by,created_at";

pub(crate) fn comment_columns(with_team_id: bool) -> &'static str {
    if with_team_id {
        COMMENT_COLUMNS_SCOPED
    } else {
        COMMENT_COLUMNS_UNSCOPED
    }
}

/// Quote numbers are stored as integers in some deployments and text in others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum QuoteNumber {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRow {
    pub id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub number: Option<QuoteNumber>,
}

impl From<QuoteRow> for QuoteRef {
    fn from(row: QuoteRow) -> Self {
        let number = match row.number {
            Some(QuoteNumber::Int(value)) => Some(value.to_string()),
            Some(QuoteNumber::Text(value)) if !value.trim().is_empty() => Some(value),
            _ => None,
        };
        QuoteRef {
            id: row.id,
            team_id: row.team_id.filter(|team_id| !team_id.trim().is_empty()),
            number,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentRow {
    pub id: String,
    pub quote_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    pub body: String,
    pub created_by: String,
    pub created_at: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            quote_id: row.quote_id,
            team_id: row.team_id,
            body: row.body,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewCommentRow<'a> {
    pub quote_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<&'a str>,
    pub body: &'a str,
    pub created_by: &'a str,
}

impl<'a> From<&'a NewComment> for NewCommentRow<'a> {
    fn from(comment: &'a NewComment) -> Self {
        Self {
            quote_id: &comment.quote_id,
            team_id: comment.team_id.as_deref(),
            body: &comment.body,
            created_by: &comment.created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRow {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<MemberRow> for TeamMemberIdentity {
    fn from(row: MemberRow) -> Self {
        TeamMemberIdentity {
            user_id: row.user_id,
            full_name: row.full_name,
            email: row.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_number_is_normalized_to_text() {
        let row: QuoteRow =
            serde_json::from_str(r#"{"id":"Q1","team_id":"T1","number":1042}"#).expect("row");
        let quote = QuoteRef::from(row);
        assert_eq!(quote.number.as_deref(), Some("1042"));

        let row: QuoteRow =
            serde_json::from_str(r#"{"id":"Q1","team_id":"","number":"EST-7"}"#).expect("row");
        let quote = QuoteRef::from(row);
        assert_eq!(quote.number.as_deref(), Some("EST-7"));
        assert_eq!(quote.team_id, None);
    }

    #[test]
    fn unscoped_insert_omits_team_id() {
        let comment = NewComment {
            quote_id: "Q1".into(),
            team_id: None,
            body: "hi".into(),
            created_by: "u-1".into(),
        };
        let value = serde_json::to_value(NewCommentRow::from(&comment)).expect("serialize");
        assert!(value.get("team_id").is_none());
        assert_eq!(value["quote_id"], "Q1");
    }
}
