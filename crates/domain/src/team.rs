use serde::{Deserialize, Serialize};

use crate::util::non_empty;

/// Read-only snapshot of one row of the team membership view.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMemberIdentity {
    pub user_id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl TeamMemberIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            full_name: None,
            email: None,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Text before the `@` of the email, if any.
    pub fn email_local_part(&self) -> Option<&str> {
        let email = non_empty(self.email.as_deref())?;
        non_empty(email.split('@').next())
    }

    /// Display label: full name, else email local part, else the raw user id.
    pub fn label(&self) -> &str {
        non_empty(self.full_name.as_deref())
            .or_else(|| self.email_local_part())
            .unwrap_or(&self.user_id)
    }
}

/// Columns requested from the membership view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberProjection {
    WithEmail,
    NameOnly,
}

impl MemberProjection {
    pub fn from_email_included(include_email: bool) -> Self {
        if include_email {
            MemberProjection::WithEmail
        } else {
            MemberProjection::NameOnly
        }
    }

    pub fn columns(&self) -> &'static str {
        match self {
            MemberProjection::WithEmail => "user_id,full_name,email",
            MemberProjection::NameOnly => "user_id,full_name",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_prefers_full_name_then_email_then_id() {
        let member = TeamMemberIdentity::new("u-1")
            .with_full_name("Jane Doe")
            .with_email("jd@example.com");
        assert_eq!(member.label(), "Jane Doe");

        let member = TeamMemberIdentity::new("u-1")
            .with_full_name("   ")
            .with_email("jd@example.com");
        assert_eq!(member.label(), "jd");

        assert_eq!(TeamMemberIdentity::new("u-1").label(), "u-1");
    }
}
