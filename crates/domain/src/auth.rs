use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Anon,
    Authenticated,
    ServiceRole,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "anon" => Some(Role::Anon),
            "authenticated" => Some(Role::Authenticated),
            "service_role" => Some(Role::ServiceRole),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anon => "anon",
            Role::Authenticated => "authenticated",
            Role::ServiceRole => "service_role",
        }
    }

    pub fn can_comment(&self) -> bool {
        matches!(self, Role::Authenticated | Role::ServiceRole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supabase_roles() {
        assert_eq!(Role::parse("authenticated"), Some(Role::Authenticated));
        assert_eq!(Role::parse("service_role"), Some(Role::ServiceRole));
        assert_eq!(Role::parse("anon"), Some(Role::Anon));
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn anon_cannot_comment() {
        assert!(!Role::Anon.can_comment());
        assert!(Role::Authenticated.can_comment());
    }
}
