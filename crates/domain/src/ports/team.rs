use crate::DomainResult;
use crate::team::{MemberProjection, TeamMemberIdentity};

pub trait TeamDirectory: Send + Sync {
    fn list_members(
        &self,
        team_id: &str,
        projection: MemberProjection,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<TeamMemberIdentity>>>;
}
