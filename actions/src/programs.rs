//! Program operations. Same gating shape as channels.

use tracing::warn;

use model::Program;
use store::{ListQuery, NewProgram, Page, ProgramPatch};

use crate::error::{ActionsError, Result};
use crate::Console;

const PROGRAM_FIELDS: &[&str] = &["title", "duration", "description", "video_url"];

impl Console {
    pub async fn create_program(&self, user_id: &str, data: NewProgram) -> Result<Program> {
        let policy = self.policy_for(user_id).await?;
        if !policy.can("create", "Program") {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(self.store().create_program(data).await?)
    }

    pub async fn update_program(
        &self,
        user_id: &str,
        id: &str,
        patch: ProgramPatch,
    ) -> Result<Program> {
        let policy = self.policy_for(user_id).await?;

        let permitted = policy.permitted_fields("update", "Program", PROGRAM_FIELDS);
        let patch = patch.retain_fields(&permitted);
        if patch.touched_fields().is_empty() {
            warn!(user_id, program_id = id, "update payload has no permitted fields");
            return Err(ActionsError::NoPermittedFields);
        }

        let scope = policy.to_filter("Program", "update");
        let rows = self.store().update_program_scoped(id, &patch, &scope).await?;
        if rows == 0 {
            warn!(user_id, program_id = id, "scoped program update matched no rows");
            return Err(ActionsError::PermissionDenied);
        }

        self.store()
            .get_program(id)
            .await?
            .ok_or_else(|| ActionsError::NotFound(id.to_string()))
    }

    pub async fn delete_program(&self, user_id: &str, id: &str) -> Result<()> {
        let policy = self.policy_for(user_id).await?;
        let scope = policy.to_filter("Program", "delete");
        let rows = self.store().delete_program_scoped(id, &scope).await?;
        if rows == 0 {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(())
    }

    pub async fn fetch_programs(
        &self,
        user_id: &str,
        query: &ListQuery,
    ) -> Result<Page<Program>> {
        let policy = self.policy_for(user_id).await?;
        let scope = policy.to_filter("Program", "read");
        Ok(self.store().fetch_programs(&scope, query).await?)
    }

    pub async fn get_program(&self, user_id: &str, id: &str) -> Result<Program> {
        let policy = self.policy_for(user_id).await?;
        let program = self
            .store()
            .get_program(id)
            .await?
            .ok_or_else(|| ActionsError::NotFound(id.to_string()))?;
        if !policy.can_instance("read", &program) {
            return Err(ActionsError::PermissionDenied);
        }
        Ok(program)
    }
}
