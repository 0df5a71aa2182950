//! User administration endpoints. Every call requires `users.manage`; an admin
//! may not delete or re-role their own account.

use serde_json::json;

use articlehub_auth::{
    authorize_account_change, NewUser, Permission, Role, RoleRecord, User, UserUpdate,
};
use articlehub_core::{DomainError, RoleId, UserId};
use articlehub_session::{ApiRequest, Page, SessionClient};

use crate::articles::to_body;
use crate::authz::require;
use crate::error::ServiceResult;

#[derive(Debug, Clone)]
pub struct UserService {
    client: SessionClient,
}

impl UserService {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    fn require_admin(&self) -> ServiceResult<()> {
        require(&self.client, Some(Permission::ManageUsers))
    }

    fn require_other_account(&self, id: &UserId) -> ServiceResult<()> {
        self.require_admin()?;
        let user = self.client.current_user();
        Ok(authorize_account_change(user.as_ref(), id)?)
    }

    pub async fn list(&self, page: u32, limit: u32) -> ServiceResult<Page<User>> {
        self.require_admin()?;
        let path = format!("/admin/users?page={page}&limit={limit}");
        Ok(self.client.fetch(ApiRequest::get(path)).await?)
    }

    pub async fn get(&self, id: &UserId) -> ServiceResult<User> {
        self.require_admin()?;
        Ok(self.client.fetch(ApiRequest::get(format!("/admin/users/{id}"))).await?)
    }

    pub async fn create(&self, user: &NewUser) -> ServiceResult<User> {
        user.validate()?;
        self.require_admin()?;
        let created: User = self
            .client
            .fetch(ApiRequest::post("/admin/users", to_body(user)?))
            .await?;
        tracing::info!(user_id = %created.id, role = %created.role, "user created");
        Ok(created)
    }

    pub async fn update(&self, id: &UserId, changes: &UserUpdate) -> ServiceResult<User> {
        self.require_admin()?;
        let request = ApiRequest::put(format!("/admin/users/{id}"), to_body(changes)?);
        Ok(self.client.fetch(request).await?)
    }

    pub async fn delete(&self, id: &UserId) -> ServiceResult<()> {
        self.require_other_account(id)?;
        self.client
            .execute(ApiRequest::delete(format!("/admin/users/{id}")))
            .await?;
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Change a user's role. Only the four known role codes are accepted.
    pub async fn update_role(&self, id: &UserId, role: &Role) -> ServiceResult<User> {
        if !role.is_known() {
            return Err(DomainError::validation(format!("unknown role '{role}'")).into());
        }
        self.require_other_account(id)?;

        let request = ApiRequest::patch(format!("/users/{id}/role"), json!({ "role": role }));
        let user: User = self.client.fetch(request).await?;
        tracing::info!(user_id = %id, role = %user.role, "user role changed");
        Ok(user)
    }

    /// Resolve a role record id (as some user payloads carry it) to its code
    /// through the backend's role catalogue.
    pub async fn role_for_id(&self, role_id: &RoleId) -> ServiceResult<Role> {
        let roles = self.list_roles().await?;
        roles
            .into_iter()
            .find(|r| r.id == *role_id && r.status)
            .map(|r| r.code)
            .ok_or_else(|| DomainError::validation(format!("role '{role_id}' is not available")).into())
    }

    pub async fn list_roles(&self) -> ServiceResult<Vec<RoleRecord>> {
        self.require_admin()?;
        Ok(self.client.fetch(ApiRequest::get("/roles")).await?)
    }
}
