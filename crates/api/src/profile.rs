//! The signed-in user's own profile.

use articlehub_auth::{UpdatePassword, UpdateProfile, User};
use articlehub_session::{ApiRequest, SessionClient};

use crate::articles::to_body;
use crate::authz::require;
use crate::error::ServiceResult;

#[derive(Debug, Clone)]
pub struct ProfileService {
    client: SessionClient,
}

impl ProfileService {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> ServiceResult<User> {
        require(&self.client, None)?;
        Ok(self.client.fetch(ApiRequest::get("/profile")).await?)
    }

    pub async fn update(&self, changes: &UpdateProfile) -> ServiceResult<User> {
        require(&self.client, None)?;
        let request = ApiRequest::put("/profile-update", to_body(changes)?);
        Ok(self.client.fetch(request).await?)
    }

    pub async fn update_password(&self, change: &UpdatePassword) -> ServiceResult<()> {
        change.validate()?;
        require(&self.client, None)?;
        self.client
            .execute(ApiRequest::put("/profile-password-update", to_body(change)?))
            .await?;
        tracing::info!("password changed");
        Ok(())
    }
}
