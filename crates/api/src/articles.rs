//! Article endpoints.

use serde_json::json;

use articlehub_auth::{
    authorize_article_delete, authorize_article_edit, can_manage_articles, AuthzError,
    Permission, User,
};
use articlehub_core::{Article, ArticleId, ArticleStatus, CreateArticle, UpdateArticle};
use articlehub_session::{ApiRequest, ClientError, Page, SessionClient};

use crate::authz::require;
use crate::error::{ServiceError, ServiceResult};

/// Pagination and filtering for article listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArticleQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<ArticleStatus>,
}

impl ArticleQuery {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn status(mut self, status: ArticleStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn to_query_string(self) -> String {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(format!("page={page}"));
        }
        if let Some(limit) = self.limit {
            params.push(format!("limit={limit}"));
        }
        if let Some(status) = self.status {
            params.push(format!("status={status}"));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArticleService {
    client: SessionClient,
}

impl ArticleService {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, query: ArticleQuery) -> ServiceResult<Page<Article>> {
        require(&self.client, None)?;
        let path = format!("/articles{}", query.to_query_string());
        Ok(self.client.fetch(ApiRequest::get(path)).await?)
    }

    /// Articles authored by the session user.
    pub async fn my_articles(&self) -> ServiceResult<Vec<Article>> {
        require(&self.client, None)?;
        Ok(self.client.fetch(ApiRequest::get("/articles/my-articles")).await?)
    }

    pub async fn get(&self, id: &ArticleId) -> ServiceResult<Article> {
        require(&self.client, None)?;
        Ok(self.client.fetch(ApiRequest::get(format!("/articles/{id}"))).await?)
    }

    pub async fn create(&self, article: &CreateArticle) -> ServiceResult<Article> {
        article.validate()?;
        require(&self.client, Some(Permission::WriteArticles))?;
        let request = ApiRequest::post("/articles", to_body(article)?);
        let created: Article = self.client.fetch(request).await?;
        tracing::info!(article_id = %created.id, "article created");
        Ok(created)
    }

    pub async fn update(&self, id: &ArticleId, changes: &UpdateArticle) -> ServiceResult<Article> {
        changes.validate()?;
        require(&self.client, Some(Permission::WriteArticles))?;
        self.check_article(id, authorize_article_edit).await?;
        let request = ApiRequest::put(format!("/articles/{id}"), to_body(changes)?);
        Ok(self.client.fetch(request).await?)
    }

    pub async fn delete(&self, id: &ArticleId) -> ServiceResult<()> {
        require(&self.client, None)?;
        self.check_article(id, authorize_article_delete).await?;
        self.client.execute(ApiRequest::delete(format!("/articles/{id}"))).await?;
        tracing::info!(article_id = %id, "article deleted");
        Ok(())
    }

    pub async fn publish(&self, id: &ArticleId) -> ServiceResult<Article> {
        self.transition(id, "publish").await
    }

    pub async fn archive(&self, id: &ArticleId) -> ServiceResult<Article> {
        self.transition(id, "archive").await
    }

    /// Record a share; the backend returns the article with its counter bumped.
    pub async fn share(&self, id: &ArticleId) -> ServiceResult<Article> {
        require(&self.client, None)?;
        let request = ApiRequest::put(format!("/articles/{id}/share"), json!({}));
        Ok(self.client.fetch(request).await?)
    }

    /// Managers pass without a lookup; anyone else is judged against the
    /// article's author, so the article is fetched first.
    async fn check_article(
        &self,
        id: &ArticleId,
        rule: fn(Option<&User>, &Article) -> Result<(), AuthzError>,
    ) -> ServiceResult<()> {
        let user = self.client.current_user();
        if can_manage_articles(user.as_ref()) {
            return Ok(());
        }
        let article = self.get(id).await?;
        Ok(rule(user.as_ref(), &article)?)
    }

    async fn transition(&self, id: &ArticleId, action: &str) -> ServiceResult<Article> {
        require(&self.client, Some(Permission::PublishArticles))?;
        let request = ApiRequest::patch(format!("/articles/{id}/{action}"), json!({}));
        let article: Article = self.client.fetch(request).await?;
        tracing::info!(article_id = %id, status = %article.status, "article status changed");
        Ok(article)
    }
}

pub(crate) fn to_body<T: serde::Serialize>(value: &T) -> ServiceResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| ServiceError::Client(ClientError::Decode(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_only_carries_set_fields() {
        assert_eq!(ArticleQuery::default().to_query_string(), "");
        assert_eq!(
            ArticleQuery::default()
                .page(2)
                .limit(10)
                .status(ArticleStatus::Published)
                .to_query_string(),
            "?page=2&limit=10&status=published"
        );
    }
}
