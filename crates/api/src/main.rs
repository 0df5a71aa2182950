use anyhow::Context;

use articlehub_api::{ArticleQuery, ArticleService};
use articlehub_session::{ClientConfig, Route, SessionClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    articlehub_observability::init();

    let config = ClientConfig::from_env();
    let client = SessionClient::new(&config).context("failed to build session client")?;

    let mut navigator = client.navigator(Route::entry());
    for redirect in navigator.pump() {
        tracing::info!(from = %redirect.from, to = %redirect.to, "startup redirect");
    }

    if let (Ok(email), Ok(password)) = (
        std::env::var("ARTICLEHUB_EMAIL"),
        std::env::var("ARTICLEHUB_PASSWORD"),
    ) {
        let user = client
            .login(&email, &password)
            .await
            .context("login failed")?;
        tracing::info!(user = %user.display_name(), role = %user.role, "session established");
        navigator.pump();
    }

    if !client.has_token() {
        tracing::warn!(route = %navigator.current(), "not signed in; set ARTICLEHUB_EMAIL and ARTICLEHUB_PASSWORD");
        return Ok(());
    }

    let articles = ArticleService::new(client.clone());
    let page = articles
        .list(ArticleQuery::default().limit(20))
        .await
        .context("failed to list articles")?;

    tracing::info!(total = page.total_docs, page = page.page, "articles");
    for article in &page.docs {
        tracing::info!(id = %article.id, status = %article.status, title = %article.title, "article");
    }

    Ok(())
}
