// src/services/fetcher.rs

//! Network access: the login handshake and page downloads.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::create_async_client;

/// Source of page bodies.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Establish a session before the first page is fetched.
    async fn authenticate(&self) -> Result<()>;

    /// Download `url`. A non-success status is an error.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Login credentials for the forum.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Read credentials from the environment variables named in config.
    pub fn from_env(config: &CrawlerConfig) -> Result<Self> {
        let read = |name: &str| {
            std::env::var(name)
                .map_err(|_| AppError::config(format!("environment variable {name} is not set")))
        };
        Ok(Self {
            username: read(&config.username_env)?,
            password: read(&config.password_env)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Fetcher backed by a cookie-keeping `reqwest` client.
pub struct HttpFetcher {
    client: Client,
    login_url: String,
    credentials: Option<Credentials>,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig, credentials: Option<Credentials>) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            login_url: config.login_url.clone(),
            credentials,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Submit the login form once. The session cookie stays in the client.
    async fn authenticate(&self) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            return Err(AppError::auth("no credentials configured"));
        };

        let form = [
            ("log", credentials.username.as_str()),
            ("pwd", credentials.password.as_str()),
        ];
        let response = self
            .client
            .post(&self.login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::auth(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::auth(format!(
                "login to {} returned {status}",
                self.login_url
            )));
        }
        log::info!("Logged in as {}", credentials.username);
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP status {status}")));
        }
        response.text().await.map_err(|e| AppError::fetch(url, e))
    }
}
