//! HTTP adapters for image prefetching.
//!
//! [`HttpPageSource`] lets the server read its own rendered pages from the
//! configured origin; [`HttpPrefetchClient`] is the client half that talks to
//! a running storefront.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::{
    application::repos::RepoError,
    prefetch::{PageSource, PrefetchClient, PrefetchError, PrefetchImage},
};

use super::error::InfraError;

const PREFETCH_IMAGES_PATH: &str = "/api/prefetch-images";

fn user_agent() -> &'static str {
    concat!("storefront/", env!("CARGO_PKG_VERSION"))
}

fn build_client(timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .build()
        .map_err(|err| InfraError::upstream(err.to_string()))
}

fn parse_base(raw: &str) -> Result<Url, InfraError> {
    Url::parse(raw)
        .and_then(|url| url.join("/"))
        .map_err(|err| InfraError::configuration(format!("invalid origin url `{raw}`: {err}")))
}

#[derive(Clone, Debug)]
pub struct HttpPageSource {
    client: Client,
    origin: Url,
}

impl HttpPageSource {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client(timeout)?,
            origin: parse_base(origin)?,
        })
    }

    /// The origin with only its path replaced; scheme, host and port never
    /// come from `path`.
    fn page_url(&self, path: &str) -> Result<Url, RepoError> {
        let invalid = || RepoError::InvalidInput {
            message: format!("invalid page path `{path}`"),
        };
        if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
            return Err(invalid());
        }

        let mut url = self.origin.clone();
        url.set_path(path);
        if url.origin() != self.origin.origin() {
            return Err(invalid());
        }
        Ok(url)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_html(&self, path: &str) -> Result<String, RepoError> {
        let url = self.page_url(path)?;

        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RepoError::NotFound);
        }
        if !status.is_success() {
            return Err(RepoError::Persistence(format!(
                "page `{path}` answered {status}"
            )));
        }
        response.text().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RepoError {
    if err.is_timeout() {
        RepoError::Timeout
    } else {
        RepoError::from_persistence(err)
    }
}

#[derive(Deserialize)]
struct ImagesBody {
    images: Vec<PrefetchImage>,
}

#[derive(Clone, Debug)]
pub struct HttpPrefetchClient {
    client: Client,
    base: Url,
}

impl HttpPrefetchClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client(timeout)?,
            base: parse_base(base)?,
        })
    }

    /// `/api/prefetch-images{pathname}` for a link target; query and fragment
    /// do not change which images a page renders.
    fn images_url(&self, href: &str) -> Result<Url, PrefetchError> {
        let target = self.base.join(href)?;
        Ok(self
            .base
            .join(&format!("{PREFETCH_IMAGES_PATH}{}", target.path()))?)
    }
}

#[async_trait]
impl PrefetchClient for HttpPrefetchClient {
    async fn list_images(&self, href: &str) -> Result<Vec<PrefetchImage>, PrefetchError> {
        let url = self.images_url(href)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| PrefetchError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrefetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body: ImagesBody = response
            .json()
            .await
            .map_err(|err| PrefetchError::Transport(err.to_string()))?;
        Ok(body.images)
    }

    async fn fetch_image(&self, image: &PrefetchImage) -> Result<(), PrefetchError> {
        let url = self.base.join(&image.src)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| PrefetchError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrefetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map_err(|err| PrefetchError::Transport(err.to_string()))?;
        Ok(())
    }
}
