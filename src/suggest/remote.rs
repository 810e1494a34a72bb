use async_trait::async_trait;
use serde::Serialize;

use crate::api;

use super::{Client, Error};

/// Suggestion service reached over HTTP.
///
/// Speaks the same protocol as this server's `POST /suggest`.
pub struct Remote {
    http: reqwest::Client,
    url: reqwest::Url,
}

impl Remote {
    pub fn new(url: reqwest::Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[derive(Serialize)]
struct Query<'a> {
    subject: &'a str,
    description: &'a str,
}

#[async_trait]
impl Client for Remote {
    async fn suggest(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<Vec<String>, Error> {
        let response = self
            .http
            .post(self.url.clone())
            .json(&Query {
                subject,
                description,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status()));
        }
        Ok(response.json::<api::draft::Articles>().await?.articles)
    }
}
