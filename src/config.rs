use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    #[serde(default)]
    pub suggest: Suggest,
}

#[derive(Deserialize)]
pub struct Db {
    /// PostgreSQL connection string. Tickets are kept in memory when absent.
    pub url: Option<String>,

    /// Populates an empty store with the demo users and tickets.
    #[serde(default)]
    pub seed: bool,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

#[derive(Deserialize)]
pub struct Suggest {
    /// Upper bound for a single article lookup.
    #[serde(default = "Suggest::default_timeout", with = "humantime_serde")]
    pub timeout: time::Duration,

    /// Maximum number of titles the built-in catalog returns.
    #[serde(default = "Suggest::default_limit")]
    pub limit: usize,

    /// Remote suggestion service. The built-in catalog is used when absent.
    pub url: Option<String>,

    /// Open ticket drafts untouched for this long are dropped.
    #[serde(default = "Suggest::default_draft_ttl", with = "humantime_serde")]
    pub draft_ttl: time::Duration,
}

impl Suggest {
    fn default_timeout() -> time::Duration {
        time::Duration::from_secs(5)
    }

    fn default_limit() -> usize {
        3
    }

    fn default_draft_ttl() -> time::Duration {
        time::Duration::from_secs(30 * 60)
    }
}

impl Default for Suggest {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            limit: Self::default_limit(),
            url: None,
            draft_ttl: Self::default_draft_ttl(),
        }
    }
}
