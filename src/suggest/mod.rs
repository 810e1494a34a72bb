//! Knowledge-base article suggestions for tickets being drafted.

pub mod catalog;
pub mod remote;

use std::{error::Error as StdError, time::Duration};

use async_trait::async_trait;
use derive_more::{Display, From};

pub use self::{catalog::Catalog, remote::Remote};

/// Failed article lookup. Callers treat it as "no suggestions".
#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    #[display("suggestion request failed: {_0}")]
    Request(reqwest::Error),

    #[display("suggestion service responded with {_0}")]
    Status(reqwest::StatusCode),

    #[display("suggestion lookup timed out after {_0:?}")]
    TimedOut(Duration),
}

impl StdError for Error {}

/// Maps ticket text to an ordered list of article titles, best match first.
#[async_trait]
pub trait Client: Send + Sync {
    async fn suggest(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<Vec<String>, Error>;
}
