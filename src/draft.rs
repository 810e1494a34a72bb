//! Article suggestions for a ticket form that is being filled in.
//!
//! A [`Draft`] holds the last committed subject and description of one form.
//! Every change of that pair supersedes the previous lookup: the in-flight
//! task is aborted and its generation retired, so only the result of the
//! most recent lookup can ever reach the [`Presentation`].

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::AbortHandle, time};
use uuid::Uuid;

use crate::suggest;

/// Subjects shorter than this never trigger a lookup.
pub const MIN_SUBJECT_CHARS: usize = 5;

/// Descriptions shorter than this never trigger a lookup.
pub const MIN_DESCRIPTION_CHARS: usize = 20;

/// Whether the pair carries enough text to look articles up.
pub fn qualifies(subject: &str, description: &str) -> bool {
    subject.chars().count() >= MIN_SUBJECT_CHARS
        && description.chars().count() >= MIN_DESCRIPTION_CHARS
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// What the suggestion panel of the form shows.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(content = "articles", rename_all = "camelCase", tag = "state")]
pub enum Presentation {
    /// Nothing typed yet.
    #[default]
    Idle,

    /// A lookup for the current text is running.
    Pending,

    /// Titles found for the current text, best match first.
    Ready(Vec<String>),

    /// Not enough text, nothing found, or the lookup failed.
    Empty,
}

impl Presentation {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Latest committed values of the subject and description fields.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Accumulator {
    subject: String,
    description: String,
}

impl Accumulator {
    /// Takes the pair when both fields are filled in. Returns whether the
    /// held pair changed.
    pub fn commit(&mut self, subject: &str, description: &str) -> bool {
        if subject.is_empty() || description.is_empty() {
            return false;
        }
        if self.subject == subject && self.description == description {
            return false;
        }
        subject.clone_into(&mut self.subject);
        description.clone_into(&mut self.description);
        true
    }

    pub fn clear(&mut self) {
        self.subject.clear();
        self.description.clear();
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Tag of a lookup. Only the latest one may publish its result.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

struct Trigger {
    accumulator: Accumulator,
    generation: Generation,
    in_flight: Option<AbortHandle>,
}

impl Trigger {
    /// Retires the current generation and aborts its lookup, if any.
    fn supersede(&mut self) -> Generation {
        if let Some(lookup) = self.in_flight.take() {
            lookup.abort();
        }
        self.generation = self.generation.next();
        self.generation
    }
}

struct Shared {
    trigger: Mutex<Trigger>,
    presentation: watch::Sender<Presentation>,
}

impl Shared {
    fn trigger(&self) -> MutexGuard<'_, Trigger> {
        self.trigger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the outcome of the lookup tagged with `generation`. Returns
    /// `false` when a later commit has superseded it.
    fn resolve(
        &self,
        generation: Generation,
        outcome: Result<Vec<String>, suggest::Error>,
    ) -> bool {
        let mut trigger = self.trigger();
        if trigger.generation != generation {
            tracing::debug!(?generation, "discarding superseded suggestions");
            return false;
        }
        trigger.in_flight = None;

        let presentation = match outcome {
            Ok(articles) if articles.is_empty() => Presentation::Empty,
            Ok(articles) => Presentation::Ready(articles),
            Err(e) => {
                tracing::warn!(error = %e, "suggestion lookup failed");
                Presentation::Empty
            }
        };
        self.presentation.send_replace(presentation);
        true
    }
}

/// Suggestion state of one ticket form.
///
/// Must be used from within a tokio runtime: lookups run on spawned tasks.
pub struct Draft {
    shared: Arc<Shared>,
    client: Arc<dyn suggest::Client>,
    timeout: Duration,
}

impl Draft {
    pub fn new(client: Arc<dyn suggest::Client>, timeout: Duration) -> Self {
        let (presentation, _) = watch::channel(Presentation::Idle);
        Self {
            shared: Arc::new(Shared {
                trigger: Mutex::new(Trigger {
                    accumulator: Accumulator::default(),
                    generation: Generation::default(),
                    in_flight: None,
                }),
                presentation,
            }),
            client,
            timeout,
        }
    }

    /// Commits the field values, as happens when a field loses focus.
    ///
    /// A changed pair long enough to qualify starts a lookup and the draft
    /// turns [`Presentation::Pending`] before this returns. A changed pair
    /// that is too short turns it [`Presentation::Empty`].
    pub fn commit(&self, subject: &str, description: &str) -> Presentation {
        let mut trigger = self.shared.trigger();
        if !trigger.accumulator.commit(subject, description) {
            return self.presentation();
        }

        let generation = trigger.supersede();
        let subject = trigger.accumulator.subject().to_owned();
        let description = trigger.accumulator.description().to_owned();
        if !qualifies(&subject, &description) {
            return self.publish(Presentation::Empty);
        }

        let shared = Arc::clone(&self.shared);
        let client = Arc::clone(&self.client);
        let timeout = self.timeout;
        let lookup = tokio::spawn(async move {
            let outcome = time::timeout(
                timeout,
                client.suggest(&subject, &description),
            )
            .await
            .unwrap_or(Err(suggest::Error::TimedOut(timeout)));
            shared.resolve(generation, outcome);
        });
        trigger.in_flight = Some(lookup.abort_handle());

        self.publish(Presentation::Pending)
    }

    /// Forgets the field values, as happens when both fields are emptied.
    pub fn clear(&self) -> Presentation {
        let mut trigger = self.shared.trigger();
        trigger.accumulator.clear();
        trigger.supersede();
        self.publish(Presentation::Idle)
    }

    pub fn presentation(&self) -> Presentation {
        self.shared.presentation.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Presentation> {
        self.shared.presentation.subscribe()
    }

    /// Waits until no lookup is pending and returns the presentation.
    pub async fn settled(&self) -> Presentation {
        let mut presentation = self.subscribe();
        let settled = match presentation.wait_for(|p| !p.is_pending()).await {
            Ok(settled) => settled.clone(),
            Err(_) => self.presentation(),
        };
        settled
    }

    fn publish(&self, presentation: Presentation) -> Presentation {
        self.shared.presentation.send_replace(presentation.clone());
        presentation
    }
}

impl Drop for Draft {
    fn drop(&mut self) {
        if let Some(lookup) = self.shared.trigger().in_flight.take() {
            lookup.abort();
        }
    }
}
