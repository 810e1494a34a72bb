use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tokio::time::{self, Instant};

use crate::{api, db, draft::Draft};

use super::{AppState, Session, SharedAppState};

/// Drafts one user may keep open at a time. Opening another one drops the
/// least recently used.
const MAX_OPEN_DRAFTS: usize = 16;

/// A ticket form being filled in, together with the user filling it.
pub struct OpenDraft {
    owner: db::user::Id,
    draft: Arc<Draft>,
    touched: Instant,
}

impl OpenDraft {
    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.touched) >= ttl
    }
}

impl AppState {
    fn find_draft(
        &self,
        session: &Session,
        id: api::draft::Id,
    ) -> Result<Arc<Draft>, DraftError> {
        let now = Instant::now();
        let mut drafts = self.drafts();
        let open = drafts
            .get_mut(&id)
            .filter(|open| open.owner == session.user_id)
            .ok_or(DraftError::DraftNotFound)?;
        if open.is_idle(now, self.draft_ttl) {
            drafts.remove(&id);
            return Err(DraftError::DraftNotFound);
        }
        open.touched = now;
        Ok(Arc::clone(&open.draft))
    }

    /// Drops drafts nobody touched within the configured time. Returns how
    /// many were dropped.
    pub fn evict_idle_drafts(&self) -> usize {
        let now = Instant::now();
        let mut drafts = self.drafts();
        let before = drafts.len();
        drafts.retain(|_, open| !open.is_idle(now, self.draft_ttl));
        before - drafts.len()
    }
}

/// Periodically evicts idle drafts. Runs until the task is dropped.
pub async fn sweep_idle_drafts(state: SharedAppState) {
    let mut interval =
        time::interval(state.draft_ttl.max(Duration::from_secs(1)));
    loop {
        interval.tick().await;
        let evicted = state.evict_idle_drafts();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle ticket drafts");
        }
    }
}

pub async fn open_draft(
    State(state): State<SharedAppState>,
    session: Session,
) -> Json<api::Draft> {
    let id = api::draft::Id::new();
    let draft = Draft::new(
        Arc::clone(&state.suggest_client),
        state.suggest_timeout,
    );
    let suggestions = draft.presentation();

    let mut drafts = state.drafts();
    let owned = drafts
        .iter()
        .filter(|(_, open)| open.owner == session.user_id)
        .map(|(id, open)| (open.touched, *id))
        .collect::<Vec<_>>();
    if owned.len() >= MAX_OPEN_DRAFTS {
        let oldest = owned.into_iter().min_by_key(|(touched, _)| *touched);
        if let Some((_, oldest)) = oldest {
            drafts.remove(&oldest);
        }
    }
    drafts.insert(
        id,
        OpenDraft {
            owner: session.user_id,
            draft: Arc::new(draft),
            touched: Instant::now(),
        },
    );
    drop(drafts);

    tracing::debug!(draft = %id, "opened ticket draft");

    Json(api::Draft { id, suggestions })
}

#[derive(Deserialize)]
pub struct GetDraftInput {
    #[serde(default)]
    settled: bool,
}

/// Current suggestions. With `settled=true` a pending lookup is awaited
/// first.
pub async fn get_draft(
    State(state): State<SharedAppState>,
    session: Session,
    Path(id): Path<api::draft::Id>,
    Query(GetDraftInput { settled }): Query<GetDraftInput>,
) -> Result<Json<api::Draft>, DraftError> {
    let draft = state.find_draft(&session, id)?;
    let suggestions = if settled {
        draft.settled().await
    } else {
        draft.presentation()
    };

    Ok(Json(api::Draft { id, suggestions }))
}

#[derive(Deserialize)]
pub struct CommitDraftInput {
    subject: String,
    description: String,
}

/// Commits the form fields. Emptying both fields resets the suggestions.
pub async fn commit_draft(
    State(state): State<SharedAppState>,
    session: Session,
    Path(id): Path<api::draft::Id>,
    Json(CommitDraftInput {
        subject,
        description,
    }): Json<CommitDraftInput>,
) -> Result<Json<api::Draft>, DraftError> {
    let draft = state.find_draft(&session, id)?;
    let suggestions = if subject.is_empty() && description.is_empty() {
        draft.clear()
    } else {
        draft.commit(&subject, &description)
    };

    Ok(Json(api::Draft { id, suggestions }))
}

pub async fn discard_draft(
    State(state): State<SharedAppState>,
    session: Session,
    Path(id): Path<api::draft::Id>,
) -> Result<StatusCode, DraftError> {
    let mut drafts = state.drafts();
    match drafts.get(&id) {
        Some(open) if open.owner == session.user_id => {
            drafts.remove(&id);
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(DraftError::DraftNotFound),
    }
}

#[derive(Debug)]
pub enum DraftError {
    DraftNotFound,
}

impl IntoResponse for DraftError {
    fn into_response(self) -> Response {
        match self {
            Self::DraftNotFound => StatusCode::NOT_FOUND,
        }
        .into_response()
    }
}

#[derive(Deserialize)]
pub struct SuggestInput {
    subject: String,
    description: String,
}

/// One-shot article lookup. A failed or slow lookup yields no articles.
pub async fn suggest(
    State(state): State<SharedAppState>,
    _: Session,
    Json(SuggestInput {
        subject,
        description,
    }): Json<SuggestInput>,
) -> Json<api::draft::Articles> {
    let articles = match time::timeout(
        state.suggest_timeout,
        state.suggest_client.suggest(&subject, &description),
    )
    .await
    {
        Ok(Ok(articles)) => articles,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "suggestion lookup failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(
                timeout = ?state.suggest_timeout,
                "suggestion lookup timed out"
            );
            Vec::new()
        }
    };

    Json(api::draft::Articles { articles })
}
