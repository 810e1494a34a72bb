//! HTTP surface of the helpdesk.

mod auth;
mod draft;
mod ticket;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::request,
    routing::{get, post},
    RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{api, config, db, suggest};

pub use self::{auth::AuthError, draft::sweep_idle_drafts};

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/register", post(auth::register))
        .route("/auth", post(auth::auth))
        .route("/user", get(auth::get_user))
        .route("/staff", get(auth::list_staff))
        .route("/ticket", get(ticket::list_tickets).post(ticket::add_ticket))
        .route(
            "/ticket/:id",
            get(ticket::get_ticket).patch(ticket::edit_ticket),
        )
        .route(
            "/ticket/:id/replies",
            get(ticket::list_replies).post(ticket::add_reply),
        )
        .route("/draft", post(draft::open_draft))
        .route(
            "/draft/:id",
            get(draft::get_draft)
                .put(draft::commit_draft)
                .delete(draft::discard_draft),
        )
        .route("/suggest", post(draft::suggest))
        .with_state(state)
}

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    db_client: db::Client,

    suggest_client: Arc<dyn suggest::Client>,

    suggest_timeout: Duration,

    draft_ttl: Duration,

    drafts: Mutex<HashMap<api::draft::Id, draft::OpenDraft>>,

    jwt_expiration_time: Duration,

    jwt_decoding_key: DecodingKey,

    jwt_encoding_key: EncodingKey,
}

impl AppState {
    pub fn new(
        db_client: db::Client,
        suggest_client: Arc<dyn suggest::Client>,
        suggest: &config::Suggest,
        jwt: &config::Jwt,
    ) -> Self {
        Self {
            db_client,
            suggest_client,
            suggest_timeout: suggest.timeout,
            draft_ttl: suggest.draft_ttl,
            drafts: Mutex::default(),
            jwt_expiration_time: jwt.expiration_time,
            jwt_decoding_key: DecodingKey::from_secret(jwt.secret.as_bytes()),
            jwt_encoding_key: EncodingKey::from_secret(jwt.secret.as_bytes()),
        }
    }

    fn drafts(
        &self,
    ) -> MutexGuard<'_, HashMap<api::draft::Id, draft::OpenDraft>> {
        self.drafts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Identity of the caller, issued by `POST /auth`.
///
/// Every protected handler takes it as an argument, so a request without a
/// valid bearer token is rejected with `401 Unauthorized`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Session {
    user_id: api::user::Id,
    role: api::user::Role,
    exp: i64,
}

impl Session {
    /// Tickets the caller may see: users see their own, staff see the ones
    /// assigned to them, admins see everything.
    fn filter(&self, search: Option<String>) -> db::ticket::Filter {
        use api::user::Role;

        let mut filter = db::ticket::Filter {
            search,
            ..db::ticket::Filter::default()
        };
        match self.role {
            Role::User => filter.author = Some(self.user_id),
            Role::Staff => filter.assignee = Some(self.user_id),
            Role::Admin => {}
        }
        filter
    }

    fn can_see(&self, ticket: &db::Ticket) -> bool {
        self.filter(None).matches(ticket)
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for Session {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::InvalidToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use crate::{
        api::user::{Id, Role},
        db::{
            self,
            ticket::{Category, Priority, Status},
        },
    };

    use super::Session;

    fn session(user: u128, role: Role) -> Session {
        Session {
            user_id: Id::from(user),
            role,
            exp: 0,
        }
    }

    fn ticket(author: u128, assignee: Option<u128>) -> db::Ticket {
        db::Ticket {
            id: db::ticket::Id::from(1),
            subject: "Printer on fire".to_owned(),
            description: "The office printer is emitting smoke again".to_owned(),
            category: Category::TechnicalSupport,
            priority: Priority::Urgent,
            status: Status::Open,
            author: Id::from(author),
            assignee: assignee.map(Id::from),
            replies: 0,
            last_updated: datetime!(2024-07-21 08:20 UTC),
        }
    }

    #[test]
    fn users_see_own_tickets() {
        let alex = session(1, Role::User);
        assert!(alex.can_see(&ticket(1, None)));
        assert!(!alex.can_see(&ticket(2, Some(1))));
    }

    #[test]
    fn staff_see_assigned_tickets() {
        let jane = session(6, Role::Staff);
        assert!(jane.can_see(&ticket(1, Some(6))));
        assert!(!jane.can_see(&ticket(1, Some(7))));
        assert!(!jane.can_see(&ticket(6, None)));
    }

    #[test]
    fn admins_see_everything() {
        let admin = session(8, Role::Admin);
        assert!(admin.can_see(&ticket(1, None)));
        assert!(admin.can_see(&ticket(2, Some(7))));
    }
}
