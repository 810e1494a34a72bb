use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use futures::{future::OptionFuture, FutureExt as _};
use itertools::Itertools as _;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{api, db, draft};

use super::{AppState, Session, SharedAppState};

/// A ticket or reply refers to a user that does not exist.
#[derive(Debug)]
pub struct MissingUser(pub api::user::Id);

fn is_valid_subject(subject: &str) -> bool {
    subject.chars().count() >= draft::MIN_SUBJECT_CHARS
}

fn is_valid_description(description: &str) -> bool {
    description.chars().count() >= draft::MIN_DESCRIPTION_CHARS
}

/// Resolves the author and the assignee of a single ticket.
async fn expand<E>(
    state: &AppState,
    ticket: db::Ticket,
) -> Result<api::Ticket, E>
where
    E: From<db::Error> + From<MissingUser>,
{
    let author = state
        .db_client
        .get_user_by_id(ticket.author)
        .await?
        .ok_or(MissingUser(ticket.author))?;
    let assignee =
        OptionFuture::from(ticket.assignee.map(|id| async move {
            state
                .db_client
                .get_user_by_id(id)
                .await?
                .ok_or(E::from(MissingUser(id)))
        }))
        .map(Option::transpose)
        .await?;

    Ok(api::Ticket {
        id: ticket.id,
        subject: ticket.subject,
        description: ticket.description,
        category: ticket.category,
        priority: ticket.priority,
        status: ticket.status,
        last_updated: ticket.last_updated,
        replies: ticket.replies,
        author: api::User::from(&author),
        assignee: assignee.as_ref().map(api::User::from),
    })
}

#[derive(Deserialize)]
pub struct ListTicketsInput {
    offset: usize,
    limit: usize,
    search: Option<String>,
}

pub async fn list_tickets(
    State(state): State<SharedAppState>,
    session: Session,
    Query(ListTicketsInput {
        offset,
        limit,
        search,
    }): Query<ListTicketsInput>,
) -> Result<Json<api::ticket::List>, ListTicketsError> {
    use ListTicketsError as E;

    let filter = session.filter(search.filter(|s| !s.trim().is_empty()));

    let page_fut = state.db_client.get_tickets_page(&filter, offset, limit);
    let total_count_fut = state.db_client.get_tickets_count(&filter);
    let (page, total_count) = tokio::try_join!(page_fut, total_count_fut)?;

    let user_ids = page
        .iter()
        .map(|ticket| ticket.author)
        .chain(page.iter().filter_map(|ticket| ticket.assignee))
        .unique()
        .collect::<Vec<_>>();
    let users = state.db_client.get_users_by_ids(&user_ids).await?;

    let tickets = page
        .into_iter()
        .map(|ticket| {
            let author = users
                .get(&ticket.author)
                .ok_or(E::UserNotFound(ticket.author))?;
            let assignee = ticket
                .assignee
                .map(|id| users.get(&id).ok_or(E::UserNotFound(id)))
                .transpose()?;
            Ok::<_, E>(api::Ticket {
                id: ticket.id,
                subject: ticket.subject,
                description: ticket.description,
                category: ticket.category,
                priority: ticket.priority,
                status: ticket.status,
                last_updated: ticket.last_updated,
                replies: ticket.replies,
                author: api::User::from(author),
                assignee: assignee.map(api::User::from),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(api::ticket::List {
        tickets,
        total_count,
    }))
}

#[derive(Debug, From)]
pub enum ListTicketsError {
    #[from]
    DbError(db::Error),
    UserNotFound(api::user::Id),
}

impl IntoResponse for ListTicketsError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
pub struct AddTicketInput {
    subject: String,
    description: String,
    category: api::ticket::Category,
    priority: api::ticket::Priority,
}

pub async fn add_ticket(
    State(state): State<SharedAppState>,
    session: Session,
    Json(AddTicketInput {
        subject,
        description,
        category,
        priority,
    }): Json<AddTicketInput>,
) -> Result<Json<api::Ticket>, AddTicketError> {
    use AddTicketError as E;

    if session.role != db::user::Role::User {
        return Err(E::TicketCannotBeCreated);
    }
    if !is_valid_subject(&subject) {
        return Err(E::InvalidSubject);
    }
    if !is_valid_description(&description) {
        return Err(E::InvalidDescription);
    }

    let ticket = state
        .db_client
        .create_ticket(db::ticket::New {
            subject,
            description,
            category,
            priority,
            author: session.user_id,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;

    tracing::info!(ticket = %ticket.id, "ticket submitted");

    Ok(Json(expand::<E>(&state, ticket).await?))
}

#[derive(Debug, From)]
pub enum AddTicketError {
    #[from]
    DbError(db::Error),
    InvalidDescription,
    InvalidSubject,
    TicketCannotBeCreated,
    #[from]
    UserNotFound(MissingUser),
}

impl IntoResponse for AddTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidDescription
            | Self::InvalidSubject
            | Self::TicketCannotBeCreated => StatusCode::BAD_REQUEST,
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(content = "data", rename_all = "camelCase", tag = "op")]
pub enum EditTicketInput {
    EditSubject { subject: String },
    EditDescription { description: String },
    SetStatus { status: api::ticket::Status },
    SetPriority { priority: api::ticket::Priority },
    Assign { assignee: api::user::Id },
    Unassign,
}

pub async fn edit_ticket(
    State(state): State<SharedAppState>,
    session: Session,
    Path(id): Path<api::ticket::Id>,
    Json(op): Json<EditTicketInput>,
) -> Result<Json<api::Ticket>, EditTicketError> {
    use db::{
        ticket::{Change, Status},
        user::Role,
    };
    use EditTicketError as E;
    use EditTicketInput as Op;

    let ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .filter(|ticket| session.can_see(ticket))
        .ok_or(E::TicketNotFound)?;

    let change = match op {
        Op::EditSubject { subject } => {
            if ticket.status != Status::Open || ticket.author != session.user_id
            {
                return Err(E::TicketCannotBeModified);
            }
            if !is_valid_subject(&subject) {
                return Err(E::InvalidSubject);
            }

            Change::Subject(subject)
        }
        Op::EditDescription { description } => {
            if ticket.status != Status::Open || ticket.author != session.user_id
            {
                return Err(E::TicketCannotBeModified);
            }
            if !is_valid_description(&description) {
                return Err(E::InvalidDescription);
            }

            Change::Description(description)
        }
        Op::SetStatus { status } => {
            if session.role == Role::User {
                return Err(E::TicketCannotBeTriaged);
            }

            Change::Status(status)
        }
        Op::SetPriority { priority } => {
            if session.role == Role::User {
                return Err(E::TicketCannotBeTriaged);
            }

            Change::Priority(priority)
        }
        Op::Assign { assignee } => {
            if session.role != Role::Admin {
                return Err(E::TicketCannotBeAssigned);
            }
            let assignee = state
                .db_client
                .get_user_by_id(assignee)
                .await?
                .filter(|user| user.role == Role::Staff)
                .ok_or(E::TicketCannotBeAssigned)?;

            Change::Assignee(Some(assignee.id))
        }
        Op::Unassign => {
            if session.role != Role::Admin {
                return Err(E::TicketCannotBeAssigned);
            }

            Change::Assignee(None)
        }
    };

    state
        .db_client
        .update_ticket(id, &change, OffsetDateTime::now_utc())
        .await?;
    let ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .ok_or(E::TicketNotFound)?;

    tracing::info!(
        ticket = %ticket.id,
        status = %ticket.status,
        "ticket updated"
    );

    Ok(Json(expand::<E>(&state, ticket).await?))
}

#[derive(Debug, From)]
pub enum EditTicketError {
    #[from]
    DbError(db::Error),
    InvalidDescription,
    InvalidSubject,
    TicketCannotBeAssigned,
    TicketCannotBeModified,
    TicketCannotBeTriaged,
    TicketNotFound,
    #[from]
    UserNotFound(MissingUser),
}

impl IntoResponse for EditTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidDescription
            | Self::InvalidSubject
            | Self::TicketCannotBeAssigned
            | Self::TicketCannotBeModified
            | Self::TicketCannotBeTriaged => StatusCode::BAD_REQUEST,
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

pub async fn get_ticket(
    State(state): State<SharedAppState>,
    session: Session,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<api::Ticket>, GetTicketError> {
    use GetTicketError as E;

    let ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .filter(|ticket| session.can_see(ticket))
        .ok_or(E::TicketNotFound)?;

    Ok(Json(expand::<E>(&state, ticket).await?))
}

#[derive(Debug, From)]
pub enum GetTicketError {
    #[from]
    DbError(db::Error),
    TicketNotFound,
    #[from]
    UserNotFound(MissingUser),
}

impl IntoResponse for GetTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

pub async fn list_replies(
    State(state): State<SharedAppState>,
    session: Session,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<Vec<api::Reply>>, ReplyError> {
    use ReplyError as E;

    state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .filter(|ticket| session.can_see(ticket))
        .ok_or(E::TicketNotFound)?;

    let replies = state.db_client.get_replies_by_ticket(id).await?;
    let author_ids = replies
        .iter()
        .map(|reply| reply.author)
        .unique()
        .collect::<Vec<_>>();
    let authors = state.db_client.get_users_by_ids(&author_ids).await?;

    let replies = replies
        .into_iter()
        .map(|reply| {
            let author = authors
                .get(&reply.author)
                .ok_or(MissingUser(reply.author))?;
            Ok::<_, E>(api::Reply {
                id: reply.id,
                author: api::User::from(author),
                message: reply.message,
                created_at: reply.created_at,
                is_agent: author.role.is_agent(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(replies))
}

#[derive(Deserialize)]
pub struct AddReplyInput {
    message: String,
}

pub async fn add_reply(
    State(state): State<SharedAppState>,
    session: Session,
    Path(id): Path<api::ticket::Id>,
    Json(AddReplyInput { message }): Json<AddReplyInput>,
) -> Result<Json<api::Reply>, ReplyError> {
    use ReplyError as E;

    if message.trim().is_empty() {
        return Err(E::InvalidMessage);
    }

    let ticket = state
        .db_client
        .get_ticket_by_id(id)
        .await?
        .filter(|ticket| session.can_see(ticket))
        .ok_or(E::TicketNotFound)?;
    let my = state
        .db_client
        .get_user_by_id(session.user_id)
        .await?
        .ok_or(MissingUser(session.user_id))?;

    let reply = db::Reply {
        id: db::reply::Id::new(),
        ticket: ticket.id,
        author: my.id,
        message,
        created_at: OffsetDateTime::now_utc(),
    };
    state.db_client.write_reply(&reply).await?;

    state
        .db_client
        .touch_ticket(ticket.id, reply.created_at)
        .await?;

    Ok(Json(api::Reply {
        id: reply.id,
        author: api::User::from(&my),
        message: reply.message,
        created_at: reply.created_at,
        is_agent: my.role.is_agent(),
    }))
}

#[derive(Debug, From)]
pub enum ReplyError {
    #[from]
    DbError(db::Error),
    InvalidMessage,
    TicketNotFound,
    #[from]
    UserNotFound(MissingUser),
}

impl IntoResponse for ReplyError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidMessage => StatusCode::BAD_REQUEST,
            Self::TicketNotFound => StatusCode::NOT_FOUND,
            Self::DbError(_) | Self::UserNotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}
