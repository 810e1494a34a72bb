use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use jsonwebtoken::{encode, Header};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{api, db};

use super::{Session, SharedAppState};

const AVATAR_URL: &str = "https://placehold.co/40x40";

const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Deserialize)]
pub struct RegisterInput {
    name: String,
    email: String,
    password: String,
}

/// Self-service sign-up. Always grants the user role.
pub async fn register(
    State(state): State<SharedAppState>,
    Json(RegisterInput {
        name,
        email,
        password,
    }): Json<RegisterInput>,
) -> Result<Json<api::User>, RegisterError> {
    use RegisterError as E;

    let name = name.trim();
    let email = db::user::normalize_login(&email);
    if name.is_empty()
        || !email.contains('@')
        || password.chars().count() < MIN_PASSWORD_CHARS
    {
        return Err(E::InvalidInput);
    }

    if state.db_client.get_user_by_login(&email).await?.is_some() {
        return Err(E::LoginTaken);
    }

    let user = db::User {
        id: db::user::Id::new(),
        name: name.to_owned(),
        avatar_url: AVATAR_URL.to_owned(),
        role: db::user::Role::User,
        login: email,
        password_hash: db::user::PasswordHash::generate(password).await?,
    };
    if !state.db_client.create_user(&user).await? {
        return Err(E::LoginTaken);
    }

    tracing::info!(user_id = ?user.id, "registered new user");

    Ok(Json(api::User::from(&user)))
}

#[derive(Debug, From)]
pub enum RegisterError {
    #[from]
    DbError(db::Error),
    #[from]
    HashError(db::user::HashError),
    InvalidInput,
    LoginTaken,
}

impl IntoResponse for RegisterError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::LoginTaken => StatusCode::CONFLICT,
            Self::DbError(_) | Self::HashError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
pub struct AuthInput {
    login: String,
    password: String,
}

pub async fn auth(
    State(state): State<SharedAppState>,
    Json(AuthInput { login, password }): Json<AuthInput>,
) -> Result<String, AuthError> {
    use AuthError as E;

    let user = state.db_client.get_user_by_login(&login).await?;
    let verified = match &user {
        Some(user) => user.password_hash.check(password).await?,
        None => false,
    };
    let user = user.filter(|_| verified).ok_or_else(|| {
        tracing::info!(login = %login, "rejected sign-in attempt");
        E::WrongLoginOrPassword
    })?;

    let expires_at = OffsetDateTime::now_utc() + state.jwt_expiration_time;
    encode(
        &Header::default(),
        &Session {
            user_id: user.id,
            role: user.role,
            exp: expires_at.unix_timestamp(),
        },
        &state.jwt_encoding_key,
    )
    .map_err(|_| E::InvalidToken)
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    DbError(db::Error),
    #[from]
    HashError(db::user::HashError),
    InvalidToken,
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) | Self::HashError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::WrongLoginOrPassword => StatusCode::FORBIDDEN,
        }
        .into_response()
    }
}

pub async fn get_user(
    State(state): State<SharedAppState>,
    session: Session,
) -> Result<Json<api::User>, GetUserError> {
    use GetUserError as E;

    let my = state
        .db_client
        .get_user_by_id(session.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(api::User::from(&my)))
}

#[derive(Debug, From)]
pub enum GetUserError {
    #[from]
    DbError(db::Error),
    UserNotFound,
}

impl IntoResponse for GetUserError {
    fn into_response(self) -> Response {
        match self {
            Self::DbError(_) | Self::UserNotFound => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

/// Staff members a ticket can be assigned to.
pub async fn list_staff(
    State(state): State<SharedAppState>,
    session: Session,
) -> Result<Json<Vec<api::User>>, ListStaffError> {
    use ListStaffError as E;

    if session.role != db::user::Role::Admin {
        return Err(E::StaffCannotBeListed);
    }

    let staff = state
        .db_client
        .get_users_by_role(db::user::Role::Staff)
        .await?;

    Ok(Json(staff.iter().map(api::User::from).collect()))
}

#[derive(Debug, From)]
pub enum ListStaffError {
    #[from]
    DbError(db::Error),
    StaffCannotBeListed,
}

impl IntoResponse for ListStaffError {
    fn into_response(self) -> Response {
        match self {
            Self::StaffCannotBeListed => StatusCode::BAD_REQUEST,
            Self::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}
