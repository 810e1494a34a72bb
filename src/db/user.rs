use std::{collections::HashMap, error::Error as StdError};

use argon2::{
    password_hash::{
        self, rand_core::OsRng, PasswordHasher as _, PasswordVerifier as _,
        SaltString,
    },
    Argon2,
};
use derive_more::{Display, From};
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use tokio::task;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};
use uuid::Uuid;

use super::Client;

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub avatar_url: String,
    pub role: Role,
    pub login: String,
    pub password_hash: PasswordHash,
}

impl User {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            avatar_url: row.get("avatar_url"),
            login: row.get("login"),
            password_hash: row.get("password_hash"),
            role: row.get("role"),
        }
    }
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

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

/// Access tier of a signed-in user.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, TryFromRepr, PartialEq, Serialize,
)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Submits tickets and follows up on their own ones.
    User = 1,

    /// Works on the tickets assigned to them.
    Staff = 2,

    /// Sees every ticket and distributes work among staff.
    Admin = 3,
}

impl Role {
    /// Whether replies written by this role come from the support side.
    pub fn is_agent(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

impl FromSql<'_> for Role {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let role = Self::try_from(repr).map_err(|_| "invalid role")?;
        Ok(role)
    }
}

impl ToSql for Role {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from((*self) as u8);
        repr.to_sql(ty, out)
    }
}

/// Argon2 hash in PHC string format.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(secret: &str) -> Result<Self, password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| Self(hash.to_string()))
    }

    pub fn verify(&self, secret: &str) -> bool {
        password_hash::PasswordHash::new(&self.0)
            .and_then(|hash| {
                Argon2::default().verify_password(secret.as_bytes(), &hash)
            })
            .is_ok()
    }

    /// [`Self::new`] on the blocking pool, keeping the runtime responsive
    /// while Argon2 runs.
    pub async fn generate(secret: String) -> Result<Self, HashError> {
        Ok(task::spawn_blocking(move || Self::new(&secret)).await??)
    }

    /// [`Self::verify`] on the blocking pool.
    pub async fn check(&self, secret: String) -> Result<bool, HashError> {
        let hash = self.clone();
        Ok(task::spawn_blocking(move || hash.verify(&secret)).await?)
    }
}

#[derive(Debug, Display, From)]
pub enum HashError {
    #[display("failed to hash password: {_0}")]
    Hash(password_hash::Error),
    #[display("password hashing task failed: {_0}")]
    Task(task::JoinError),
}

impl StdError for HashError {}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

/// Logins are e-mail addresses and compare case-insensitively.
pub fn normalize_login(login: &str) -> String {
    login.trim().to_lowercase()
}

impl Client {
    pub async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        let login = normalize_login(login);
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    SELECT id, name, avatar_url, login, password_hash, role \
                    FROM users \
                    WHERE login = $1 \
                    LIMIT 1";
                Ok(client
                    .query_opt(SQL, &[&login])
                    .await?
                    .map(|row| User::from_row(&row)))
            }
            Self::Memory(store) => Ok(store.user_by_login(&login)),
        }
    }

    pub async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    SELECT id, name, avatar_url, login, password_hash, role \
                    FROM users \
                    WHERE id = $1 \
                    LIMIT 1";
                Ok(client
                    .query_opt(SQL, &[&id])
                    .await?
                    .map(|row| User::from_row(&row)))
            }
            Self::Memory(store) => Ok(store.user_by_id(id)),
        }
    }

    pub async fn get_users_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, User>, Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    SELECT id, name, avatar_url, login, password_hash, role \
                    FROM users \
                    WHERE id IN (SELECT unnest($1::UUID[])) \
                    LIMIT $2";

                let limit = super::sql_count(ids.len());

                Ok(client
                    .query(SQL, &[&ids, &limit])
                    .await?
                    .into_iter()
                    .map(|row| {
                        let user = User::from_row(&row);
                        (user.id, user)
                    })
                    .collect())
            }
            Self::Memory(store) => Ok(ids
                .iter()
                .filter_map(|id| store.user_by_id(*id))
                .map(|user| (user.id, user))
                .collect()),
        }
    }

    pub async fn get_users_by_role(
        &self,
        role: Role,
    ) -> Result<Vec<User>, Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    SELECT id, name, avatar_url, login, password_hash, role \
                    FROM users \
                    WHERE role = $1 \
                    ORDER BY name, id";
                Ok(client
                    .query(SQL, &[&role])
                    .await?
                    .iter()
                    .map(User::from_row)
                    .collect())
            }
            Self::Memory(store) => Ok(store.users_by_role(role)),
        }
    }

    pub async fn get_users_count(&self) -> Result<usize, Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "SELECT COUNT(*) FROM users";
                Ok(client
                    .query_one(SQL, &[])
                    .await?
                    .get::<_, i64>(0)
                    .try_into()
                    .unwrap())
            }
            Self::Memory(store) => Ok(store.users_count()),
        }
    }

    /// Inserts a user unless the login is already taken. Returns whether the
    /// user was inserted.
    pub async fn create_user(&self, user: &User) -> Result<bool, Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    INSERT INTO users (id, name, avatar_url, login, \
                                       password_hash, role) \
                    VALUES ($1, $2, $3, $4, $5, $6) \
                    ON CONFLICT (login) DO NOTHING";

                let inserted = client
                    .execute(
                        SQL,
                        &[
                            &user.id,
                            &user.name,
                            &user.avatar_url,
                            &normalize_login(&user.login),
                            &user.password_hash,
                            &user.role,
                        ],
                    )
                    .await?;
                Ok(inserted == 1)
            }
            Self::Memory(store) => Ok(store.create_user(User {
                login: normalize_login(&user.login),
                ..user.clone()
            })),
        }
    }

    pub async fn write_user(&self, user: &User) -> Result<(), Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    INSERT INTO users (id, name, avatar_url, login, \
                                       password_hash, role) \
                    VALUES ($1, $2, $3, $4, $5, $6) \
                    ON CONFLICT (id) DO UPDATE \
                    SET name = EXCLUDED.name, \
                        avatar_url = EXCLUDED.avatar_url, \
                        login = EXCLUDED.login, \
                        password_hash = EXCLUDED.password_hash, \
                        role = EXCLUDED.role";

                client
                    .execute(
                        SQL,
                        &[
                            &user.id,
                            &user.name,
                            &user.avatar_url,
                            &normalize_login(&user.login),
                            &user.password_hash,
                            &user.role,
                        ],
                    )
                    .await
                    .map(drop)
            }
            Self::Memory(store) => {
                store.write_user(User {
                    login: normalize_login(&user.login),
                    ..user.clone()
                });
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::task;

    use crate::db::Client;

    use super::{normalize_login, Id, PasswordHash, Role, User};

    #[test]
    fn verifies_password() {
        let hash = PasswordHash::new("password").unwrap();
        assert!(hash.verify("password"));
        assert!(!hash.verify("Password"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn salts_every_hash() {
        let first = PasswordHash::new("password").unwrap();
        let second = PasswordHash::new("password").unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn hashes_off_the_runtime_thread() {
        let order = Mutex::new(Vec::new());
        tokio::join!(
            async {
                let hash =
                    PasswordHash::generate("password".to_owned()).await.unwrap();
                assert!(hash.check("password".to_owned()).await.unwrap());
                order.lock().unwrap().push("hash");
            },
            async {
                task::yield_now().await;
                order.lock().unwrap().push("tick");
            },
        );
        assert_eq!(order.into_inner().unwrap(), ["tick", "hash"]);
    }

    #[tokio::test]
    async fn creates_user_once_per_login() {
        let client = Client::memory();
        let user = |id: u128, login: &str| User {
            id: Id::from(id),
            name: "Rosa Park".to_owned(),
            avatar_url: String::new(),
            role: Role::User,
            login: login.to_owned(),
            password_hash: PasswordHash::new("password").unwrap(),
        };

        assert!(client.create_user(&user(1, "rosa@mail.com")).await.unwrap());
        assert!(!client.create_user(&user(2, "Rosa@Mail.com")).await.unwrap());
        assert_eq!(client.get_users_count().await.unwrap(), 1);
    }

    #[test]
    fn normalizes_login() {
        assert_eq!(normalize_login("  Admin@Mail.com "), "admin@mail.com");
    }

    #[test]
    fn only_support_roles_are_agents() {
        assert!(!Role::User.is_agent());
        assert!(Role::Staff.is_agent());
        assert!(Role::Admin.is_agent());
    }
}
