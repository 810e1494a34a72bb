use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};
use uuid::Uuid;

use super::{ticket, user, Client};

/// A message in a ticket's conversation.
#[derive(Clone, Debug)]
pub struct Reply {
    pub id: Id,
    pub ticket: ticket::Id,
    pub author: user::Id,
    pub message: String,
    pub created_at: OffsetDateTime,
}

impl Reply {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            ticket: row.get("ticket_id"),
            author: row.get("author_id"),
            message: row.get("message"),
            created_at: row.get("created_at"),
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

impl Client {
    /// Conversation of a ticket, oldest first.
    pub async fn get_replies_by_ticket(
        &self,
        ticket: ticket::Id,
    ) -> Result<Vec<Reply>, Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    SELECT id, ticket_id, author_id, message, created_at \
                    FROM replies \
                    WHERE ticket_id = $1 \
                    ORDER BY created_at, id";
                Ok(client
                    .query(SQL, &[&ticket])
                    .await?
                    .iter()
                    .map(Reply::from_row)
                    .collect())
            }
            Self::Memory(store) => Ok(store.replies(ticket)),
        }
    }

    pub async fn write_reply(&self, reply: &Reply) -> Result<(), Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    INSERT INTO replies (id, ticket_id, author_id, message, \
                                         created_at) \
                    VALUES ($1, $2, $3, $4, $5) \
                    ON CONFLICT (id) DO UPDATE \
                    SET message = EXCLUDED.message";

                client
                    .execute(
                        SQL,
                        &[
                            &reply.id,
                            &reply.ticket,
                            &reply.author,
                            &reply.message,
                            &reply.created_at,
                        ],
                    )
                    .await
                    .map(drop)
            }
            Self::Memory(store) => {
                store.write_reply(reply.clone());
                Ok(())
            }
        }
    }
}
