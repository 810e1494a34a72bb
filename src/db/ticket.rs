use std::{error::Error as StdError, fmt, str::FromStr};

use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, Row,
};

use super::{user, Client};

#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: Id,
    pub subject: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
    pub author: user::Id,
    pub assignee: Option<user::Id>,
    pub replies: usize,
    pub last_updated: OffsetDateTime,
}

impl Ticket {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            subject: row.get("subject"),
            description: row.get("description"),
            category: row.get("category"),
            priority: row.get("priority"),
            status: row.get("status"),
            author: row.get("author_id"),
            assignee: row.get("assignee_id"),
            replies: usize::try_from(row.get::<_, i64>("replies")).unwrap(),
            last_updated: row.get("last_updated"),
        }
    }
}

/// Fields of a ticket being submitted. Everything else starts out fixed:
/// the ticket is open, unassigned and has no replies.
#[derive(Clone, Debug)]
pub struct New {
    pub subject: String,
    pub description: String,
    pub category: Category,
    pub priority: Priority,
    pub author: user::Id,
    pub created_at: OffsetDateTime,
}

impl New {
    pub(super) fn into_ticket(self, id: Id) -> Ticket {
        Ticket {
            id,
            subject: self.subject,
            description: self.description,
            category: self.category,
            priority: self.priority,
            status: Status::Open,
            author: self.author,
            assignee: None,
            replies: 0,
            last_updated: self.created_at,
        }
    }
}

/// A single-field edit of a stored ticket.
#[derive(Clone, Debug)]
pub enum Change {
    Subject(String),
    Description(String),
    Status(Status),
    Priority(Priority),
    Assignee(Option<user::Id>),
}

impl Change {
    pub(super) fn apply(&self, ticket: &mut Ticket) {
        match self {
            Self::Subject(subject) => subject.clone_into(&mut ticket.subject),
            Self::Description(description) => {
                description.clone_into(&mut ticket.description)
            }
            Self::Status(status) => ticket.status = *status,
            Self::Priority(priority) => ticket.priority = *priority,
            Self::Assignee(assignee) => ticket.assignee = *assignee,
        }
    }
}

/// Restricts which tickets a listing returns.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub author: Option<user::Id>,
    pub assignee: Option<user::Id>,

    /// Case-insensitive fragment of the subject or the ticket id.
    pub search: Option<String>,
}

impl Filter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self.author.is_some_and(|id| id != ticket.author) {
            return false;
        }
        if self.assignee.is_some() && self.assignee != ticket.assignee {
            return false;
        }
        match &self.search {
            Some(search) => {
                let search = search.to_lowercase();
                ticket.subject.to_lowercase().contains(&search)
                    || ticket.id.to_string().to_lowercase().contains(&search)
            }
            None => true,
        }
    }
}

/// Ticket number, presented as `TICKET-<n>`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Id(i32);

impl Id {
    const PREFIX: &'static str = "TICKET-";

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl From<i32> for Id {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[display("invalid ticket id")]
pub struct ParseIdError;

impl StdError for ParseIdError {}

impl FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(Self::PREFIX)
            .filter(|n| n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse::<i32>().ok())
            .filter(|n| *n > 0)
            .map(Self)
            .ok_or(ParseIdError)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl FromSql<'_> for Id {
    accepts!(INT4);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        i32::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(INT4);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, TryFromRepr, PartialEq,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Submitted and waiting for the support side.
    #[display("Open")]
    Open = 1,

    /// Someone from staff is working on it.
    #[display("In Progress")]
    InProgress = 2,

    /// A fix or an answer was provided.
    #[display("Resolved")]
    Resolved = 3,

    /// No further work will happen.
    #[display("Closed")]
    Closed = 4,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, TryFromRepr, PartialEq,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Priority {
    #[display("Low")]
    Low = 1,
    #[display("Medium")]
    Medium = 2,
    #[display("High")]
    High = 3,
    #[display("Urgent")]
    Urgent = 4,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, TryFromRepr, PartialEq,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Category {
    #[display("Technical Support")]
    TechnicalSupport = 1,
    #[display("Billing Issue")]
    BillingIssue = 2,
    #[display("General Inquiry")]
    GeneralInquiry = 3,
}

macro_rules! int2_enum_sql {
    ($ty:ty, $invalid:literal) => {
        impl FromSql<'_> for $ty {
            accepts!(INT2);

            fn from_sql(
                ty: &Type,
                raw: &[u8],
            ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
                let repr = i16::from_sql(ty, raw)?;
                let repr = u8::try_from(repr)?;
                let value = Self::try_from(repr).map_err(|_| $invalid)?;
                Ok(value)
            }
        }

        impl ToSql for $ty {
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
    };
}

int2_enum_sql!(Status, "invalid status");
int2_enum_sql!(Priority, "invalid priority");
int2_enum_sql!(Category, "invalid category");

const SELECT_TICKETS: &str = "\
    SELECT t.id, t.subject, t.description, t.category, t.priority, \
           t.status, t.author_id, t.assignee_id, t.last_updated, \
           (SELECT COUNT(*) FROM replies r WHERE r.ticket_id = t.id) \
               AS replies \
    FROM tickets t";

const FILTER_TICKETS: &str = "\
    WHERE ($1::UUID IS NULL OR t.author_id = $1) \
      AND ($2::UUID IS NULL OR t.assignee_id = $2) \
      AND ($3::TEXT IS NULL \
           OR strpos(lower(t.subject), lower($3)) > 0 \
           OR strpos(lower('TICKET-' || t.id), lower($3)) > 0)";

impl Client {
    pub async fn get_ticket_by_id(
        &self,
        id: Id,
    ) -> Result<Option<Ticket>, Error> {
        match self {
            Self::Postgres(client) => {
                let sql = format!("{SELECT_TICKETS} WHERE t.id = $1");
                Ok(client
                    .query_opt(&sql, &[&id])
                    .await?
                    .map(|row| Ticket::from_row(&row)))
            }
            Self::Memory(store) => Ok(store.ticket(id)),
        }
    }

    pub async fn create_ticket(&self, new: New) -> Result<Ticket, Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    INSERT INTO tickets (subject, description, category, \
                                         priority, status, author_id, \
                                         assignee_id, last_updated) \
                    VALUES ($1, $2, $3, $4, $5, $6, NULL, $7) \
                    RETURNING id";

                let row = client
                    .query_one(
                        SQL,
                        &[
                            &new.subject,
                            &new.description,
                            &new.category,
                            &new.priority,
                            &Status::Open,
                            &new.author,
                            &new.created_at,
                        ],
                    )
                    .await?;
                Ok(new.into_ticket(row.get("id")))
            }
            Self::Memory(store) => Ok(store.create_ticket(new)),
        }
    }

    /// Stores the ticket under its id. The reply count is derived from the
    /// stored replies and is not written.
    pub async fn write_ticket(&self, ticket: &Ticket) -> Result<(), Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    INSERT INTO tickets (id, subject, description, category, \
                                         priority, status, author_id, \
                                         assignee_id, last_updated) \
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                    ON CONFLICT (id) DO UPDATE \
                    SET subject = EXCLUDED.subject, \
                        description = EXCLUDED.description, \
                        category = EXCLUDED.category, \
                        priority = EXCLUDED.priority, \
                        status = EXCLUDED.status, \
                        author_id = EXCLUDED.author_id, \
                        assignee_id = EXCLUDED.assignee_id, \
                        last_updated = EXCLUDED.last_updated";

                client
                    .execute(
                        SQL,
                        &[
                            &ticket.id,
                            &ticket.subject,
                            &ticket.description,
                            &ticket.category,
                            &ticket.priority,
                            &ticket.status,
                            &ticket.author,
                            &ticket.assignee,
                            &ticket.last_updated,
                        ],
                    )
                    .await
                    .map(drop)
            }
            Self::Memory(store) => {
                store.write_ticket(ticket.clone());
                Ok(())
            }
        }
    }

    /// Changes one field and bumps `last_updated`, leaving the other fields
    /// as they are in the store.
    pub async fn update_ticket(
        &self,
        id: Id,
        change: &Change,
        at: OffsetDateTime,
    ) -> Result<(), Error> {
        match self {
            Self::Postgres(client) => {
                let column = match change {
                    Change::Subject(_) => "subject",
                    Change::Description(_) => "description",
                    Change::Status(_) => "status",
                    Change::Priority(_) => "priority",
                    Change::Assignee(_) => "assignee_id",
                };
                let value: &(dyn ToSql + Sync) = match change {
                    Change::Subject(subject) => subject,
                    Change::Description(description) => description,
                    Change::Status(status) => status,
                    Change::Priority(priority) => priority,
                    Change::Assignee(assignee) => assignee,
                };
                let sql = format!(
                    "UPDATE tickets \
                     SET {column} = $2, last_updated = $3 \
                     WHERE id = $1",
                );
                client.execute(&sql, &[&id, value, &at]).await.map(drop)
            }
            Self::Memory(store) => {
                store.update_ticket(id, at, |ticket| change.apply(ticket));
                Ok(())
            }
        }
    }

    /// Bumps `last_updated` only.
    pub async fn touch_ticket(
        &self,
        id: Id,
        at: OffsetDateTime,
    ) -> Result<(), Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    UPDATE tickets \
                    SET last_updated = $2 \
                    WHERE id = $1";
                client.execute(SQL, &[&id, &at]).await.map(drop)
            }
            Self::Memory(store) => {
                store.update_ticket(id, at, |_| {});
                Ok(())
            }
        }
    }

    /// Moves the id sequence past tickets written with explicit ids.
    pub async fn realign_ticket_ids(&self) -> Result<(), Error> {
        match self {
            Self::Postgres(client) => {
                const SQL: &str = "\
                    SELECT setval(pg_get_serial_sequence('tickets', 'id'), \
                                  COALESCE(MAX(id), 0) + 1, false) \
                    FROM tickets";
                client.execute(SQL, &[]).await.map(drop)
            }
            Self::Memory(_) => Ok(()),
        }
    }

    pub async fn get_tickets_page(
        &self,
        filter: &Filter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error> {
        match self {
            Self::Postgres(client) => {
                let offset = super::sql_count(offset);
                let limit = super::sql_count(limit);

                let sql = format!(
                    "{SELECT_TICKETS} {FILTER_TICKETS} \
                     ORDER BY t.last_updated DESC, \
                              t.id DESC \
                     OFFSET $4 LIMIT $5",
                );
                Ok(client
                    .query(
                        &sql,
                        &[
                            &filter.author,
                            &filter.assignee,
                            &filter.search,
                            &offset,
                            &limit,
                        ],
                    )
                    .await?
                    .iter()
                    .map(Ticket::from_row)
                    .collect())
            }
            Self::Memory(store) => Ok(store.tickets_page(filter, offset, limit)),
        }
    }

    pub async fn get_tickets_count(
        &self,
        filter: &Filter,
    ) -> Result<usize, Error> {
        match self {
            Self::Postgres(client) => {
                let sql = format!("SELECT COUNT(*) FROM tickets t {FILTER_TICKETS}");
                Ok(client
                    .query_one(
                        &sql,
                        &[&filter.author, &filter.assignee, &filter.search],
                    )
                    .await?
                    .get::<_, i64>(0)
                    .try_into()
                    .unwrap())
            }
            Self::Memory(store) => Ok(store.tickets_count(filter)),
        }
    }
}
