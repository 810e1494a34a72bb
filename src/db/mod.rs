pub mod memory;
pub mod reply;
pub mod seed;
pub mod ticket;
pub mod user;

use tokio_postgres::{tls::NoTlsStream, NoTls, Socket};

pub use tokio_postgres::Error;

pub use self::{reply::Reply, ticket::Ticket, user::User};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(url: &str) -> Result<(Client, Connection), Error> {
    tokio_postgres::connect(url, NoTls)
        .await
        .map(|(client, connection)| (Client::Postgres(client), connection))
}

pub enum Client {
    Postgres(tokio_postgres::Client),
    Memory(memory::Store),
}

impl Client {
    pub fn memory() -> Self {
        Self::Memory(memory::Store::default())
    }
}

/// Converts a row count or offset for a `BIGINT` parameter, saturating
/// values the column type cannot hold.
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
