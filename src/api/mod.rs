//! Wire types of the HTTP API.

pub mod draft;
pub mod reply;
pub mod ticket;
pub mod user;

pub use self::{draft::Draft, reply::Reply, ticket::Ticket, user::User};
