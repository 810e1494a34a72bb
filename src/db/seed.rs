//! Demo users, tickets and conversations for a fresh store.

use std::error::Error as StdError;

use derive_more::{Display, From};
use time::macros::datetime;

use super::{
    reply::{self, Reply},
    ticket::{self, Category, Priority, Status, Ticket},
    user::{self, HashError, PasswordHash, Role, User},
    Client,
};

const AVATAR_URL: &str = "https://placehold.co/40x40";

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("failed to write seed data: {_0}")]
    Db(super::Error),
    #[display("failed to hash seed password: {_0}")]
    PasswordHash(HashError),
}

impl StdError for Error {}

struct SeedUser {
    id: u128,
    name: &'static str,
    login: &'static str,
    password: &'static str,
    role: Role,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        id: 1,
        name: "Alex Johnson",
        login: "alex@mail.com",
        password: "password",
        role: Role::User,
    },
    SeedUser {
        id: 2,
        name: "Maria Garcia",
        login: "maria@mail.com",
        password: "password",
        role: Role::User,
    },
    SeedUser {
        id: 3,
        name: "Chen Wei",
        login: "chen@mail.com",
        password: "password",
        role: Role::User,
    },
    SeedUser {
        id: 4,
        name: "Samantha Miller",
        login: "samantha@mail.com",
        password: "password",
        role: Role::User,
    },
    SeedUser {
        id: 5,
        name: "David Lee",
        login: "david@mail.com",
        password: "password",
        role: Role::User,
    },
    SeedUser {
        id: 6,
        name: "Jane Doe",
        login: "jane@mail.com",
        password: "password",
        role: Role::Staff,
    },
    SeedUser {
        id: 7,
        name: "John Smith",
        login: "john@mail.com",
        password: "password",
        role: Role::Staff,
    },
    SeedUser {
        id: 8,
        name: "Admin",
        login: "admin@mail.com",
        password: "12345678",
        role: Role::Admin,
    },
];

fn tickets() -> Vec<Ticket> {
    let ticket = |id: i32,
                  subject: &str,
                  description: &str,
                  category,
                  priority,
                  status,
                  author: u128,
                  assignee: Option<u128>,
                  last_updated| Ticket {
        id: ticket::Id::from(id),
        subject: subject.to_owned(),
        description: description.to_owned(),
        category,
        priority,
        status,
        author: user::Id::from(author),
        assignee: assignee.map(user::Id::from),
        replies: 0,
        last_updated,
    };

    vec![
        ticket(
            8782,
            "Unable to connect to the new database instance",
            "We are trying to connect to the newly provisioned PostgreSQL \
             database but are getting a connection timeout error. The \
             security groups seem to be configured correctly, and the \
             instance is running. We have tried connecting from multiple \
             clients.",
            Category::TechnicalSupport,
            Priority::High,
            Status::Open,
            1,
            None,
            datetime!(2024-07-20 10:00 UTC),
        ),
        ticket(
            8783,
            "Question about the latest invoice",
            "I have a question about a charge on our latest invoice \
             (INV-2024-07-001). There is a line item for \"Data Processing \
             Overage\" that I would like more information about. Can you \
             provide a breakdown of this charge?",
            Category::BillingIssue,
            Priority::Medium,
            Status::InProgress,
            2,
            Some(6),
            datetime!(2024-07-20 14:30 UTC),
        ),
        ticket(
            8784,
            "Feature request: Dark mode for the dashboard",
            "Our team often works late hours, and a dark mode for the main \
             dashboard would be much easier on the eyes. This has become a \
             standard feature in many applications, and we would love to \
             see it implemented here.",
            Category::GeneralInquiry,
            Priority::Low,
            Status::Resolved,
            3,
            Some(6),
            datetime!(2024-07-19 09:00 UTC),
        ),
        ticket(
            8785,
            "API integration failing with 401 error",
            "Our custom API integration has started failing with a 401 \
             Unauthorized error since yesterday. We have double-checked our \
             API keys, and they appear to be correct. No changes were made \
             on our end. Did anything change with the API authentication?",
            Category::TechnicalSupport,
            Priority::Urgent,
            Status::Closed,
            4,
            Some(7),
            datetime!(2024-07-18 17:45 UTC),
        ),
        ticket(
            8786,
            "Password reset link is not working",
            "I requested a password reset, but when I click the link in the \
             email, it takes me to a page that says 'Invalid or expired \
             token'. I have tried this multiple times. I am unable to access \
             my account.",
            Category::TechnicalSupport,
            Priority::High,
            Status::Open,
            5,
            None,
            datetime!(2024-07-21 08:20 UTC),
        ),
    ]
}

fn replies() -> Vec<Reply> {
    let reply =
        |id: u128, ticket: i32, author: u128, message: &str, created_at| {
            Reply {
                id: reply::Id::from(id),
                ticket: ticket::Id::from(ticket),
                author: user::Id::from(author),
                message: message.to_owned(),
                created_at,
            }
        };

    vec![
        reply(
            1,
            8783,
            6,
            "Thanks for reaching out. I am checking the overage with our \
             billing team.",
            datetime!(2024-07-20 12:10 UTC),
        ),
        reply(
            2,
            8783,
            2,
            "Thank you, looking forward to the breakdown.",
            datetime!(2024-07-20 14:30 UTC),
        ),
        reply(
            3,
            8784,
            6,
            "Great suggestion! I have forwarded it to the product team.",
            datetime!(2024-07-17 10:00 UTC),
        ),
        reply(
            4,
            8784,
            3,
            "Thanks! Any idea on the timeline?",
            datetime!(2024-07-17 15:20 UTC),
        ),
        reply(
            5,
            8784,
            6,
            "It is planned for the next release.",
            datetime!(2024-07-18 09:05 UTC),
        ),
        reply(
            6,
            8784,
            3,
            "Perfect, we will wait for it.",
            datetime!(2024-07-18 11:40 UTC),
        ),
        reply(
            7,
            8784,
            6,
            "Dark mode is now available under Settings > Appearance.",
            datetime!(2024-07-19 09:00 UTC),
        ),
        reply(
            8,
            8785,
            7,
            "We rotated the signing keys yesterday. Please regenerate your \
             API key from the dashboard.",
            datetime!(2024-07-18 09:30 UTC),
        ),
        reply(
            9,
            8785,
            4,
            "That fixed it, thank you.",
            datetime!(2024-07-18 16:00 UTC),
        ),
        reply(
            10,
            8785,
            7,
            "Glad to hear it. Closing this ticket.",
            datetime!(2024-07-18 17:45 UTC),
        ),
        reply(
            11,
            8786,
            5,
            "The link still fails after requesting a new one.",
            datetime!(2024-07-21 08:20 UTC),
        ),
    ]
}

/// Writes the demo dataset unless the store already has users. Returns
/// whether anything was written.
pub async fn apply(client: &Client) -> Result<bool, Error> {
    if client.get_users_count().await? > 0 {
        return Ok(false);
    }

    for seed in USERS {
        client
            .write_user(&User {
                id: user::Id::from(seed.id),
                name: seed.name.to_owned(),
                avatar_url: AVATAR_URL.to_owned(),
                role: seed.role,
                login: seed.login.to_owned(),
                password_hash: PasswordHash::generate(seed.password.to_owned())
                    .await?,
            })
            .await?;
    }
    for ticket in tickets() {
        client.write_ticket(&ticket).await?;
    }
    client.realign_ticket_ids().await?;
    for reply in replies() {
        client.write_reply(&reply).await?;
    }

    tracing::info!(users = USERS.len(), "seeded store with demo data");

    Ok(true)
}
