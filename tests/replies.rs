pub mod common;

use deskflow::api;
use reqwest::StatusCode;

fn id(n: i32) -> api::ticket::Id {
    api::ticket::Id::from(n)
}

#[tokio::test]
async fn lists_replies_oldest_first() {
    let server = common::Server::start().await;
    let samantha = server.sign_in("samantha@mail.com", "password").await;
    let replies = samantha.replies(id(8785)).await.unwrap();
    let authors = replies
        .iter()
        .map(|r| (r.author.name.as_str(), r.is_agent))
        .collect::<Vec<_>>();
    assert_eq!(
        authors,
        [
            ("John Smith", true),
            ("Samantha Miller", false),
            ("John Smith", true),
        ],
    );
    assert!(replies.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[tokio::test]
async fn adds_reply() {
    let server = common::Server::start().await;
    let alex = server.sign_in("alex@mail.com", "password").await;
    let reply = alex
        .add_reply(id(8782), "Still failing from every client we tried.")
        .await
        .unwrap();
    assert_eq!(reply.author.name, "Alex Johnson");
    assert!(!reply.is_agent);

    let ticket = alex.get_ticket(id(8782)).await.unwrap();
    assert_eq!(ticket.replies, 1);
    assert_eq!(ticket.last_updated, reply.created_at);

    let replies = alex.replies(id(8782)).await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id, reply.id);
}

#[tokio::test]
async fn staff_reply_is_marked_as_agent() {
    let server = common::Server::start().await;
    let jane = server.sign_in("jane@mail.com", "password").await;
    let reply = jane
        .add_reply(id(8783), "The breakdown is attached.")
        .await
        .unwrap();
    assert!(reply.is_agent);
}

#[tokio::test]
async fn cant_add_blank_reply() {
    let server = common::Server::start().await;
    let alex = server.sign_in("alex@mail.com", "password").await;
    let status = alex.add_reply(id(8782), "   ").await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cant_reply_to_foreign_ticket() {
    let server = common::Server::start().await;
    let alex = server.sign_in("alex@mail.com", "password").await;
    let status = alex.add_reply(id(8783), "Hello?").await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let status = alex.replies(id(8783)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reply_keeps_triage_changes() {
    let server = common::Server::start().await;
    let maria = server.sign_in("maria@mail.com", "password").await;
    let jane = server.sign_in("jane@mail.com", "password").await;

    jane.set_ticket_status(id(8783), api::ticket::Status::Resolved)
        .await
        .unwrap();
    let reply = maria
        .add_reply(id(8783), "Thanks, that answers it.")
        .await
        .unwrap();

    let ticket = maria.get_ticket(id(8783)).await.unwrap();
    assert_eq!(ticket.status, api::ticket::Status::Resolved);
    assert_eq!(ticket.assignee.unwrap().name, "Jane Doe");
    assert_eq!(ticket.last_updated, reply.created_at);
    assert_eq!(ticket.replies, 3);
}
