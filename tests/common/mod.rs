use std::{sync::Arc, time::Duration};

use deskflow::{
    api, config, db,
    server::{self, AppState},
    suggest,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const SUBJECT: &str = "Unable to login";
pub const DESCRIPTION: &str = "My account is locked and I cannot log in at all";

/// The service on an ephemeral port, backed by a freshly seeded memory store.
pub struct Server {
    base_url: String,
}

impl Server {
    pub async fn start() -> Self {
        Self::start_with(config::Suggest::default()).await
    }

    pub async fn start_with(settings: config::Suggest) -> Self {
        let db_client = db::Client::memory();
        db::seed::apply(&db_client)
            .await
            .expect("failed to seed the store");

        let state = AppState::new(
            db_client,
            Arc::new(suggest::Catalog::builtin(settings.limit)),
            &settings,
            &config::Jwt {
                secret: "test-secret".to_owned(),
                expiration_time: Duration::from_secs(60 * 60),
            },
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind a listener");
        let addr = listener.local_addr().expect("failed to get an address");
        tokio::spawn(async move {
            axum::serve(listener, server::router(Arc::new(state))).await
        });

        Self {
            base_url: format!("http://{addr}"),
        }
    }

    pub fn client(&self) -> Client {
        Client {
            inner: reqwest::Client::new(),
            base_url: self.base_url.clone(),
            auth_token: None,
        }
    }

    pub async fn sign_in(&self, login: &str, password: &str) -> Client {
        let mut client = self.client();
        client.auth_token = Some(
            client
                .auth(login, password)
                .await
                .expect("wrong status code"),
        );
        client
    }
}

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
    pub auth_token: Option<String>,
}

impl Client {
    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.post(format!("{}{path}", self.base_url)))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.put(format!("{}{path}", self.base_url)))
    }

    fn patch(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.patch(format!("{}{path}", self.base_url)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.delete(format!("{}{path}", self.base_url)))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(req: RequestBuilder) -> Result<reqwest::Response, StatusCode> {
        req.send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))
    }

    async fn send_json<T: DeserializeOwned>(
        req: RequestBuilder,
    ) -> Result<T, StatusCode> {
        Ok(Self::send(req)
            .await?
            .json::<T>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn auth(
        &self,
        login: &str,
        password: &str,
    ) -> Result<String, StatusCode> {
        Ok(Self::send(self.post("/auth").json(&json!({
            "login": login,
            "password": password,
        })))
        .await?
        .text()
        .await
        .expect("failed to get a response"))
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<api::User, StatusCode> {
        Self::send_json(self.post("/register").json(&json!({
            "name": name,
            "email": email,
            "password": password,
        })))
        .await
    }

    pub async fn user(&self) -> Result<api::User, StatusCode> {
        Self::send_json(self.get("/user")).await
    }

    pub async fn staff(&self) -> Result<Vec<api::User>, StatusCode> {
        Self::send_json(self.get("/staff")).await
    }

    pub async fn get_tickets(
        &self,
        offset: usize,
        limit: usize,
        search: Option<&str>,
    ) -> Result<api::ticket::List, StatusCode> {
        let mut req = self
            .get("/ticket")
            .query(&[("offset", offset), ("limit", limit)]);
        if let Some(search) = search {
            req = req.query(&[("search", search)]);
        }
        Self::send_json(req).await
    }

    pub async fn add_ticket(
        &self,
        subject: &str,
        description: &str,
        category: api::ticket::Category,
        priority: api::ticket::Priority,
    ) -> Result<api::Ticket, StatusCode> {
        Self::send_json(self.post("/ticket").json(&json!({
            "subject": subject,
            "description": description,
            "category": category,
            "priority": priority,
        })))
        .await
    }

    pub async fn get_ticket(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::Ticket, StatusCode> {
        Self::send_json(self.get(&format!("/ticket/{id}"))).await
    }

    pub async fn edit_ticket(
        &self,
        id: api::ticket::Id,
        op: Value,
    ) -> Result<api::Ticket, StatusCode> {
        Self::send_json(self.patch(&format!("/ticket/{id}")).json(&op)).await
    }

    pub async fn edit_ticket_subject(
        &self,
        id: api::ticket::Id,
        subject: &str,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({ "op": "editSubject", "data": { "subject": subject } }),
        )
        .await
    }

    pub async fn edit_ticket_description(
        &self,
        id: api::ticket::Id,
        description: &str,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({
                "op": "editDescription",
                "data": { "description": description },
            }),
        )
        .await
    }

    pub async fn set_ticket_status(
        &self,
        id: api::ticket::Id,
        status: api::ticket::Status,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({ "op": "setStatus", "data": { "status": status } }),
        )
        .await
    }

    pub async fn set_ticket_priority(
        &self,
        id: api::ticket::Id,
        priority: api::ticket::Priority,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({ "op": "setPriority", "data": { "priority": priority } }),
        )
        .await
    }

    pub async fn assign_ticket(
        &self,
        id: api::ticket::Id,
        assignee: api::user::Id,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({ "op": "assign", "data": { "assignee": assignee } }),
        )
        .await
    }

    pub async fn unassign_ticket(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(id, json!({ "op": "unassign" })).await
    }

    pub async fn replies(
        &self,
        id: api::ticket::Id,
    ) -> Result<Vec<api::Reply>, StatusCode> {
        Self::send_json(self.get(&format!("/ticket/{id}/replies"))).await
    }

    pub async fn add_reply(
        &self,
        id: api::ticket::Id,
        message: &str,
    ) -> Result<api::Reply, StatusCode> {
        Self::send_json(
            self.post(&format!("/ticket/{id}/replies"))
                .json(&json!({ "message": message })),
        )
        .await
    }

    pub async fn open_draft(&self) -> Result<api::Draft, StatusCode> {
        Self::send_json(self.post("/draft")).await
    }

    pub async fn draft(
        &self,
        id: api::draft::Id,
        settled: bool,
    ) -> Result<api::Draft, StatusCode> {
        Self::send_json(
            self.get(&format!("/draft/{id}"))
                .query(&[("settled", settled)]),
        )
        .await
    }

    pub async fn commit_draft(
        &self,
        id: api::draft::Id,
        subject: &str,
        description: &str,
    ) -> Result<api::Draft, StatusCode> {
        Self::send_json(self.put(&format!("/draft/{id}")).json(&json!({
            "subject": subject,
            "description": description,
        })))
        .await
    }

    pub async fn discard_draft(
        &self,
        id: api::draft::Id,
    ) -> Result<(), StatusCode> {
        Self::send(self.delete(&format!("/draft/{id}"))).await.map(drop)
    }

    pub async fn suggest(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<Vec<String>, StatusCode> {
        Self::send_json::<api::draft::Articles>(self.post("/suggest").json(
            &json!({
                "subject": subject,
                "description": description,
            }),
        ))
        .await
        .map(|articles| articles.articles)
    }
}
