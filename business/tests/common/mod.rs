//! Shared helpers for the directory integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use roster_business::{
    Address, Company, DirectoryConfig, DirectoryStore, FetchError, FetchResult, User, UserId,
    UserSource,
};
use serde_json::{Value, json};
use tokio::sync::{Notify, oneshot};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn user(id: u64, name: &str, email: &str) -> User {
    User {
        id: UserId(id),
        name: name.to_owned(),
        email: email.to_owned(),
        phone: String::new(),
        address: Address::default(),
        company: Company::default(),
    }
}

pub fn user_json(id: u64, name: &str, email: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "username": name.split_whitespace().next().unwrap_or(name),
        "email": email,
        "phone": "1-770-736-8031 x56442",
        "website": "example.org",
        "address": {
            "street": "Kulas Light",
            "suite": "Apt. 556",
            "city": "Gwenborough",
            "zipcode": "92998-3874",
            "geo": { "lat": "-37.3159", "lng": "81.1496" }
        },
        "company": {
            "name": "Romaguera-Crona",
            "catchPhrase": "Multi-layered client-server neural-net",
            "bs": "harness real-time e-markets"
        }
    })
}

pub fn john_and_jane_json() -> Value {
    json!([
        user_json(1, "John Doe", "john@x.com"),
        user_json(2, "Jane Smith", "jane@x.com"),
    ])
}

/// A mock API server and a store pointed at it.
pub struct TestContext {
    pub mock_server: MockServer,
    pub store: DirectoryStore,
}

impl TestContext {
    pub async fn new() -> Self {
        init_logger();
        let mock_server = MockServer::start().await;
        let config = DirectoryConfig::new(mock_server.uri());
        let store = DirectoryStore::new(config).expect("valid test config");
        Self { mock_server, store }
    }

    pub async fn mock_users(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.mock_server)
            .await;
    }

    pub async fn mock_user(&self, id: u64, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/users/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.mock_server)
            .await;
    }

    pub async fn mock_status(&self, route: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.mock_server)
            .await;
    }

    pub async fn mock_raw(&self, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.mock_server)
            .await;
    }
}

type Reply<T> = oneshot::Receiver<FetchResult<T>>;

/// A [`UserSource`] whose calls block until the test answers them.
///
/// Each `expect_*` call scripts the next call of that kind and returns the
/// sender that resolves it. Dropping the sender fails the call.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    all: Mutex<VecDeque<Reply<Vec<User>>>>,
    by_id: Mutex<VecDeque<Reply<User>>>,
    calls: AtomicUsize,
    called: Notify,
}

impl ScriptedSource {
    pub fn expect_all(&self) -> oneshot::Sender<FetchResult<Vec<User>>> {
        let (send, recv) = oneshot::channel();
        self.all.lock().expect("script lock").push_back(recv);
        send
    }

    pub fn expect_by_id(&self) -> oneshot::Sender<FetchResult<User>> {
        let (send, recv) = oneshot::channel();
        self.by_id.lock().expect("script lock").push_back(recv);
        send
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until `n` calls (of any kind) have started.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let notified = self.called.notified();
            if self.calls() >= n {
                return;
            }
            notified.await;
        }
    }

    fn started(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_one();
    }
}

async fn answer<T>(reply: Option<Reply<T>>) -> FetchResult<T> {
    match reply {
        Some(reply) => reply
            .await
            .unwrap_or_else(|_| Err(FetchError::Transport("script dropped".to_owned()))),
        None => Err(FetchError::Transport("unscripted call".to_owned())),
    }
}

#[async_trait]
impl UserSource for ScriptedSource {
    async fn fetch_all_users(&self) -> FetchResult<Vec<User>> {
        let reply = self.all.lock().expect("script lock").pop_front();
        self.started();
        answer(reply).await
    }

    async fn fetch_user_by_id(&self, _id: UserId) -> FetchResult<User> {
        let reply = self.by_id.lock().expect("script lock").pop_front();
        self.started();
        answer(reply).await
    }
}

/// A [`UserSource`] whose every call panics.
#[derive(Debug, Default)]
pub struct PanickingSource;

#[async_trait]
impl UserSource for PanickingSource {
    async fn fetch_all_users(&self) -> FetchResult<Vec<User>> {
        panic!("user source crashed")
    }

    async fn fetch_user_by_id(&self, id: UserId) -> FetchResult<User> {
        panic!("user source crashed fetching {id}")
    }
}

/// Serves the full list from a [`ScriptedSource`]; every lookup by id panics.
#[derive(Debug, Default)]
pub struct PanickingLookupSource {
    pub list: ScriptedSource,
}

#[async_trait]
impl UserSource for PanickingLookupSource {
    async fn fetch_all_users(&self) -> FetchResult<Vec<User>> {
        self.list.fetch_all_users().await
    }

    async fn fetch_user_by_id(&self, id: UserId) -> FetchResult<User> {
        panic!("lookup of user {id} crashed")
    }
}
