// Scripted `RestApi` double for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;

use iflux_api::{ApiResponse, Error, RestApi};

use crate::manager::REMOTE_ACTION_TARGET_ERROR;

/// A request as the double saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Recorded {
    pub fn get(path: &str, query: &[(&str, &str)]) -> Self {
        Self {
            method: "GET",
            path: path.into(),
            query: query
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            body: None,
        }
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

type Fallback = Box<dyn Fn(&Recorded) -> ApiResponse + Send + Sync>;

/// Answers requests from a queue of canned responses, then from an
/// optional fallback. Every request is recorded.
pub struct ScriptedApi {
    queue: Mutex<VecDeque<ApiResponse>>,
    fallback: Option<Fallback>,
    requests: Mutex<Vec<Recorded>>,
    base_url: Mutex<Option<Url>>,
    token: Mutex<Option<String>>,
}

impl ScriptedApi {
    pub fn new(responses: impl IntoIterator<Item = ApiResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().collect()),
            fallback: None,
            requests: Mutex::default(),
            base_url: Mutex::default(),
            token: Mutex::default(),
        }
    }

    /// Answer every request with `route`.
    pub fn repeating(route: impl Fn(&Recorded) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self {
            fallback: Some(Box::new(route)),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn base_url(&self) -> Option<Url> {
        self.base_url.lock().unwrap().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    fn answer(&self, request: Recorded) -> ApiResponse {
        let response = self.queue.lock().unwrap().pop_front().unwrap_or_else(|| {
            let route = self
                .fallback
                .as_ref()
                .unwrap_or_else(|| panic!("unscripted request: {request:?}"));
            route(&request)
        });
        self.requests.lock().unwrap().push(request);
        response
    }
}

impl RestApi for ScriptedApi {
    fn configure(&self, base_url: Url) {
        *self.base_url.lock().unwrap() = Some(base_url);
    }

    fn install_bearer_token(&self, token: SecretString) {
        *self.token.lock().unwrap() = Some(token.expose_secret().to_owned());
    }

    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send {
        let response = self.answer(Recorded::get(path, query));
        async move { Ok(response) }
    }

    fn post(
        &self,
        path: &str,
        body: &Value,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send {
        let response = self.answer(Recorded {
            method: "POST",
            path: path.into(),
            query: Vec::new(),
            body: Some(body.clone()),
        });
        async move { Ok(response) }
    }

    fn patch(
        &self,
        path: &str,
        body: &Value,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send {
        let response = self.answer(Recorded {
            method: "PATCH",
            path: path.into(),
            query: Vec::new(),
            body: Some(body.clone()),
        });
        async move { Ok(response) }
    }
}

/// `201 Created` with a `Location` header.
pub fn created(location: &str) -> ApiResponse {
    ApiResponse::with_status(201, Value::Null).with_location(location)
}

/// The `500` the API answers when it cannot configure a remote target.
pub fn remote_config_failure() -> ApiResponse {
    ApiResponse::with_status(500, json!({ "message": REMOTE_ACTION_TARGET_ERROR }))
}

/// Sign-in success carrying `token`.
pub fn signed_in(token: &str) -> ApiResponse {
    ApiResponse::with_status(200, json!({ "token": token }))
}
