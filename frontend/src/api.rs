//! Server routes used by the ledger views.

use gloo_net::http::{Request, Response};
use serde_json::Value;
use thiserror::Error;
use web_sys::{FormData, RequestCredentials};

use crate::entry::{EntryId, EntryPayload};
use crate::settings::AppConfig;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("unreadable response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

/// The ledger server as seen by the sync controller.
///
/// Fetches hand back raw JSON rows; decoding and validation happen in
/// [`crate::entry`] so a single bad row never sinks a whole refresh.
#[allow(async_fn_in_trait)]
pub trait LedgerApi {
    /// `GET /entries`: `[id, date, amount, description, category]` rows.
    async fn fetch_entries(&self) -> Result<Vec<Value>, ApiError>;
    /// `GET /hist_data`: `{date, amount, category}` objects.
    async fn fetch_history(&self) -> Result<Vec<Value>, ApiError>;
    async fn submit(&self, payload: &EntryPayload) -> Result<(), ApiError>;
    async fn update(&self, id: EntryId, payload: &EntryPayload) -> Result<(), ApiError>;
    async fn delete(&self, id: EntryId) -> Result<(), ApiError>;
    /// `GET /save`: asks the server to persist its store.
    async fn save(&self) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct HttpApi {
    config: AppConfig,
}

impl HttpApi {
    pub fn new(config: AppConfig) -> Self {
        HttpApi { config }
    }

    async fn get_rows(&self, path: &str) -> Result<Vec<Value>, ApiError> {
        let endpoint = self.config.endpoint(path);
        let resp = Request::get(&endpoint)
            .credentials(RequestCredentials::Include)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;
        let resp = check(&endpoint, resp)?;
        resp.json::<Vec<Value>>().await.map_err(|e| ApiError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }
}

fn transport(endpoint: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    }
}

fn check(endpoint: &str, resp: Response) -> Result<Response, ApiError> {
    if resp.ok() {
        Ok(resp)
    } else {
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: resp.status(),
        })
    }
}

fn form_data(payload: &EntryPayload) -> Result<FormData, String> {
    let form = FormData::new().map_err(|e| format!("{:?}", e))?;
    let amount = payload.amount.to_string();
    for (name, value) in [
        ("date", payload.date.as_str()),
        ("amount", amount.as_str()),
        ("description", payload.description.as_str()),
        ("category", payload.category.as_str()),
    ] {
        form.append_with_str(name, value)
            .map_err(|e| format!("{:?}", e))?;
    }
    Ok(form)
}

impl LedgerApi for HttpApi {
    async fn fetch_entries(&self) -> Result<Vec<Value>, ApiError> {
        self.get_rows("/entries").await
    }

    async fn fetch_history(&self) -> Result<Vec<Value>, ApiError> {
        self.get_rows("/hist_data").await
    }

    async fn submit(&self, payload: &EntryPayload) -> Result<(), ApiError> {
        let endpoint = self.config.endpoint("/submit");
        let form = form_data(payload).map_err(|e| transport(&endpoint, e))?;
        let request = Request::post(&endpoint)
            .credentials(RequestCredentials::Include)
            .body(form)
            .map_err(|e| transport(&endpoint, e))?;
        let resp = request.send().await.map_err(|e| transport(&endpoint, e))?;
        check(&endpoint, resp).map(|_| ())
    }

    async fn update(&self, id: EntryId, payload: &EntryPayload) -> Result<(), ApiError> {
        let endpoint = self.config.endpoint(&format!("/update/{}", id));
        let request = Request::post(&endpoint)
            .credentials(RequestCredentials::Include)
            .json(payload)
            .map_err(|e| transport(&endpoint, e))?;
        let resp = request.send().await.map_err(|e| transport(&endpoint, e))?;
        check(&endpoint, resp).map(|_| ())
    }

    async fn delete(&self, id: EntryId) -> Result<(), ApiError> {
        let endpoint = self.config.endpoint(&format!("/delete/{}", id));
        let resp = Request::delete(&endpoint)
            .credentials(RequestCredentials::Include)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;
        check(&endpoint, resp).map(|_| ())
    }

    async fn save(&self) -> Result<(), ApiError> {
        let endpoint = self.config.endpoint("/save");
        let resp = Request::get(&endpoint)
            .credentials(RequestCredentials::Include)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;
        check(&endpoint, resp).map(|_| ())
    }
}
