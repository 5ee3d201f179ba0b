//! HTTP client for the remote ledger API.
//!
//! Thin typed wrapper over [`reqwest`]: one method per endpoint, bearer
//! authentication, JSON bodies. Failure classification lives in
//! [`SyncError`]: transport failures become [`SyncError::Offline`],
//! non-2xx statuses become [`SyncError::Http`].

use chrono::NaiveDate;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SyncError};
use crate::models::{
    AccountId, AccountUpdateRequest, BankAccount, Category, Transaction, TransactionId,
    TransactionRequest, datetime,
};

/// Base URL for the ledger API.
const DEFAULT_BASE_URL: &str = "https://shmr-finance.ru/api/v1";

/// Builder for constructing an [`ApiClient`].
#[derive(Debug)]
pub struct ApiClientBuilder {
    /// Access token for API authentication.
    token: Option<String>,
    /// Base URL override (for testing).
    base_url: Option<String>,
}

impl ApiClientBuilder {
    /// Sets the access token for API authentication.
    #[inline]
    #[must_use]
    pub fn token<T: Into<String>>(mut self, token: T) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Overrides the base URL (useful for testing with a mock server).
    #[inline]
    #[must_use]
    pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if no token was provided, or an
    /// error if the underlying HTTP client fails to build.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub fn build(self) -> Result<ApiClient> {
        let token = self
            .token
            .ok_or(SyncError::Config("access token is required"))?;
        let base_url = self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        tracing::debug!(base_url = %base_url, "building API client");
        let http = reqwest::Client::builder().build()?;
        Ok(ApiClient {
            http,
            token,
            base_url,
        })
    }
}

/// Async client for the remote ledger API.
///
/// Use [`ApiClient::builder()`] to construct an instance. Cloning is
/// cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Underlying HTTP client.
    http: reqwest::Client,
    /// Bearer access token.
    token: String,
    /// API base URL.
    base_url: String,
}

impl ApiClient {
    /// Creates a new builder for configuring the client.
    #[inline]
    #[must_use]
    pub const fn builder() -> ApiClientBuilder {
        ApiClientBuilder {
            token: None,
            base_url: None,
        }
    }

    /// Fetches all bank accounts via `GET /accounts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server returns a
    /// non-success status, or the response cannot be deserialized.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub async fn accounts(&self) -> Result<Vec<BankAccount>> {
        self.get("/accounts", &[]).await
    }

    /// Updates a bank account via `PUT /accounts/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server returns a
    /// non-success status, or the response cannot be deserialized.
    #[inline]
    #[tracing::instrument(skip_all, fields(account = %id))]
    pub async fn update_account(
        &self,
        id: AccountId,
        request: &AccountUpdateRequest,
    ) -> Result<BankAccount> {
        self.send(Method::PUT, &format!("/accounts/{id}"), request)
            .await
    }

    /// Fetches the full category list via `GET /categories`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server returns a
    /// non-success status, or the response cannot be deserialized.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.get("/categories", &[]).await
    }

    /// Fetches an account's transactions for a day-granularity window
    /// via `GET /transactions/account/{id}/period?startDate&endDate`.
    ///
    /// No ordering is guaranteed; callers sort.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server returns a
    /// non-success status, or the response cannot be deserialized.
    #[tracing::instrument(skip_all, fields(account = %account, start = %start, end = %end))]
    pub async fn transactions_for_period(
        &self,
        account: AccountId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        self.get(
            &format!("/transactions/account/{account}/period"),
            &[
                ("startDate", datetime::format_day(start)),
                ("endDate", datetime::format_day(end)),
            ],
        )
        .await
    }

    /// Creates a transaction via `POST /transactions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server returns a
    /// non-success status, or the response cannot be deserialized.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub async fn create_transaction(&self, request: &TransactionRequest) -> Result<Transaction> {
        self.send(Method::POST, "/transactions", request).await
    }

    /// Updates a transaction via `PUT /transactions/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server returns a
    /// non-success status, or the response cannot be deserialized.
    #[inline]
    #[tracing::instrument(skip_all, fields(transaction = %id))]
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        request: &TransactionRequest,
    ) -> Result<Transaction> {
        self.send(Method::PUT, &format!("/transactions/{id}"), request)
            .await
    }

    /// Deletes a transaction via `DELETE /transactions/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns a
    /// non-success status.
    #[inline]
    #[tracing::instrument(skip_all, fields(transaction = %id))]
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<()> {
        let url = format!("{}/transactions/{id}", self.base_url);
        let _body = self.execute(self.http.delete(&url)).await?;
        Ok(())
    }

    // ── Request plumbing ────────────────────────────────────────────

    /// Sends an authenticated GET request and deserializes the response.
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.http.get(&url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let body = self.execute(builder).await?;
        serde_json::from_slice(&body).map_err(SyncError::Decode)
    }

    /// Sends an authenticated JSON request with a body and deserializes
    /// the response.
    async fn send<Req, Resp>(&self, method: Method, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(SyncError::Encode)?;
        let url = format!("{}{path}", self.base_url);
        let builder = self
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        let body = self.execute(builder).await?;
        serde_json::from_slice(&body).map_err(SyncError::Decode)
    }

    /// Attaches authentication, sends the request, and maps the
    /// response into success bytes or a typed failure.
    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<Vec<u8>> {
        let response = builder
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        tracing::debug!(status = %status, body_len = body.len(), "received response");
        if status.is_success() {
            Ok(body.to_vec())
        } else {
            Err(SyncError::Http {
                status: status.as_u16(),
                body: body.to_vec(),
            })
        }
    }
}
