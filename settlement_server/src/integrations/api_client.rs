use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use settlement_engine::helpers::{SignedPayload, SIGNATURE_HEADER};
use thiserror::Error;

use crate::config::EndpointConfig;

#[derive(Debug, Clone, Error)]
pub enum ApiClientError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("The request timed out")]
    Timeout,
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

impl From<reqwest::Error> for ApiClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiClientError::Timeout
        } else if e.is_decode() {
            ApiClientError::JsonError(e.to_string())
        } else {
            ApiClientError::RestResponseError(e.to_string())
        }
    }
}

/// A thin JSON client for one collaborator's REST API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    client: Arc<Client>,
}

impl ApiClient {
    pub fn new(endpoint: &EndpointConfig, timeout: Duration) -> Result<Self, ApiClientError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !endpoint.api_key.is_empty() {
            let mut val = HeaderValue::from_str(&format!("Bearer {}", endpoint.api_key.reveal()))
                .map_err(|e| ApiClientError::Initialization(e.to_string()))?;
            val.set_sensitive(true);
            headers.insert(AUTHORIZATION, val);
        }
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiClientError::Initialization(e.to_string()))?;
        Ok(Self { base_url: endpoint.url.clone(), timeout, client: Arc::new(client) })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, ApiClientError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ApiClientError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(ApiClientError::QueryError { status, message })
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T, ApiClientError> {
        self.rest_query::<T, ()>(Method::GET, path, params, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: B) -> Result<T, ApiClientError> {
        self.rest_query(Method::POST, path, &[], Some(body)).await
    }

    /// Posts the exact bytes of a signed payload, with its signature in the [`SIGNATURE_HEADER`] header, and returns
    /// the response body.
    pub async fn send_signed(&self, path: &str, payload: &SignedPayload) -> Result<String, ApiClientError> {
        let url = self.url(path);
        trace!("Sending signed payload to {url}");
        let response = self
            .client
            .post(url)
            .header(SIGNATURE_HEADER, payload.signature.as_str())
            .body(payload.body.clone())
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(ApiClientError::QueryError { status: status.as_u16(), message: text })
        }
    }

    pub async fn post_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &SignedPayload,
    ) -> Result<T, ApiClientError> {
        let text = self.send_signed(path, payload).await?;
        serde_json::from_str(&text).map_err(|e| ApiClientError::JsonError(e.to_string()))
    }
}
