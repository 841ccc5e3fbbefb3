//! HTTP client implementation

use reqwest::{header, Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::app::options::ClientOptions;
use crate::errors::DeployError;

/// HTTP client for the RunPod serverless API
///
/// Cheap to share: the underlying connection pool is reference counted.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: &ClientOptions) -> Result<Self, DeployError> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_key: options.api_key.clone(),
        })
    }

    fn bearer(&self) -> Result<String, DeployError> {
        let key = self.api_key.as_ref().ok_or(DeployError::MissingCredential)?;
        Ok(format!("Bearer {}", key.expose_secret()))
    }

    /// Make a GET request, returning the response whatever its status
    pub async fn get(&self, path: &str) -> Result<Response, DeployError> {
        let auth = self.bearer()?;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await?;
        Ok(response)
    }

    /// Make a JSON POST request, returning the response whatever its status
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, DeployError> {
        let auth = self.bearer()?;
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .json(body)
            .send()
            .await?;
        Ok(response)
    }
}
