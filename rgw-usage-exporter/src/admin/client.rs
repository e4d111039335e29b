//! RGW admin API client
//!
//! Constructed once per sync cycle (per the spec's "build a fresh admin
//! client" step), immutable and thread-safe after construction, same as
//! the teacher's connection-pool agents treat their underlying clients.

use std::time::Duration;

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::admin::signing::sign_request;
use crate::admin::types::{GetBucketInfoRequest, GetUsageRequest, GetUserRequest, StatusErrorEnvelope, UsageResponse};
use crate::error::{Error, RemoteErrorKind, Result};
use crate::model::{Bucket, User};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Signed HTTPS client for the RGW admin API.
pub struct AdminClient {
    endpoint: String,
    access_key: String,
    secret_key: String,
    http: reqwest::Client,
}

impl AdminClient {
    /// Construct a client. Rejects an empty endpoint or key pair with
    /// [`Error::BadConfig`].
    pub fn new(
        endpoint_url: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        http_client: Option<reqwest::Client>,
    ) -> Result<Self> {
        let endpoint = endpoint_url.into();
        let access_key = access_key.into();
        let secret_key = secret_key.into();

        if endpoint.is_empty() {
            return Err(Error::BadConfig("admin endpoint must not be empty".into()));
        }
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(Error::BadConfig("admin access/secret key must not be empty".into()));
        }

        let http = match http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .map_err(Error::Transport)?,
        };

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_key,
            secret_key,
            http,
        })
    }

    async fn get(
        &self,
        resource: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/admin/{resource}", self.endpoint);
        let mut request = self
            .http
            .request(Method::GET, &url)
            .query(query)
            .build()
            .map_err(Error::Transport)?;

        sign_request(&mut request, &self.access_key, &self.secret_key)?;

        tokio::select! {
            result = self.http.execute(request) => {
                let response = result.map_err(Error::Transport)?;
                Self::check_status(response).await
            }
            _ = cancel.cancelled() => Err(Error::Cancelled(resource.to_string())),
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().as_u16() < 300 {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<StatusErrorEnvelope>(&body) {
            Ok(envelope) => Err(Error::RemoteStatus {
                code: RemoteErrorKind::from_code(&envelope.code),
                message: format!("remote returned status error: {}", envelope.code),
                request_id: envelope.request_id,
            }),
            Err(_) => Err(Error::RemoteStatus {
                code: RemoteErrorKind::Unknown("UnknownRemote".into()),
                message: format!("malformed status envelope: {body}"),
                request_id: None,
            }),
        }
    }

    /// `ListUsers` — ordered sequence of user ids.
    pub async fn list_users(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let response = self
            .get("metadata/user", &[("format", "json".to_string())], cancel)
            .await?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// `GetUser`
    pub async fn get_user(&self, req: &GetUserRequest, cancel: &CancellationToken) -> Result<User> {
        let response = self.get("user", &req.query(), cancel).await?;
        response.json::<User>().await.map_err(|e| Error::Decode(e.to_string()))
    }

    /// `ListBuckets` — ordered sequence of bucket names.
    pub async fn list_buckets(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let response = self
            .get("bucket", &[("format", "json".to_string())], cancel)
            .await?;
        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// `GetBucketInfo`
    pub async fn get_bucket_info(
        &self,
        req: &GetBucketInfoRequest,
        cancel: &CancellationToken,
    ) -> Result<Bucket> {
        let response = self.get("bucket", &req.query(), cancel).await?;
        response.json::<Bucket>().await.map_err(|e| Error::Decode(e.to_string()))
    }

    /// `GetUsage`
    pub async fn get_usage(
        &self,
        req: &GetUsageRequest,
        cancel: &CancellationToken,
    ) -> Result<UsageResponse> {
        let response = self.get("usage", &req.query(), cancel).await?;
        response
            .json::<UsageResponse>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_endpoint() {
        let err = AdminClient::new("", "ak", "sk", None).unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn rejects_empty_keys() {
        let err = AdminClient::new("https://rgw.example.com", "", "sk", None).unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn accepts_well_formed_config() {
        let client = AdminClient::new("https://rgw.example.com/", "ak", "sk", None).unwrap();
        assert_eq!(client.endpoint, "https://rgw.example.com");
    }
}
