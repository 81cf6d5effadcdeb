//! HTTP client with origin-scoped credentials
//!
//! One client is built per repository and reused for every request, so the
//! underlying connection pool is shared by index fetches and downloads.
//!
//! The authorization header is only sent to the repository's own origin.
//! Redirects are followed manually so that credentials are never forwarded to
//! another origin, unless the repository explicitly opts into passing them.

use std::time::Duration;
use url::Url;

use crate::error::{RepoError, Result};

const MAX_REDIRECTS: u32 = 10;

/// Options for building an [`HttpClient`]
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    /// User-Agent header value
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Full `Authorization` header value, if the repository requires one
    pub authorization: Option<String>,
    /// Send the authorization header to every origin
    pub pass_credentials: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(30),
            authorization: None,
            pass_credentials: false,
        }
    }
}

/// Default User-Agent, e.g. `chartdex/0.2.0`
pub fn default_user_agent() -> String {
    format!("chartdex/{}", env!("CARGO_PKG_VERSION"))
}

/// Pooled HTTP client bound to one repository origin
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    authorization: Option<String>,
    pass_credentials: bool,
}

impl HttpClient {
    /// Create a client for the repository at `base_url`
    pub fn new(base_url: &str, options: &HttpClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Redirects are handled in `get` to keep credentials on-origin
            .redirect(reqwest::redirect::Policy::none())
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| RepoError::InvalidConfig {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            authorization: options.authorization.clone(),
            pass_credentials: options.pass_credentials,
        })
    }

    /// GET a URL, following redirects, and require a 200 response
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.send(url, true).await
    }

    /// Like [`HttpClient::get`], but logs dropped credentials only at debug
    ///
    /// For assets such as icons, which usually live on another origin.
    pub async fn get_asset(&self, url: &str) -> Result<reqwest::Response> {
        self.send(url, false).await
    }

    async fn send(&self, url: &str, warn_on_dropped_credentials: bool) -> Result<reqwest::Response> {
        let mut current_url = url.to_string();
        let mut redirects = 0;

        loop {
            let mut request = self.client.get(&current_url);

            if let Some(auth) = &self.authorization {
                if self.pass_credentials || same_origin(&self.base_url, &current_url) {
                    request = request.header(reqwest::header::AUTHORIZATION, auth);
                } else if warn_on_dropped_credentials {
                    tracing::warn!(
                        url = %current_url,
                        "request leaves the repository origin, credentials not forwarded"
                    );
                } else {
                    tracing::debug!(url = %current_url, "credentials not forwarded off origin");
                }
            }

            let response = request
                .send()
                .await
                .map_err(|e| RepoError::fetch(&current_url, e))?;
            let status = response.status();

            if status.is_redirection() {
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    return Err(RepoError::Fetch {
                        url: url.to_string(),
                        message: format!("too many redirects (max {})", MAX_REDIRECTS),
                    });
                }

                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| RepoError::Fetch {
                        url: current_url.clone(),
                        message: "redirect without Location header".to_string(),
                    })?;

                let base = parse_url(&current_url)?;
                current_url = base
                    .join(location)
                    .map_err(|e| RepoError::InvalidUrl {
                        url: location.to_string(),
                        reason: e.to_string(),
                    })?
                    .to_string();
                continue;
            }

            if status != reqwest::StatusCode::OK {
                return Err(RepoError::Fetch {
                    url: current_url,
                    message: format!("unexpected status {}", status),
                });
            }

            return Ok(response);
        }
    }

    /// GET a URL and return the body
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let content = response
            .bytes()
            .await
            .map_err(|e| RepoError::fetch(url, e))?;
        Ok(content.to_vec())
    }

    /// GET a URL, failing once the body exceeds `limit` bytes
    ///
    /// A declared `Content-Length` over the limit fails before the body is
    /// read; otherwise the body is read chunk by chunk and abandoned as soon
    /// as it grows past the limit.
    pub async fn get_bytes_limited(&self, url: &str, limit: u64) -> Result<Vec<u8>> {
        let mut response = self.get(url).await?;
        let too_large = |size: u64| RepoError::IndexTooLarge {
            path: url.to_string(),
            size,
            limit,
        };

        if let Some(declared) = response.content_length() {
            if declared > limit {
                return Err(too_large(declared));
            }
        }

        let mut content = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RepoError::fetch(url, e))?
        {
            let size = (content.len() + chunk.len()) as u64;
            if size > limit {
                return Err(too_large(size));
            }
            content.extend_from_slice(&chunk);
        }
        Ok(content)
    }

    /// GET an asset and return the body with its content type
    pub async fn get_with_content_type(&self, url: &str) -> Result<(Vec<u8>, String)> {
        let response = self.get_asset(url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let content = response
            .bytes()
            .await
            .map_err(|e| RepoError::fetch(url, e))?;
        Ok((content.to_vec(), content_type))
    }
}

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| RepoError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Check if two URLs share scheme, host and port
pub fn same_origin(url1: &str, url2: &str) -> bool {
    match (Url::parse(url1), Url::parse(url2)) {
        (Ok(u1), Ok(u2)) => {
            u1.scheme() == u2.scheme()
                && u1.host() == u2.host()
                && u1.port_or_known_default() == u2.port_or_known_default()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_same_origin() {
        assert!(same_origin(
            "https://charts.example.com/stable",
            "https://charts.example.com/other/file.tgz"
        ));
        assert!(same_origin("https://example.com", "https://example.com:443/x"));
        assert!(!same_origin("https://example.com", "http://example.com"));
        assert!(!same_origin("https://example.com", "https://cdn.example.com"));
        assert!(!same_origin("not a url", "https://example.com"));
    }

    #[tokio::test]
    async fn test_non_200_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), &HttpClientOptions::default()).unwrap();
        let err = client
            .get_bytes(&format!("{}/index.yaml", server.uri()))
            .await
            .unwrap_err();
        match err {
            RepoError::Fetch { url, message } => {
                assert!(url.ends_with("/index.yaml"));
                assert!(message.contains("404"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sends_auth_and_user_agent_to_repo_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .and(header("authorization", "Bearer token"))
            .and(header("user-agent", "chartdex-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let options = HttpClientOptions {
            user_agent: "chartdex-test".to_string(),
            authorization: Some("Bearer token".to_string()),
            ..Default::default()
        };
        let client = HttpClient::new(&server.uri(), &options).unwrap();
        let body = client
            .get_bytes(&format!("{}/index.yaml", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_cross_origin_redirect_drops_credentials() {
        let repo = MockServer::start().await;
        let cdn = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/chart.tgz"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/blob/chart.tgz", cdn.uri()).as_str()),
            )
            .mount(&repo)
            .await;
        Mock::given(method("GET"))
            .and(path("/blob/chart.tgz"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&cdn)
            .await;
        Mock::given(method("GET"))
            .and(path("/blob/chart.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive".to_vec()))
            .mount(&cdn)
            .await;

        let options = HttpClientOptions {
            authorization: Some("Basic c2VjcmV0".to_string()),
            ..Default::default()
        };
        let client = HttpClient::new(&repo.uri(), &options).unwrap();
        let body = client
            .get_bytes(&format!("{}/chart.tgz", repo.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"archive");
    }

    #[tokio::test]
    async fn test_get_bytes_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 64]))
            .mount(&server)
            .await;

        let client = HttpClient::new(&server.uri(), &HttpClientOptions::default()).unwrap();
        let url = format!("{}/index.yaml", server.uri());

        assert_eq!(client.get_bytes_limited(&url, 64).await.unwrap().len(), 64);
        let err = client.get_bytes_limited(&url, 16).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::IndexTooLarge { size, limit: 16, .. } if size > 16
        ));
    }

    #[tokio::test]
    async fn test_asset_on_other_origin_is_fetched_without_credentials() {
        let repo = MockServer::start().await;
        let icons = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/icon.png"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&icons)
            .await;
        Mock::given(method("GET"))
            .and(path("/icon.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png".to_vec()),
            )
            .mount(&icons)
            .await;

        let options = HttpClientOptions {
            authorization: Some("Bearer token".to_string()),
            ..Default::default()
        };
        let client = HttpClient::new(&repo.uri(), &options).unwrap();
        let (body, content_type) = client
            .get_with_content_type(&format!("{}/icon.png", icons.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"png");
        assert_eq!(content_type, "image/png");
    }
}
