//! Flickr API connector implementation
//!
//! Implements the `PhotoService` trait against the Flickr REST API.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::photos::{PhotoPage, PhotoService, RemotePhoto, TailBytes, UploadProgress};
use bytes::{BufMut, Bytes, BytesMut};
use core_auth::{ApiCredentials, AuthError};
use core_runtime::logging::redact_if_sensitive;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::FlickrError;
use crate::types::{LoginResponse, RecentlyUpdatedResponse, Status};

/// REST endpoint
const REST_ENDPOINT: &str = "https://api.flickr.com/services/rest/";

/// Upload endpoint
const UPLOAD_ENDPOINT: &str = "https://up.flickr.com/services/upload/";

/// Items per listing page (Flickr maximum)
const PER_PAGE: u32 = 500;

const PROVIDER: &str = "flickr";

/// Flickr API connector
///
/// # Features
///
/// - `flickr.test.login` handshake on connect
/// - Paginated `flickr.photos.recentlyUpdated` listing
/// - Ranged fetch of the tail of original photos
/// - Multipart upload
///
/// # Example
///
/// ```ignore
/// use provider_flickr::FlickrConnector;
/// use core_auth::ApiCredentials;
///
/// let connector = FlickrConnector::connect(http_client, ApiCredentials::from_env()?).await?;
/// let page = connector.list_recently_updated(1, 1, &["date_upload"]).await?;
/// ```
pub struct FlickrConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: ApiCredentials,
}

impl FlickrConnector {
    /// Create a connector without checking the credentials.
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: ApiCredentials) -> Self {
        Self {
            http_client,
            credentials,
        }
    }

    /// Create a connector and verify the credentials with `flickr.test.login`.
    pub async fn connect(
        http_client: Arc<dyn HttpClient>,
        credentials: ApiCredentials,
    ) -> std::result::Result<Self, AuthError> {
        let connector = Self::new(http_client, credentials);
        let user = connector.test_login().await?;
        info!(user = %user, "Authenticated with Flickr");
        Ok(connector)
    }

    /// Check the credentials, returning the authenticated user name (or ID).
    #[instrument(skip(self))]
    pub async fn test_login(&self) -> std::result::Result<String, AuthError> {
        let failed = |reason: String| AuthError::AuthenticationFailed {
            provider: PROVIDER.to_string(),
            reason,
        };

        let response: LoginResponse = self
            .call("flickr.test.login", &[])
            .await
            .map_err(|e| failed(e.to_string()))?;

        let user = response
            .user
            .ok_or_else(|| failed("login response has no user".to_string()))?;

        Ok(user.username.map(|u| u.content).unwrap_or(user.id))
    }

    /// Build the URL of a REST method call
    fn method_url(&self, method: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}?method={}&api_key={}&format=json&nojsoncallback=1",
            REST_ENDPOINT,
            urlencoding::encode(method),
            urlencoding::encode(&self.credentials.api_key)
        );

        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }

        url
    }

    /// Call a REST method and decode its JSON body
    #[instrument(skip(self, params))]
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, FlickrError> {
        debug!(
            api_key = %redact_if_sensitive("api_key", &self.credentials.api_key),
            "Calling Flickr API"
        );

        let request = HttpRequest::new(HttpMethod::Get, self.method_url(method, params))
            .bearer_token(self.credentials.access_token.clone())
            .header("Accept", "application/json")
            .timeout(Duration::from_secs(30));

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Flickr API request failed");
            return Err(status_error(&response));
        }

        let status: Status = decode(&response)?;
        status.check()?;
        decode(&response)
    }

    /// Locator of the original content of a photo
    fn original_url(photo: &RemotePhoto) -> std::result::Result<String, FlickrError> {
        if let Some(url) = &photo.url {
            return Ok(url.clone());
        }

        let unlocatable = |field: &str| FlickrError::Unlocatable {
            id: photo.id.clone(),
            reason: format!("missing {}", field),
        };

        let farm = photo.farm.as_deref().ok_or_else(|| unlocatable("farm"))?;
        let server = photo.server.as_deref().ok_or_else(|| unlocatable("server"))?;
        let secret = photo
            .original_secret
            .as_deref()
            .ok_or_else(|| unlocatable("original secret"))?;
        let format = photo
            .original_format
            .as_deref()
            .ok_or_else(|| unlocatable("original format"))?;

        Ok(format!(
            "https://farm{}.staticflickr.com/{}/{}_{}_o.{}",
            farm, server, photo.id, secret, format
        ))
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> std::result::Result<T, FlickrError> {
    serde_json::from_slice(&response.body)
        .map_err(|e| FlickrError::Malformed(format!("Failed to parse response: {}", e)))
}

fn status_error(response: &HttpResponse) -> FlickrError {
    FlickrError::HttpStatus {
        status_code: response.status,
        message: String::from_utf8_lossy(&response.body).chars().take(200).collect(),
    }
}

/// Total size from a `Content-Range: bytes a-b/TOTAL` header
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// Photo ID from an upload response, or the failure message
fn parse_upload_response(body: &str) -> std::result::Result<String, FlickrError> {
    if let Some(start) = body.find("<photoid") {
        let rest = &body[start..];
        if let (Some(open), Some(close)) = (rest.find('>'), rest.find("</photoid>")) {
            if open < close {
                let id = rest[open + 1..close].trim();
                if !id.is_empty() {
                    return Ok(id.to_string());
                }
            }
        }
    }

    let message = body
        .find("msg=\"")
        .map(|start| &body[start + 5..])
        .and_then(|rest| rest.find('"').map(|end| rest[..end].to_string()))
        .unwrap_or_else(|| "no photo ID in upload response".to_string());

    Err(FlickrError::UploadFailed(message))
}

fn multipart_body(boundary: &str, file_name: &str, content: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(content.len() + 256);
    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(
        format!(
            "Content-Disposition: form-data; name=\"photo\"; filename=\"{}\"\r\n",
            file_name.replace('"', "")
        )
        .as_bytes(),
    );
    body.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.put_slice(content);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body.freeze()
}

#[async_trait]
impl PhotoService for FlickrConnector {
    #[instrument(skip(self, extras))]
    async fn list_recently_updated(
        &self,
        page: u32,
        min_last_update: i64,
        extras: &[&str],
    ) -> Result<PhotoPage> {
        let params = [
            ("min_date", min_last_update.to_string()),
            ("page", page.to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("extras", extras.join(",")),
        ];

        let response: RecentlyUpdatedResponse =
            self.call("flickr.photos.recentlyUpdated", &params).await?;

        let container = response
            .photos
            .ok_or_else(|| FlickrError::Malformed("No photos in server response".to_string()))?;

        let photos = container
            .photo
            .into_iter()
            .map(|photo| photo.into_remote())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            page = container.page,
            pages = container.pages,
            count = photos.len(),
            "Listed recently updated photos"
        );

        Ok(PhotoPage {
            page: container.page,
            pages: container.pages,
            photos,
        })
    }

    #[instrument(skip(self, photo), fields(id = %photo.id))]
    async fn fetch_tail(&self, photo: &RemotePhoto, byte_count: usize) -> Result<TailBytes> {
        let url = Self::original_url(photo)?;
        let request = HttpRequest::new(HttpMethod::Get, url)
            .suffix_range(byte_count)
            .timeout(Duration::from_secs(60));

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await?;

        if !response.is_partial_content() {
            return Err(status_error(&response).into());
        }

        let total_size = response
            .header("Content-Range")
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                FlickrError::Malformed(format!("photo {} has no usable Content-Range", photo.id))
            })?;

        debug!(bytes = response.body.len(), total_size, "Fetched tail");

        Ok(TailBytes {
            bytes: response.body,
            total_size,
        })
    }

    #[instrument(skip(self, progress), fields(path = %path.display()))]
    async fn upload(&self, path: &Path, progress: Option<UploadProgress<'_>>) -> Result<String> {
        let content = tokio::fs::read(path).await?;
        let total = content.len() as u64;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());

        let boundary = format!("pif-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &file_name, &content);

        let request = HttpRequest::new(HttpMethod::Post, UPLOAD_ENDPOINT)
            .bearer_token(self.credentials.access_token.clone())
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(body)
            .timeout(Duration::from_secs(300));

        if let Some(progress) = progress {
            progress(0, total);
        }

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::no_retry())
            .await?;

        if !response.is_success() {
            return Err(status_error(&response).into());
        }

        let id = parse_upload_response(&response.text()?)?;

        if let Some(progress) = progress {
            progress(total, total);
        }

        info!(id = %id, bytes = total, "Uploaded photo");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::Mutex;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
            async fn execute_with_retry(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse>;
        }
    }

    fn credentials() -> ApiCredentials {
        ApiCredentials::new("test_key", "test_token").unwrap()
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn photo(id: &str) -> RemotePhoto {
        RemotePhoto {
            id: id.to_string(),
            original_format: Some("jpg".to_string()),
            original_secret: Some("1111111111".to_string()),
            secret: Some("xxxxxxxxxx".to_string()),
            farm: Some("4".to_string()),
            server: Some("3071".to_string()),
            width: Some(1544),
            height: Some(1024),
            size: None,
            date_upload: 1,
            last_update: 2,
            url: None,
        }
    }

    #[test]
    fn test_original_url_from_routing() {
        let url = FlickrConnector::original_url(&photo("2717638353")).unwrap();
        assert_eq!(
            url,
            "https://farm4.staticflickr.com/3071/2717638353_1111111111_o.jpg"
        );
    }

    #[test]
    fn test_original_url_prefers_direct_locator() {
        let mut p = photo("1");
        p.url = Some("https://live.staticflickr.com/1/1_abc_o.png".to_string());
        assert_eq!(
            FlickrConnector::original_url(&p).unwrap(),
            "https://live.staticflickr.com/1/1_abc_o.png"
        );

        p.url = None;
        p.original_secret = None;
        assert!(matches!(
            FlickrConnector::original_url(&p),
            Err(FlickrError::Unlocatable { .. })
        ));
    }

    #[test]
    fn test_content_range_parsing() {
        assert_eq!(parse_content_range_total("bytes 100-611/612"), Some(612));
        assert_eq!(parse_content_range_total("bytes 0-9/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_upload_response_parsing() {
        let ok = "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n<rsp stat=\"ok\">\n<photoid>1234</photoid>\n</rsp>";
        assert_eq!(parse_upload_response(ok).unwrap(), "1234");

        let fail = "<rsp stat=\"fail\">\n<err code=\"3\" msg=\"General upload failure\" />\n</rsp>";
        match parse_upload_response(fail) {
            Err(FlickrError::UploadFailed(msg)) => assert_eq!(msg, "General upload failure"),
            other => panic!("expected UploadFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_recently_updated() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert!(req.url.starts_with(REST_ENDPOINT));
                assert!(req.url.contains("method=flickr.photos.recentlyUpdated"));
                assert!(req.url.contains("min_date=201"));
                assert!(req.url.contains("page=2"));
                assert!(req.url.contains("extras=date_upload%2Clast_update"));
                assert!(req.url.contains("nojsoncallback=1"));
                assert_eq!(
                    req.headers.get("Authorization"),
                    Some(&"Bearer test_token".to_string())
                );

                Ok(json_response(
                    200,
                    r#"{"photos": {"page": 2, "pages": 3, "photo": [
                        {"id": "1", "server": "3071", "farm": 4, "dateupload": "100",
                         "lastupdate": "250", "o_width": "640", "o_height": "480",
                         "originalsecret": "abc", "originalformat": "png"}
                    ]}, "stat": "ok"}"#,
                ))
            });

        let connector = FlickrConnector::new(Arc::new(mock_http), credentials());
        let page = connector
            .list_recently_updated(2, 201, &["date_upload", "last_update"])
            .await
            .unwrap();

        assert_eq!((page.page, page.pages), (2, 3));
        assert_eq!(page.photos.len(), 1);
        assert_eq!(page.photos[0].last_update, 250);
        assert_eq!(page.photos[0].width, Some(640));
    }

    #[tokio::test]
    async fn test_missing_photos_container_is_protocol_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Ok(json_response(200, r#"{"stat": "ok"}"#)));

        let connector = FlickrConnector::new(Arc::new(mock_http), credentials());
        let result = connector.list_recently_updated(1, 1, &[]).await;

        assert!(matches!(result, Err(BridgeError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_api_failure_is_not_transient() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute_with_retry().times(1).returning(|_, _| {
            Ok(json_response(
                200,
                r#"{"stat": "fail", "code": 105, "message": "Service currently unavailable"}"#,
            ))
        });

        let connector = FlickrConnector::new(Arc::new(mock_http), credentials());
        let result = connector.list_recently_updated(1, 1, &[]).await;

        let err = result.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_tail() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, policy| {
                assert_eq!(policy.max_attempts, 1);
                assert_eq!(req.headers.get("Range"), Some(&"bytes=-512".to_string()));
                assert!(req.url.ends_with("/3071/42_1111111111_o.jpg"));

                let mut headers = HashMap::new();
                headers.insert("content-range".to_string(), "bytes 488-999/1000".to_string());
                Ok(HttpResponse {
                    status: 206,
                    headers,
                    body: Bytes::from(vec![7u8; 512]),
                })
            });

        let connector = FlickrConnector::new(Arc::new(mock_http), credentials());
        let tail = connector.fetch_tail(&photo("42"), 512).await.unwrap();

        assert_eq!(tail.bytes.len(), 512);
        assert_eq!(tail.total_size, 1000);
    }

    #[tokio::test]
    async fn test_fetch_tail_requires_partial_content() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Ok(json_response(200, "whole file")));

        let connector = FlickrConnector::new(Arc::new(mock_http), credentials());
        let result = connector.fetch_tail(&photo("42"), 512).await;

        match result {
            Err(err @ BridgeError::HttpStatus { status: 200, .. }) => assert!(!err.is_transient()),
            other => panic!("expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_tail_transport_error_is_transient() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Err(BridgeError::Network("connection reset".to_string())));

        let connector = FlickrConnector::new(Arc::new(mock_http), credentials());
        let err = connector.fetch_tail(&photo("42"), 512).await.unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_connect_checks_login() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert!(req.url.contains("method=flickr.test.login"));
                Ok(json_response(
                    200,
                    r#"{"user": {"id": "1@N00", "username": {"_content": "me"}}, "stat": "ok"}"#,
                ))
            });

        assert!(FlickrConnector::connect(Arc::new(mock_http), credentials())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute_with_retry().times(1).returning(|_, _| {
            Ok(json_response(
                200,
                r#"{"stat": "fail", "code": 98, "message": "Invalid auth token"}"#,
            ))
        });

        let result = FlickrConnector::connect(Arc::new(mock_http), credentials()).await;
        match result {
            Err(AuthError::AuthenticationFailed { provider, reason }) => {
                assert_eq!(provider, "flickr");
                assert!(reason.contains("Invalid auth token"));
            }
            Err(other) => panic!("expected AuthenticationFailed, got {}", other),
            Ok(_) => panic!("expected AuthenticationFailed"),
        }
    }

    #[tokio::test]
    async fn test_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holiday.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();

        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Post);
                assert_eq!(req.url, UPLOAD_ENDPOINT);
                let content_type = req.headers.get("Content-Type").unwrap();
                assert!(content_type.starts_with("multipart/form-data; boundary="));

                let body = String::from_utf8(req.body.unwrap().to_vec()).unwrap();
                assert!(body.contains("filename=\"holiday.jpg\""));
                assert!(body.contains("jpeg bytes"));

                Ok(json_response(
                    200,
                    "<rsp stat=\"ok\"><photoid>555</photoid></rsp>",
                ))
            });

        let reports = Mutex::new(Vec::new());
        let progress = |sent: u64, total: u64| reports.lock().unwrap().push((sent, total));

        let connector = FlickrConnector::new(Arc::new(mock_http), credentials());
        let id = connector.upload(&path, Some(&progress)).await.unwrap();

        assert_eq!(id, "555");
        assert_eq!(reports.into_inner().unwrap(), vec![(0, 10), (10, 10)]);
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let connector = FlickrConnector::new(Arc::new(MockHttpClient::new()), credentials());
        let result = connector
            .upload(Path::new("/nonexistent/photo.jpg"), None)
            .await;

        assert!(matches!(result, Err(BridgeError::Io(_))));
    }
}
