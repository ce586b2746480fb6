use std::time::Duration;

use facetrain_logging::{ft_debug, ft_warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::{
    ApiError, ApiRequest, ApiResponse, FailureKind, HttpMethod, MultipartField, RequestBody,
    UploadContents, UploadFile,
};

pub const DEFAULT_BASE_URL: &str = "https://facerecognition.mpanel.app";

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applied to calls using [`crate::CallTimeout::Default`].
    pub default_timeout: Duration,
    /// Sent verbatim as the `Authorization` header, without a scheme prefix.
    pub auth_token: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            default_timeout: Duration::from_secs(30),
            auth_token: None,
        }
    }
}

/// The seam between typed services and the wire. The concrete strategy is
/// chosen once at startup: [`ReqwestTransport`] for the real API,
/// [`crate::FixtureTransport`] for canned data.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: TransportSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let raw = format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, format!("{raw}: {err}")))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request)?;
        let timeout = request.timeout.resolve(self.settings.default_timeout);
        ft_debug!("{} {} timeout={:?}", request.method, request.path, timeout);

        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, url).timeout(timeout);
        if let Some(token) = &self.settings.auth_token {
            builder = builder.header(AUTHORIZATION, token.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => {
                let encoded = serde_json::to_vec(&body)
                    .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
                builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(encoded)
            }
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields).await?),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if !(200..300).contains(&status) {
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            let err = status_error(status, &body);
            ft_warn!("{} {} failed: {} ({})", request.method, request.path, err, err.kind);
            return Err(err);
        }

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?
        };
        Ok(ApiResponse { status, body })
    }
}

/// Error for a non-2xx response, preferring the server's own message.
pub(crate) fn status_error(status: u16, body: &Value) -> ApiError {
    let message = body_message(body);
    let message = message.unwrap_or_else(|| format!("http status {status}"));
    let kind = match status {
        401 | 403 => FailureKind::Unauthorized(status),
        _ => FailureKind::HttpStatus(status),
    };
    ApiError::new(kind, message)
}

pub(crate) fn body_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|message| !message.is_empty())
        .map(ToOwned::to_owned)
}

async fn build_form(fields: Vec<MultipartField>) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name, value),
            MultipartField::File { name, file } => form.part(name, file_part(file).await?),
        };
    }
    Ok(form)
}

async fn file_part(file: UploadFile) -> Result<Part, ApiError> {
    let part = match file.contents {
        UploadContents::Memory(bytes) => Part::stream_with_length(bytes, file.size_bytes),
        UploadContents::Disk(path) => {
            let handle = tokio::fs::File::open(&path).await.map_err(|err| {
                ApiError::new(FailureKind::Io, format!("{}: {err}", path.display()))
            })?;
            Part::stream_with_length(
                reqwest::Body::wrap_stream(ReaderStream::new(handle)),
                file.size_bytes,
            )
        }
    };
    part.file_name(file.file_name)
        .mime_str("application/octet-stream")
        .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ApiError::new(FailureKind::InvalidUrl, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
