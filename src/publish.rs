//! Upload the rendered image to the Telegram `sendPhoto` endpoint.
//!
//! The HTTP client sits behind [`HttpTransport`]; [`ReqwestTransport`] is the
//! production implementation (feature `http`).

use crate::caption::truncate_caption;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PHOTO_FIELD: &str = "photo";
pub const PHOTO_FILENAME: &str = "fortune.png";
pub const PHOTO_MIME: &str = "image/png";
pub const PARSE_MODE: &str = "HTML";

/// How much of an error body is kept in [`Error::HttpStatus`].
const ERROR_BODY_LIMIT: usize = 512;

/// File part of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub mime: String,
    pub data: Vec<u8>,
}

/// A multipart form: text fields plus one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub fields: Vec<(String, String)>,
    pub file: FilePart,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a multipart POST.
///
/// Implementations report connection, timeout and body-read failures as
/// [`Error::Network`]; any status code is returned as a response.
pub trait HttpTransport {
    fn post(&self, url: &str, form: UploadForm, timeout: Duration) -> Result<HttpResponse>;
}

/// Parsed `sendPhoto` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UploadResult {
    pub fn message_id(&self) -> Option<i64> {
        self.result.as_ref()?.get("message_id")?.as_i64()
    }
}

impl std::fmt::Display for UploadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Posts photos to one chat
pub struct Publisher {
    api_base: String,
    token: String,
    chat_id: String,
    transport: Box<dyn HttpTransport>,
}

impl Publisher {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
        transport: Box<dyn HttpTransport>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            token: token.into(),
            chat_id: chat_id.into(),
            transport,
        }
    }

    /// `sendPhoto` URL. Contains the bot token, so it must not be logged.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendPhoto",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }

    pub fn build_form(&self, image: &[u8], caption: Option<&str>) -> UploadForm {
        let mut fields = vec![("chat_id".to_string(), self.chat_id.clone())];
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            fields.push(("caption".to_string(), truncate_caption(caption)));
            fields.push(("parse_mode".to_string(), PARSE_MODE.to_string()));
        }

        UploadForm {
            fields,
            file: FilePart {
                field: PHOTO_FIELD.to_string(),
                filename: PHOTO_FILENAME.to_string(),
                mime: PHOTO_MIME.to_string(),
                data: image.to_vec(),
            },
        }
    }

    /// Upload `image` with an optional caption.
    ///
    /// Non-2xx statuses become [`Error::HttpStatus`] before the body is parsed;
    /// a 2xx body that is not a JSON object becomes [`Error::InvalidResponse`].
    pub fn post_image(
        &self,
        image: &[u8],
        caption: Option<&str>,
        timeout: Duration,
    ) -> Result<UploadResult> {
        let form = self.build_form(image, caption);
        let response = self.transport.post(&self.endpoint(), form, timeout)?;

        if !response.is_success() {
            let body: String = String::from_utf8_lossy(&response.body)
                .chars()
                .take(ERROR_BODY_LIMIT)
                .collect();
            return Err(Error::HttpStatus {
                status: response.status,
                body,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[cfg(feature = "http")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::{HttpResponse, HttpTransport, UploadForm};
    use crate::{Error, Result};
    use reqwest::blocking::multipart::{Form, Part};
    use reqwest::blocking::Client;
    use std::time::Duration;
    use url::Url;

    /// Blocking reqwest client
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self> {
            let client = Client::builder()
                .user_agent(concat!("fortune-bot/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self { client })
        }
    }

    impl HttpTransport for ReqwestTransport {
        fn post(&self, url: &str, form: UploadForm, timeout: Duration) -> Result<HttpResponse> {
            let url = Url::parse(url)
                .map_err(|e| Error::Config(format!("invalid API base URL: {}", e)))?;

            let file = form.file;
            let part = Part::bytes(file.data)
                .file_name(file.filename)
                .mime_str(&file.mime)
                .map_err(|e| Error::Other(format!("invalid MIME type {}: {}", file.mime, e)))?;

            let mut multipart = Form::new();
            for (name, value) in form.fields {
                multipart = multipart.text(name, value);
            }
            multipart = multipart.part(file.field, part);

            let response = self
                .client
                .post(url)
                .multipart(multipart)
                .timeout(timeout)
                .send()
                .map_err(|e| Error::Network(e.without_url().to_string()))?;

            let status = response.status().as_u16();
            let body = response
                .bytes()
                .map_err(|e| {
                    Error::Network(format!("failed to read response body: {}", e.without_url()))
                })?;

            Ok(HttpResponse {
                status,
                body: body.to_vec(),
            })
        }
    }
}
