//! Request construction for the upload endpoint.
//!
//! Building is pure: nothing here touches the network. The resulting
//! [`UploadRequest`] is turned into a `reqwest` request only at dispatch.

use boxdrop_transfer::ProgressBody;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, Url};

/// Header carrying per-message flags.
pub const HEADER_MESSAGE_FLAGS: &str = "X-Message-Flags";

/// Flag value marking an end-to-end encrypted payload.
pub const FLAG_ENCRYPTED: &str = "encrypted";

/// Content type used when the caller does not supply one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Request payload.
pub enum RequestBody {
    Empty,
    Bytes(Vec<u8>),
    /// Streamed from a source; `length` is sent as `Content-Length`.
    Stream { body: ProgressBody, length: u64 },
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// A fully described request to the endpoint.
pub struct UploadRequest {
    pub method: Method,
    pub url: Url,
    /// Only set on `POST`.
    pub content_type: Option<String>,
    pub headers: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl UploadRequest {
    /// Value of an extra header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn into_builder(self, http: &reqwest::Client) -> reqwest::RequestBuilder {
        let mut builder = http.request(self.method, self.url);
        if let Some(content_type) = self.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        match self.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream { body, length } => builder
                .header(CONTENT_LENGTH, length)
                .body(reqwest::Body::wrap_stream(body)),
        }
    }
}

/// Builds a generic endpoint request.
///
/// A `GET` is produced when there is no `content` and `force_post` is
/// false; otherwise a `POST` with `Content-Type` set to `mime` (or
/// [`DEFAULT_CONTENT_TYPE`]). `params` are appended to the URL as a UTF-8
/// form-urlencoded query, in order.
pub fn prepare(
    base: &Url,
    params: Option<&[(String, String)]>,
    mime: Option<&str>,
    content: Option<Vec<u8>>,
    force_post: bool,
) -> UploadRequest {
    let mut url = base.clone();
    if let Some(params) = params.filter(|p| !p.is_empty()) {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    if content.is_none() && !force_post {
        return UploadRequest {
            method: Method::GET,
            url,
            content_type: None,
            headers: Vec::new(),
            body: RequestBody::Empty,
        };
    }

    UploadRequest {
        method: Method::POST,
        url,
        content_type: Some(mime.unwrap_or(DEFAULT_CONTENT_TYPE).to_string()),
        headers: Vec::new(),
        body: content.map_or(RequestBody::Empty, RequestBody::Bytes),
    }
}

/// Builds the streaming `POST` used for uploads.
///
/// The body length is taken from `body`; the encrypted flag header is
/// added when `encrypted` is set.
pub fn prepare_upload(
    base: &Url,
    mime: Option<&str>,
    body: ProgressBody,
    encrypted: bool,
) -> UploadRequest {
    let mut request = prepare(base, None, mime, None, true);
    let length = body.total();
    request.body = RequestBody::Stream { body, length };
    if encrypted {
        request
            .headers
            .push((HEADER_MESSAGE_FLAGS, FLAG_ENCRYPTED.to_string()));
    }
    request
}
