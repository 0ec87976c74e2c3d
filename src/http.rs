//! Transport primitives the gateway rides on.
//!
//! The gateway owns no wire format of its own; [`HttpTransport`] is its only
//! dependency on an HTTP stack. Error *statuses* are data (transports return
//! `Ok(ApiResponse)` for 4xx/5xx responses), while [`TransportError`] is
//! reserved for network/IO failures, which the gateway propagates unchanged and
//! never feeds into refresh logic.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::ConfigError, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// HTTP method subset used by the gateway surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// DELETE.
	Delete,
	/// GET.
	Get,
	/// PATCH.
	Patch,
	/// POST.
	Post,
	/// PUT.
	Put,
}
impl Method {
	/// Returns the canonical uppercase method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Delete => "DELETE",
			Method::Get => "GET",
			Method::Patch => "PATCH",
			Method::Post => "POST",
			Method::Put => "PUT",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request body shapes the gateway distinguishes.
#[derive(Clone, Debug)]
pub enum RequestBody {
	/// No body.
	Empty,
	/// JSON payload; the transport sets `Content-Type: application/json`.
	Json(serde_json::Value),
	/// Binary or multipart payload. The content type is never forced to JSON so
	/// boundary-based headers set by the caller (or transport) survive intact.
	Binary {
		/// Content type supplied by the caller, if any.
		content_type: Option<String>,
		/// Raw payload bytes.
		bytes: Vec<u8>,
	},
}
impl RequestBody {
	/// Returns `true` for JSON payloads.
	pub const fn is_json(&self) -> bool {
		matches!(self, RequestBody::Json(_))
	}
}

/// Caller-facing request addressed relative to the gateway's base URL.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Endpoint path, joined onto the gateway base URL (leading slash optional).
	pub path: String,
	/// Query parameters appended to the joined URL.
	pub query: Vec<(String, String)>,
	/// Extra headers; an explicit `authorization` header suppresses the vault bearer.
	pub headers: Vec<(String, String)>,
	/// Request body.
	pub body: RequestBody,
}
impl ApiRequest {
	/// Creates a request with no query, headers, or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), headers: Vec::new(), body: RequestBody::Empty }
	}

	/// Convenience constructor for GET requests.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Convenience constructor for POST requests.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, value: serde_json::Value) -> Self {
		self.body = RequestBody::Json(value);

		self
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	pub(crate) fn has_header(&self, name: &str) -> bool {
		self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
	}
}

/// Fully addressed request handed to the transport.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL, query included.
	pub url: Url,
	/// Final header list, bearer included when one applies.
	pub headers: Vec<(String, String)>,
	/// Request body.
	pub body: RequestBody,
}

/// Response surfaced by transports.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers (names lowercased by well-behaved transports).
	pub headers: Vec<(String, String)>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the first header matching `name`, case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_str())
	}

	/// Decodes the body as JSON, reporting the failing path on malformed payloads.
	pub fn json<T>(&self) -> Result<T, TransportError>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransportError::BodyDecode { source, status: Some(self.status) })
	}
}

/// Abstraction over HTTP stacks capable of executing gateway requests.
///
/// Implementations must report HTTP error statuses as `Ok` responses and reserve
/// [`TransportError`] for failures where no response was obtained at all.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the prepared request and collects the full response body.
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_, ApiResponse>;
}

/// Joins an endpoint path onto a base URL, tolerating missing or extra slashes.
pub fn join_endpoint(base: &Url, path: &str) -> Result<Url, ConfigError> {
	let trimmed = path.trim_start_matches('/');
	let base = if base.as_str().ends_with('/') {
		base.clone()
	} else {
		Url::parse(&format!("{}/", base.as_str()))
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?
	};

	base.join(trimmed)
		.map_err(|source| ConfigError::InvalidEndpointPath { path: path.to_owned(), source })
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Cancellation and timeouts are not implemented at the gateway layer; configure
/// them on the [`ReqwestClient`] passed to [`ReqwestTransport::with_client`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_, ApiResponse> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				Method::Delete => reqwest::Method::DELETE,
				Method::Get => reqwest::Method::GET,
				Method::Patch => reqwest::Method::PATCH,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
			};
			let mut builder = client.request(method, request.url);

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}

			builder = match request.body {
				RequestBody::Empty => builder,
				RequestBody::Json(value) => builder.json(&value),
				RequestBody::Binary { content_type, bytes } => {
					let mut builder = builder.body(bytes);

					if let Some(content_type) = content_type {
						builder = builder.header(CONTENT_TYPE, content_type);
					}

					builder
				},
			};

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned()))
				})
				.collect();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}
