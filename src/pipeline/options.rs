// crates.io
use http::{HeaderMap, HeaderName, HeaderValue};

/// Per-call overrides merged into a request before it is sent.
///
/// Caller headers take precedence over client defaults; the stored bearer credential is applied
/// last and always wins over both.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Extra headers for this call.
	pub headers: HeaderMap,
	/// Query pairs appended to the URL in insertion order.
	pub query: Vec<(String, String)>,
}
impl RequestOptions {
	/// Adds (or replaces) a header for this call.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Appends a query pair.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}
}
