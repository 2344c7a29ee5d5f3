//! Redacting wrapper for bearer and refresh credentials.

// crates.io
use http::{HeaderValue, header::InvalidHeaderValue};
// self
use crate::_prelude::*;

/// Credential string that never prints its value through `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a credential string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw credential. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the credential carries no characters.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Renders the `Bearer <token>` authorization value, marked sensitive for HTTP stacks.
	pub fn bearer_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", self.0))?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn bearer_header_is_sensitive() {
		let header = TokenSecret::new("abc.def")
			.bearer_header()
			.expect("Printable tokens should form a header value.");

		assert_eq!(header.to_str().expect("Header should be ASCII."), "Bearer abc.def");
		assert!(header.is_sensitive());
		assert!(TokenSecret::new("line\nbreak").bearer_header().is_err());
	}
}
