//! Session credentials: redacted secrets, the persisted token pair, and renewal payloads.

pub mod secret;
pub mod session;

pub use secret::*;
pub use session::*;
