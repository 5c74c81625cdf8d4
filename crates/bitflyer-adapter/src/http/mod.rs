/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod private;
pub mod public;
pub mod signature;

pub use error::{BitflyerError, Result};
pub use signature::{ApiKeyAuthenticator, Authenticator};

pub use client::{API_BASE_URL, BitflyerClient, ClientConfig};
