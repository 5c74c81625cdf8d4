/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public bitFlyer adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod realtime;
pub mod types;

// Re-export commonly used types from http
pub use http::{
    ApiKeyAuthenticator,
    Authenticator,
    BitflyerClient,
    BitflyerError,
    ClientConfig,
    Result,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from realtime
pub use realtime::{
    ChannelKey,
    ConnectionConfig,
    ConnectionState,
    OrderBook,
    REALTIME_ENDPOINT,
    RealtimeClient,
    RealtimeConfig,
    StreamKind,
};
