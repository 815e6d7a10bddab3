//! Client code for subrelay.
//!
//! This crate provides the outbound fetch pipeline, reference resolution
//! against the cache store, conversion requests and the relay pipelines
//! the server routes call into.

pub mod convert;
pub mod fetch;
pub mod relay;
pub mod resolve;

#[cfg(test)]
mod testing;

pub use convert::{ConversionRequest, FIXED_PARAMS};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher};
pub use relay::{
    ConvertRequest, RawOutput, RegisterReceipt, RegisterRequest, Relay, RelayOutput, RelaySettings,
    SubscriptionRequest,
};
pub use resolve::{ResolvedDocument, Resolver, describe};
