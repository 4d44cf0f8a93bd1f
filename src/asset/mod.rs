//! Asset accessor implementations.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpAssetAccessor;
