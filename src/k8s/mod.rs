pub mod cache;
pub mod client;
pub mod quantity;
pub mod source;

/// Default user agent for `nodeload` - automatically uses the package version
///
/// Every client should be built with `client::new(Some(USER_AGENT), ..)` so
/// API server audit logs can attribute the list calls made by a refresh.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
