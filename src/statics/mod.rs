//! Static file serving.
//!
//! Files under the configured static directory are served verbatim at their
//! relative path. Each route can be delayed or forced to 404 from the
//! control API. Byte ranges are not supported.

pub mod registry;

pub use registry::{StaticBroker, StaticRegistry, StaticSnapshot};
