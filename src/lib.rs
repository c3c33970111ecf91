pub mod buffer;
pub mod config;
pub mod connection;
pub mod escape;
pub mod exception;
pub mod param;
pub mod range;
pub mod request;
pub mod response;
pub mod status;

pub use buffer::{OutputBuffer, Transport};
pub use config::Config;
pub use connection::Connection;
pub use exception::Exception;
pub use param::{HttpRequestMethod, HttpVersion};
pub use range::{parse_range, resolve_ranges, ByteRange, RangeList, RangePool};
pub use request::Request;
pub use status::ConnectionStatus;
