pub mod decoded;
pub mod request;

pub use decoded::Decoded;
pub use request::{ContentType, Method, Request};
