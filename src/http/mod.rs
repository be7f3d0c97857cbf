//! HTTP types exchanged between the host and its actions.

mod request;
mod response;

pub use request::{HttpRequest, Method};
pub use response::{HttpResponse, StatusCode};
