//! A small blocking HTTP/1.0 toolkit.
//!
//! The crate covers the wire side of a one-request-per-connection server:
//! parsing a [`Request`] from a byte stream, writing a [`Response`] back,
//! and a [`server::Listener`] that hands every accepted connection to its
//! own worker thread.

use std::borrow::Cow;
use std::io;

use thiserror::Error;

pub mod form;
pub mod paths;
pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use request::Request;
pub use response::{Body, Response, ResponseBuilder};
pub use status::Status;


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    OPTIONS,
    Other(String),
}

impl Method {
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "OPTIONS" => Method::OPTIONS,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
            Method::Other(token) => token,
        }
    }
}


/// Ordered header multi-map.
///
/// Names keep the spelling they arrived with; lookups ignore ASCII case.
/// Duplicate names are kept in insertion order (think multiple `Cookie`
/// lines).
#[derive(Debug, Clone, Default)]
pub struct Headers {
    data: Vec<(String, String)>,
}

impl Headers {
    pub fn add<N, V>(&mut self, name: N, value: V)
        where N: Into<String>, V: Into<String> {
        self.data.push((name.into(), value.into()));
    }

    /// Replaces every value stored under `name` with a single one.
    pub fn set<N, V>(&mut self, name: N, value: V)
        where N: Into<String>, V: Into<String> {
        let name = name.into();
        self.remove(&name);
        self.data.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.data.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item=&'a str> + 'a {
        self.data.iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.data.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item=(&str, &str)> {
        self.data.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}


/// Everything that can go wrong between reading a request and producing its
/// response.
///
/// `ClientError` is raised on purpose and its message is meant for the
/// client. The other variants are unexpected; they map to a bare 500 and
/// their detail only goes to the log.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Error reading or writing stream: {0}")]
    StreamError(#[from] io::Error),
    #[error("Server error: {0}")]
    ServerError(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("{1} ({0})")]
    ClientError(Status, Cow<'static, str>),
}

impl HttpError {
    pub fn client<M: Into<Cow<'static, str>>>(status: Status, message: M) -> Self {
        HttpError::ClientError(status, message.into())
    }

    pub fn bad_request<M: Into<Cow<'static, str>>>(message: M) -> Self {
        Self::client(Status::BadRequest, message)
    }

    pub fn unauthorized<M: Into<Cow<'static, str>>>(message: M) -> Self {
        Self::client(Status::Unauthorized, message)
    }

    pub fn forbidden<M: Into<Cow<'static, str>>>(message: M) -> Self {
        Self::client(Status::Forbidden, message)
    }

    pub fn not_found<M: Into<Cow<'static, str>>>(message: M) -> Self {
        Self::client(Status::NotFound, message)
    }

    pub fn method_not_allowed<M: Into<Cow<'static, str>>>(message: M) -> Self {
        Self::client(Status::MethodNotAllowed, message)
    }

    pub fn server<E>(err: E) -> Self
        where E: Into<Box<dyn std::error::Error + Send + Sync + 'static>> {
        HttpError::ServerError(err.into())
    }

    pub fn status(&self) -> Status {
        match self {
            HttpError::ClientError(status, _) => *status,
            _ => Status::InternalServerError,
        }
    }

    /// The message that may be shown to the client, if any.
    pub fn public_message(&self) -> Option<&str> {
        match self {
            HttpError::ClientError(_, message) => Some(message),
            _ => None,
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_lookup_ignores_case_and_keeps_duplicates() {
        let mut headers = Headers::default();
        headers.add("Cookie", "a=1");
        headers.add("cookie", "b=2");
        headers.add("Host", "localhost");

        assert_eq!(headers.get("COOKIE"), Some("a=1"));
        assert_eq!(headers.get_all("Cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn set_header_replaces_all_previous_values() {
        let mut headers = Headers::default();
        headers.add("Location", "/a");
        headers.add("location", "/b");
        headers.set("Location", "/c");

        assert_eq!(headers.get_all("location").collect::<Vec<_>>(), vec!["/c"]);
    }

    #[test]
    fn unexpected_errors_hide_their_detail() {
        let err = HttpError::from(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(err.status(), Status::InternalServerError);
        assert_eq!(err.public_message(), None);

        let err = HttpError::forbidden("Nope.");
        assert_eq!(err.status(), Status::Forbidden);
        assert_eq!(err.public_message(), Some("Nope."));
    }
}
