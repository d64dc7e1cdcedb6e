use std::fmt;


/// The status codes this server produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok = 200,
    NoContent = 204,

    MovedPermanently = 301,
    Found = 302,
    NotModified = 304,

    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    LengthRequired = 411,
    RequestEntityTooLarge = 413,
    RequestUriTooLong = 414,
    UnsupportedMediaType = 415,

    InternalServerError = 500,
    NotImplemented = 501,
    ServiceUnavailable = 503,
    HttpVersionNotSupported = 505,
}

impl Status {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let status = match code {
            200 => Status::Ok,
            204 => Status::NoContent,
            301 => Status::MovedPermanently,
            302 => Status::Found,
            304 => Status::NotModified,
            400 => Status::BadRequest,
            401 => Status::Unauthorized,
            403 => Status::Forbidden,
            404 => Status::NotFound,
            405 => Status::MethodNotAllowed,
            411 => Status::LengthRequired,
            413 => Status::RequestEntityTooLarge,
            414 => Status::RequestUriTooLong,
            415 => Status::UnsupportedMediaType,
            500 => Status::InternalServerError,
            501 => Status::NotImplemented,
            503 => Status::ServiceUnavailable,
            505 => Status::HttpVersionNotSupported,
            _ => return None,
        };
        Some(status)
    }

    /// The canonical name, as spelled in the enum.
    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NoContent => "NoContent",
            Status::MovedPermanently => "MovedPermanently",
            Status::Found => "Found",
            Status::NotModified => "NotModified",
            Status::BadRequest => "BadRequest",
            Status::Unauthorized => "Unauthorized",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "NotFound",
            Status::MethodNotAllowed => "MethodNotAllowed",
            Status::LengthRequired => "LengthRequired",
            Status::RequestEntityTooLarge => "RequestEntityTooLarge",
            Status::RequestUriTooLong => "RequestUriTooLong",
            Status::UnsupportedMediaType => "UnsupportedMediaType",
            Status::InternalServerError => "InternalServerError",
            Status::NotImplemented => "NotImplemented",
            Status::ServiceUnavailable => "ServiceUnavailable",
            Status::HttpVersionNotSupported => "HttpVersionNotSupported",
        }
    }

    /// The reason phrase for the status line.
    ///
    /// Derived from [`name`](Self::name) by putting a space in front of
    /// every uppercase letter after the first one: `BadRequest` becomes
    /// `Bad Request`. A few names don't survive that treatment and are
    /// spelled out instead.
    pub fn reason(self) -> String {
        match self {
            Status::Ok => return "OK".into(),
            Status::RequestUriTooLong => return "Request URI Too Long".into(),
            Status::HttpVersionNotSupported => return "HTTP Version Not Supported".into(),
            _ => {}
        }

        let name = self.name();
        let mut reason = String::with_capacity(name.len() + 4);
        for (idx, c) in name.chars().enumerate() {
            if idx > 0 && c.is_ascii_uppercase() {
                reason.push(' ');
            }
            reason.push(c);
        }
        reason
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.code())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reason_inserts_spaces_before_uppercase_letters() {
        assert_eq!(Status::BadRequest.reason(), "Bad Request");
        assert_eq!(Status::MethodNotAllowed.reason(), "Method Not Allowed");
        assert_eq!(Status::InternalServerError.reason(), "Internal Server Error");
        assert_eq!(Status::NotFound.reason(), "Not Found");
        assert_eq!(Status::Forbidden.reason(), "Forbidden");
    }

    #[test]
    fn reason_overrides_are_used_verbatim() {
        assert_eq!(Status::Ok.reason(), "OK");
        assert_eq!(Status::RequestUriTooLong.reason(), "Request URI Too Long");
        assert_eq!(Status::HttpVersionNotSupported.reason(), "HTTP Version Not Supported");
    }

    #[test]
    fn codes_map_back_to_statuses() {
        for code in &[200u16, 302, 400, 401, 403, 404, 405, 414, 415, 500, 505] {
            let status = Status::from_code(*code).unwrap();
            assert_eq!(status.code(), *code);
        }
        assert_eq!(Status::from_code(299), None);
    }
}
