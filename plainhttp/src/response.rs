use std::fs::File;
use std::io::{self, Read, Write};

use super::{Headers, Status};

pub const HTTP_VERSION: &str = "HTTP/1.0";


/// What goes after the header block.
#[derive(Debug)]
pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// An open file, streamed when the response is written. `len` is taken
    /// from the file's metadata when the body is set.
    File { file: File, len: u64 },
}

impl Body {
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}


#[derive(Debug)]
pub struct Response {
    status: Status,
    headers: Headers,
    body: Body,
}

impl Response {
    pub fn ok() -> Self {
        Response::err(Status::Ok)
    }

    pub fn err(status: Status) -> Self {
        Response {
            status,
            headers: Headers::default(),
            body: Body::Empty,
        }
    }

    pub fn builder(status: Status) -> ResponseBuilder {
        ResponseBuilder {
            inner: Response::err(status),
        }
    }

    /// A `302 Found` pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        Response::builder(Status::Found).header("Location", location).build()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replaces the body; a previously set file is closed.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.headers.set("Content-Type", content_type);
    }

    /// Writes status line, headers and body to `stream`.
    ///
    /// `Content-Length` and `Connection` are always produced here, whatever
    /// the caller put into the headers: the length only for a non-empty
    /// body, and the connection is always closed afterwards.
    pub fn write_to<W: Write>(self, stream: &mut W) -> io::Result<()> {
        log::trace!("{} {}", HTTP_VERSION, self.status);
        write!(stream, "{} {} {}\r\n", HTTP_VERSION, self.status.code(), self.status.reason())?;

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("Content-Length") || name.eq_ignore_ascii_case("Connection") {
                continue;
            }
            write!(stream, "{}: {}\r\n", name, value)?;
        }

        let len = self.body.len();
        if len > 0 {
            write!(stream, "Content-Length: {}\r\n", len)?;
        }
        stream.write_all(b"Connection: close\r\n\r\n")?;

        match self.body {
            Body::Empty => {}
            Body::Bytes(bytes) => stream.write_all(&bytes)?,
            Body::File { file, len } => {
                let copied = io::copy(&mut file.take(len), stream)?;
                if copied < len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("file shrank while sending: {} of {} bytes", copied, len),
                    ));
                }
                log::trace!("Copied {} byte file to response", copied);
            }
        }

        stream.flush()
    }
}


pub struct ResponseBuilder {
    inner: Response,
}

impl ResponseBuilder {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner.headers.add(name, value);
        self
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.inner.set_content_type(content_type);
        self
    }

    pub fn body(mut self, b: Vec<u8>) -> Self {
        self.inner.body = Body::Bytes(b);
        self
    }

    pub fn body_from_string(self, s: &str) -> Self {
        self.body(s.as_bytes().to_vec())
    }

    pub fn send_file(mut self, file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        self.inner.body = Body::File { file, len };
        Ok(self)
    }

    pub fn build(self) -> Response {
        self.inner
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Seek;

    fn written(response: Response) -> String {
        let mut bytes = Vec::new();
        response.write_to(&mut bytes).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn writes_content_length_and_connection_for_a_body() {
        let result = written(
            Response::builder(Status::Ok)
                .content_type("text/plain")
                .body_from_string("Hello world")
                .build()
        );

        assert_eq!(
            result,
            "HTTP/1.0 200 OK\r\n\
            Content-Type: text/plain\r\n\
            Content-Length: 11\r\n\
            Connection: close\r\n\
            \r\n\
            Hello world"
        );
    }

    #[test]
    fn status_line_uses_spaced_reason_phrase() {
        let result = written(Response::err(Status::BadRequest));
        assert!(result.starts_with("HTTP/1.0 400 Bad Request\r\n"), "{}", result);
    }

    #[test]
    fn empty_body_has_no_content_length() {
        assert_eq!(written(Response::err(Status::NotFound)), "HTTP/1.0 404 Not Found\r\nConnection: close\r\n\r\n");
    }

    #[test]
    fn caller_supplied_length_and_connection_are_ignored() {
        let result = written(
            Response::builder(Status::Ok)
                .header("content-length", "999")
                .header("Connection", "keep-alive")
                .header("X-Kept", "yes")
                .body(b"abc".to_vec())
                .build()
        );

        assert_eq!(
            result,
            "HTTP/1.0 200 OK\r\n\
            X-Kept: yes\r\n\
            Content-Length: 3\r\n\
            Connection: close\r\n\
            \r\n\
            abc"
        );
    }

    #[test]
    fn duplicate_headers_are_all_written() {
        let result = written(
            Response::builder(Status::Found)
                .header("Set-Cookie", "a=1")
                .header("Set-Cookie", "b=2")
                .build()
        );
        assert!(result.contains("Set-Cookie: a=1\r\nSet-Cookie: b=2\r\n"), "{}", result);
    }

    #[test]
    fn file_body_is_streamed() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"<h1>static</h1>").unwrap();
        file.seek(io::SeekFrom::Start(0)).unwrap();

        let response = Response::builder(Status::Ok).send_file(file).unwrap().build();
        assert_eq!(response.body().len(), 15);

        let result = written(response);
        assert!(result.ends_with("Content-Length: 15\r\nConnection: close\r\n\r\n<h1>static</h1>"), "{}", result);
    }
}
