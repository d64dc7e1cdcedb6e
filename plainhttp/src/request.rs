use std::io::{BufRead, Read};
use std::net::SocketAddr;

use percent_encoding::percent_decode_str;

use super::form::{self, Charset, Fields};
use super::{Headers, HttpError, Method, Status};

/// Longest line we accept in the request head.
const LINE_LEN_LIMIT: usize = 64 * 1024;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";


/// A parsed HTTP request.
///
/// Created by [`Request::parse`] and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    query_string: String,
    query: Fields,
    version: String,
    headers: Headers,
    form: Fields,
    body: Option<Vec<u8>>,
    peer: Option<SocketAddr>,
    local: Option<SocketAddr>,
}

impl Request {
    /// Reads one request from `reader`.
    ///
    /// Returns `Ok(None)` when the stream ends before a request line shows
    /// up or the first line is empty; the client simply went away.
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Option<Request>, HttpError> {
        let request_line = match read_line_limited(reader, LINE_LEN_LIMIT)? {
            Some(line) if !line.is_empty() => line,
            _ => return Ok(None),
        };

        let mut request = Request::from_request_line(&request_line)?;
        log::trace!("Request line: {} {} {}", request.method.as_str(), request.target, request.version);

        // A stream that ends inside the header block just ends the block.
        while let Some(line) = read_line_limited(reader, LINE_LEN_LIMIT)? {
            if line.is_empty() {
                break;
            }
            request.add_header_line(&line);
        }

        request.read_body(reader)?;
        Ok(Some(request))
    }

    fn from_request_line(line: &str) -> Result<Self, HttpError> {
        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() != 3 {
            log::debug!("Malformed request line: {:?}", line);
            return Err(HttpError::bad_request("Request-Line malformed."));
        }

        let method = Method::from_token(&parts[0].to_ascii_uppercase());
        let target = parts[1].to_string();
        let version = parts[2].to_string();

        let mut target_parts = target.trim_matches('/').splitn(2, '?');
        let raw_path = target_parts.next().unwrap_or("");
        let query_string = target_parts.next().unwrap_or("").to_string();

        let path = percent_decode_str(raw_path).decode_utf8_lossy().into_owned();
        let query = form::parse(query_string.as_bytes(), Charset::Utf8);

        Ok(Request {
            method,
            target,
            path,
            query_string,
            query,
            version,
            headers: Headers::default(),
            form: Fields::default(),
            body: None,
            peer: None,
            local: None,
        })
    }

    fn add_header_line(&mut self, line: &str) {
        let mut parts = line.splitn(2, ':');
        let name = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        self.headers.add(name, value);
    }

    fn read_body<R: Read>(&mut self, reader: &mut R) -> Result<(), HttpError> {
        let content_length = match self.headers.get("Content-Length") {
            Some(value) if !value.is_empty() => value,
            _ => return Ok(()),
        };
        let content_length: u64 = content_length.parse().map_err(|_| {
            HttpError::bad_request("Invalid Content-Length header value.")
        })?;

        let mut body = Vec::with_capacity(content_length.min(LINE_LEN_LIMIT as u64) as usize);
        reader.by_ref().take(content_length).read_to_end(&mut body)?;
        if (body.len() as u64) < content_length {
            log::debug!("Body ended after {} of {} bytes", body.len(), content_length);
            return Err(HttpError::bad_request("Request body is shorter than its Content-Length."));
        }
        log::trace!("Read {} byte body", body.len());

        if let Some(charset) = self.form_charset()? {
            self.form = form::parse(&body, charset);
        }
        self.body = Some(body);
        Ok(())
    }

    /// The charset to decode the body with if it holds urlencoded form data.
    fn form_charset(&self) -> Result<Option<Charset>, HttpError> {
        let content_type = match self.headers.get("Content-Type") {
            Some(value) if !value.is_empty() => value,
            _ => return Ok(None),
        };

        let mut parts = content_type.split(';');
        let media_type = parts.next().unwrap_or("").trim();
        if !media_type.eq_ignore_ascii_case(FORM_URLENCODED) {
            // multipart/form-data ends up here too; we don't parse it.
            return Ok(None);
        }

        let label = parts
            .map(str::trim)
            .find(|part| part.get(..7).map_or(false, |p| p.eq_ignore_ascii_case("charset")))
            .and_then(|part| part.splitn(2, '=').nth(1))
            .map(str::trim)
            .unwrap_or("");

        if label.is_empty() {
            return Ok(Some(Charset::default()));
        }
        match Charset::from_label(label) {
            Some(charset) => Ok(Some(charset)),
            None => Err(HttpError::client(
                Status::UnsupportedMediaType,
                format!("Unsupported form charset: {}", label),
            )),
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Records the address the connection was accepted on.
    pub fn with_local(mut self, local: SocketAddr) -> Self {
        self.local = Some(local);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as it appeared in the request line.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The decoded path without leading or trailing slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn query(&self) -> &Fields {
        &self.query
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn form(&self) -> &Fields {
        &self.form
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    /// Iterates over all cookies sent in any `Cookie` header.
    pub fn cookies(&self) -> impl Iterator<Item=(&str, &str)> {
        self.headers
            .get_all("Cookie")
            .flat_map(|header| header.split(';'))
            .map(|cookie| {
                let mut parts = cookie.splitn(2, '=');
                let name = parts.next().unwrap_or("").trim();
                let value = parts.next().unwrap_or("").trim();
                (name, value)
            })
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}


/// Reads up to the next `\n`, returning the line without its terminator
/// (a trailing `\r` is dropped as well).
///
/// Returns `None` if the stream ends before the line is complete.
fn read_line_limited<R: BufRead>(reader: &mut R, line_len_limit: usize) -> Result<Option<String>, HttpError> {
    let mut buf = Vec::new();
    loop {
        let cur = reader.fill_buf()?;
        if cur.is_empty() {
            return Ok(None);
        }

        if let Some(newline) = cur.iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&cur[..newline]);
            reader.consume(newline + 1);
            break;
        }

        let len = cur.len();
        buf.extend_from_slice(cur);
        reader.consume(len);

        if buf.len() > line_len_limit {
            return Err(HttpError::bad_request("Header line too long."));
        }
    }

    if buf.len() > line_len_limit {
        return Err(HttpError::bad_request("Header line too long."));
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
