//! Fixtures for driving a live bastion server in tests.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use bastion::config::AppConfig;
use bastion::users::User;


pub struct BastionInstance {
    pub server: bastion::Server,
    pub config: AppConfig,
    dir: tempfile::TempDir,
}

impl Drop for BastionInstance {
    fn drop(&mut self) {
        self.server.stop();
    }
}

/// A parsed response as it came off the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn status(&self) -> u16 {
        self.status_line
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn init_logging() {
    let _ = pretty_env_logger::try_init_timed();
}

/// The `www` directory shipped with the server.
pub fn shipped_web_root() -> PathBuf {
    let pkg_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let web_root = pkg_root.join("..").join("www");
    assert!(web_root.is_dir(), "Web root does not exist: {}", web_root.to_string_lossy());
    web_root
}

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).expect("Creating web root copy");
    for entry in std::fs::read_dir(from).expect("Reading web root") {
        let entry = entry.expect("Reading web root entry");
        let target = to.join(entry.file_name());
        if entry.file_type().expect("File type of web root entry").is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).expect("Copying web root file");
        }
    }
}

impl BastionInstance {
    /// Starts a server on an ephemeral port, serving a private copy of the
    /// shipped web root.
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    pub fn start_with<F: FnOnce(&mut AppConfig)>(customize: F) -> Self {
        init_logging();

        let dir = tempfile::tempdir().expect("Setting up temp directory");
        copy_dir(&shipped_web_root(), &dir.path().join("www"));

        let mut config = AppConfig::default();
        config.server.web_port = 0;
        config.server.web_root = dir.path().join("www");
        config.users.path = dir.path().join("users.toml");
        config.logging.file = dir.path().join("bastion.log");
        customize(&mut config);

        let config_path = dir.path().join("bastion.toml");
        let server = bastion::Server::start(config.clone(), Some(config_path))
            .expect("Unable to start bastion server");
        log::info!("Test server listening on port {}", server.port());

        BastionInstance { server, config, dir }
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://localhost:{}/{}", self.port(), path.trim_start_matches('/'))
    }

    pub fn web_root(&self) -> PathBuf {
        self.dir.path().join("www")
    }

    pub fn add_user(&self, name: &str, password: &str, roles: &[&str]) -> User {
        bastion::add_user(&self.config, name, password, roles).expect("Adding test user")
    }

    /// Sends `request` as is and reads until the server closes.
    pub fn raw_request(&self, request: &[u8]) -> RawResponse {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port())).expect("Connecting to server");
        stream.write_all(request).expect("Sending request");

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).expect("Reading response");
        parse_response(&raw)
    }

    pub fn get(&self, path: &str, token: Option<&str>) -> RawResponse {
        let cookie = token.map(|t| format!("Cookie: sessionToken={}\r\n", t)).unwrap_or_default();
        let request = format!("GET /{} HTTP/1.0\r\nHost: localhost:{}\r\n{}\r\n", path, self.port(), cookie);
        self.raw_request(request.as_bytes())
    }

    pub fn post_form(&self, path: &str, form: &str, token: Option<&str>) -> RawResponse {
        let cookie = token.map(|t| format!("Cookie: sessionToken={}\r\n", t)).unwrap_or_default();
        let request = format!(
            "POST /{} HTTP/1.0\r\nHost: localhost:{}\r\n{}Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            path, self.port(), cookie, form.len(), form
        );
        self.raw_request(request.as_bytes())
    }

    /// Logs in through the login page and returns the session token.
    pub fn login(&self, name: &str, password: &str) -> String {
        let response = self.post_form("login.html", &format!("Username={}&Password={}", name, password), None);
        assert_eq!(response.status(), 302, "Login failed: {:?}", response);

        let cookie = response.header("Set-Cookie").expect("Login sets a cookie");
        cookie.strip_prefix("sessionToken=").expect("Session cookie").to_string()
    }
}

pub fn parse_response(raw: &[u8]) -> RawResponse {
    let split = raw.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("Response has no end of headers");
    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let body = raw[split + 4..].to_vec();

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or("").to_string();
    let headers = lines
        .map(|line| {
            let mut parts = line.splitn(2, ':');
            let name = parts.next().unwrap_or("").trim().to_string();
            let value = parts.next().unwrap_or("").trim().to_string();
            (name, value)
        })
        .collect();

    RawResponse { status_line, headers, body }
}
