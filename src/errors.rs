use std::fs::File;
use std::sync::Arc;

use plainhttp::{paths, server::ErrorHandler, HttpError, Response, Status};

use crate::app::add_security_headers;
use crate::config::ConfigStore;


/// Turns errors into responses, preferring `ErrorPages/<code>.html` from
/// the web root when it exists.
pub struct PageErrorHandler {
    config: Arc<ConfigStore>,
}

impl PageErrorHandler {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        PageErrorHandler { config }
    }

    fn error_page(&self, status: Status) -> Option<Response> {
        let root = self.config.server().web_root;
        let page = paths::combine(&root, &format!("ErrorPages/{}.html", status.code()))?;
        if !page.is_file() {
            return None;
        }

        let opened = File::open(&page)
            .and_then(|file| Response::builder(status).content_type("text/html").send_file(file));
        match opened {
            Ok(builder) => Some(builder.build()),
            Err(err) => {
                log::warn!("Unable to open error page {}: {}", page.to_string_lossy(), err);
                None
            }
        }
    }
}

impl ErrorHandler for PageErrorHandler {
    fn handle(&self, error: HttpError) -> Response {
        match &error {
            HttpError::ClientError(status, message) => {
                log::debug!("Client error {}: {}", status.code(), message);
            }
            other => log::error!("Unexpected error handling request: {:?}", other),
        }

        let status = error.status();
        let mut response = match self.error_page(status) {
            Some(response) => response,
            None => match error.public_message() {
                Some(message) => {
                    Response::builder(status)
                        .content_type("text/plain")
                        .body_from_string(message)
                        .build()
                }
                None => Response::err(status),
            },
        };

        add_security_headers(&mut response);
        response
    }
}
