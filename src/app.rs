use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plainhttp::{paths, server::RequestHandler, HttpError, Method, Request, Response};

use crate::commands::CommandHandler;
use crate::config::{ConfigStore, ServerConfig};
use crate::security::{Principal, SecurityProvider};
use crate::static_files;


/// A request together with what the server worked out about it.
pub struct Context {
    pub request: Request,
    pub user: Option<Principal>,
    /// Normalized path relative to the web root, after default page
    /// resolution. Authorization and routing use this, not the raw path.
    pub path: String,
}

pub type Routes = HashMap<&'static str, Box<dyn CommandHandler>>;


pub struct Dispatcher {
    config: Arc<ConfigStore>,
    security: Arc<SecurityProvider>,
    routes: Routes,
}

impl Dispatcher {
    pub fn new(config: Arc<ConfigStore>, security: Arc<SecurityProvider>, routes: Routes) -> Self {
        log::debug!("Dispatching {} command pages", routes.len());
        Dispatcher { config, security, routes }
    }

    fn dispatch(&self, request: Request) -> Result<Response, HttpError> {
        let user = self.security.user_for(&request)?;
        let server = self.config.server();

        let (path, file) = resolve(&server, request.path())
            .ok_or_else(|| HttpError::bad_request("Invalid path."))?;

        let method = request.method().as_str();
        if !self.security.user_is_in_role(&path, method, user.as_ref()) {
            log::info!(
                "Denied {} /{} to {}",
                method, path, user.as_ref().map(|u| u.name.as_str()).unwrap_or("anonymous")
            );
            return Err(HttpError::forbidden("You are not authorized to access this resource."));
        }

        match request.method() {
            Method::GET | Method::POST => {}
            _ => {
                return Err(HttpError::method_not_allowed("Only the following methods are supported: GET, POST."));
            }
        }

        let ctx = Context { request, user, path };

        if file.is_file() {
            self.handle_file(&ctx, &file)
        } else if file.is_dir() {
            if !server.directory_browsing {
                return Err(HttpError::forbidden("Directory browsing is disabled."));
            }
            static_files::list_directory(&ctx.path, &file)
        } else {
            Err(HttpError::not_found("The specified resource was not found."))
        }
    }

    fn handle_file(&self, ctx: &Context, file: &Path) -> Result<Response, HttpError> {
        match self.routes.get(ctx.path.to_lowercase().as_str()) {
            Some(handler) => {
                log::trace!("Command page {}", ctx.path);
                match ctx.request.method() {
                    Method::POST => handler.handle_post(ctx, file),
                    _ => handler.handle_get(ctx, file),
                }
            }
            None => static_files::serve_file(file),
        }
    }
}

impl RequestHandler for Dispatcher {
    fn handle(&self, request: Request) -> Result<Response, HttpError> {
        let mut response = self.dispatch(request)?;
        add_security_headers(&mut response);
        Ok(response)
    }
}

/// Maps the request path onto the web root.
///
/// Returns the normalized relative path and the file it names, or `None`
/// if the path tries to leave the web root. An empty path becomes the
/// first default page that exists, else the web root itself.
fn resolve(server: &ServerConfig, request_path: &str) -> Option<(String, PathBuf)> {
    let path = paths::normalize(request_path)?;

    if path.is_empty() {
        for page in server.default_pages.iter() {
            let page = match paths::normalize(page) {
                Some(page) if !page.is_empty() => page,
                _ => continue,
            };
            if let Some(file) = paths::combine(&server.web_root, &page) {
                if file.is_file() {
                    return Some((page, file));
                }
            }
        }
    }

    let file = paths::combine(&server.web_root, &path)?;
    Some((path, file))
}

pub fn add_security_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.set(
        "Content-Security-Policy",
        "default-src 'self'; script-src 'unsafe-inline' 'unsafe-eval'",
    );
    headers.set("X-XSS-Protection", "1; mode=block");
}
