use std::path::Path;
use std::sync::Arc;

use plainhttp::{HttpError, Response};

use super::{render, CommandHandler};
use crate::app::Context;
use crate::config::{ConfigStore, ServerConfig};
use crate::security::SecurityProvider;


/// Shows and changes the server settings.
pub struct ConfigPage {
    config: Arc<ConfigStore>,
    security: Arc<SecurityProvider>,
}

impl ConfigPage {
    pub fn new(config: Arc<ConfigStore>, security: Arc<SecurityProvider>) -> Self {
        ConfigPage { config, security }
    }

    fn show(&self, ctx: &Context, template: &Path, server: &ServerConfig) -> Result<Response, HttpError> {
        let save_button = if self.security.user_is_in_role(&ctx.path, "POST", ctx.user.as_ref()) {
            "<td><input type=\"submit\" value=\"Save\"></td>"
        } else {
            ""
        };

        let web_root = server.web_root.to_string_lossy();
        let default_pages = server.default_pages.join(";");
        render(template, &[
            ("WebPort", &server.web_port.to_string()),
            ("WebRoot", &html_escape::encode_double_quoted_attribute(&web_root)),
            ("DefaultPages", &html_escape::encode_double_quoted_attribute(&default_pages)),
            ("DirectoryBrowsing", if server.directory_browsing { "checked='checked'" } else { "" }),
            ("SaveButton", save_button),
        ])
    }
}

impl CommandHandler for ConfigPage {
    fn handle_get(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        self.show(ctx, template, &self.config.server())
    }

    fn handle_post(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        let mut server = self.config.server();
        let previous_port = server.web_port;

        server.set_values(ctx.request.form());
        self.config.save(server.clone()).map_err(HttpError::server)?;
        log::info!("Configuration changed by {}", ctx.user.as_ref().map(|u| u.name.as_str()).unwrap_or("anonymous"));

        // Follow the server to its new port if the client addressed the one
        // it is talking to right now.
        if server.web_port != previous_port {
            let reached_port = ctx.request.local_addr()
                .map(|addr| addr.port())
                .unwrap_or(previous_port);
            if let Some(host) = ctx.request.headers().get("Host") {
                let mut parts = host.splitn(2, ':');
                let name = parts.next().unwrap_or("");
                if parts.next() == Some(reached_port.to_string().as_str()) {
                    return Ok(Response::redirect(&format!("http://{}:{}/{}", name, server.web_port, ctx.request.path())));
                }
            }
        }

        self.show(ctx, template, &server)
    }
}
