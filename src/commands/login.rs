use std::path::Path;
use std::sync::Arc;

use plainhttp::{HttpError, Response};

use super::{render, CommandHandler};
use crate::app::Context;
use crate::security::SecurityProvider;


pub struct LoginPage {
    security: Arc<SecurityProvider>,
}

impl LoginPage {
    pub fn new(security: Arc<SecurityProvider>) -> Self {
        LoginPage { security }
    }
}

impl CommandHandler for LoginPage {
    fn handle_get(&self, _ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        render(template, &[])
    }

    /// Checks the posted credentials; on success the browser gets the
    /// session cookie and goes back to the home page.
    fn handle_post(&self, ctx: &Context, _template: &Path) -> Result<Response, HttpError> {
        let form = ctx.request.form();
        let username = form.get("Username").unwrap_or("");
        let password = form.get("Password").unwrap_or("");

        match self.security.authenticate(username, password)? {
            Some(token) => {
                let mut response = Response::redirect("/");
                response.headers_mut().add("Set-Cookie", SecurityProvider::login_cookie(&token));
                Ok(response)
            }
            None => Err(HttpError::unauthorized("Invalid credentials.")),
        }
    }
}


pub struct LogoutPage {
    security: Arc<SecurityProvider>,
}

impl LogoutPage {
    pub fn new(security: Arc<SecurityProvider>) -> Self {
        LogoutPage { security }
    }
}

impl CommandHandler for LogoutPage {
    fn handle_get(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        self.security.logout(&ctx.request);

        let mut response = render(template, &[])?;
        response.headers_mut().add("Set-Cookie", SecurityProvider::logout_cookie());
        Ok(response)
    }
}
