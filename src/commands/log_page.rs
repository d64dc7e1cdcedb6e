use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plainhttp::{HttpError, Response};

use super::{render, CommandHandler};
use crate::app::Context;
use crate::security::SecurityProvider;

const CLEAR_BUTTON: &str = "<form action=\"log.html\" method=\"POST\">
<input type=\"submit\" name=\"ClearLog\" value=\"Clear log\"/>
</form>";


/// Shows the server log file, and lets admins clear it.
pub struct LogPage {
    security: Arc<SecurityProvider>,
    log_file: PathBuf,
}

impl LogPage {
    pub fn new(security: Arc<SecurityProvider>, log_file: PathBuf) -> Self {
        LogPage { security, log_file }
    }

    fn entries(&self) -> Result<String, HttpError> {
        let file = match std::fs::File::open(&self.log_file) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
            Err(err) => return Err(err.into()),
        };

        let mut html = String::new();
        for line in BufReader::new(file).split(b'\n') {
            let line = line?;
            let line = String::from_utf8_lossy(&line);
            html.push_str("<br/>\n");
            html.push_str(&html_escape::encode_text(line.trim_end_matches('\r')).replace(' ', "&nbsp;"));
        }
        Ok(html)
    }

    fn show(&self, ctx: &Context, template: &Path, entries: &str) -> Result<Response, HttpError> {
        let clear_button = if self.security.user_is_in_role(&ctx.path, "POST", ctx.user.as_ref()) {
            CLEAR_BUTTON
        } else {
            ""
        };
        render(template, &[("LogEntries", entries), ("ClearLogButton", clear_button)])
    }
}

impl CommandHandler for LogPage {
    fn handle_get(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        self.show(ctx, template, &self.entries()?)
    }

    fn handle_post(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        match ctx.request.form().get("ClearLog") {
            Some(value) if !value.is_empty() => {}
            _ => return self.handle_get(ctx, template),
        }

        OpenOptions::new().write(true).truncate(true).open(&self.log_file)?;
        log::info!("Log cleared by {}", ctx.user.as_ref().map(|u| u.name.as_str()).unwrap_or("anonymous"));
        self.show(ctx, template, "Log cleared!")
    }
}
