use std::path::Path;
use std::sync::Arc;

use plainhttp::{HttpError, Response};

use super::{render, CommandHandler};
use crate::app::Context;
use crate::security::SecurityProvider;


/// The home page, with links to whatever the visitor may use.
pub struct IndexPage {
    security: Arc<SecurityProvider>,
}

impl IndexPage {
    pub fn new(security: Arc<SecurityProvider>) -> Self {
        IndexPage { security }
    }

    fn links(&self, ctx: &Context) -> String {
        let user = match &ctx.user {
            None => return String::from("<li><a href=\"login.html\">Login</a></li>\n"),
            Some(user) => user,
        };

        let mut links = String::new();
        if self.security.user_is_in_role("config.html", "GET", Some(user)) {
            links.push_str("<li><a href=\"config.html\">Manage server configuration</a></li>\n");
        }
        if self.security.user_is_in_role("log.html", "GET", Some(user)) {
            links.push_str("<li><a href=\"log.html\">View server log</a></li>\n");
        }
        if self.security.user_is_in_role("user/overview.html", "GET", Some(user)) {
            links.push_str("<li><a href=\"user/overview.html\">Edit user permissions</a></li>\n");
        }
        links.push_str("<li><a href=\"logout.html\">Logout</a></li>\n");
        links
    }
}

impl CommandHandler for IndexPage {
    fn handle_get(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        render(template, &[("Links", &self.links(ctx))])
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::commands::test::{body, context, Site};

    const GET: &str = "GET /index.html HTTP/1.0\r\n\r\n";

    #[test]
    fn anonymous_visitors_get_a_login_link() {
        let site = Site::new();
        let template = site.template("index.html", "<ul>{Links}</ul>");
        let page = IndexPage::new(site.security.clone());

        let html = body(page.handle_get(&context(GET, "index.html", None), &template).unwrap());
        assert_eq!(html, "<ul><li><a href=\"login.html\">Login</a></li>\n</ul>");
    }

    #[test]
    fn links_follow_the_users_roles() {
        let site = Site::new();
        let template = site.template("index.html", "{Links}");
        let page = IndexPage::new(site.security.clone());

        let support = site.add_user("sam", "pw", &["support"]);
        let html = body(page.handle_get(&context(GET, "index.html", Some(&support)), &template).unwrap());
        assert!(html.contains("config.html"));
        assert!(!html.contains("user/overview.html"));
        assert!(html.contains("logout.html"));
        assert!(!html.contains("login.html"));

        let admin = site.add_user("ada", "pw", &["admin"]);
        let html = body(page.handle_post(&context(GET, "index.html", Some(&admin)), &template).unwrap());
        assert!(html.contains("user/overview.html"));
    }
}
