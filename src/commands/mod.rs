//! Pages with server side logic.
//!
//! Each page is an HTML template in the web root with `{Placeholder}`
//! markers that the handler fills in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plainhttp::{HttpError, Response, Status};

use crate::app::{Context, Routes};
use crate::config::ConfigStore;
use crate::security::SecurityProvider;
use crate::users::UserStore;

mod config;
mod index;
mod log_page;
mod login;
mod users;


pub trait CommandHandler: Send + Sync {
    fn handle_get(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError>;

    /// Pages without a form treat POST like GET.
    fn handle_post(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        self.handle_get(ctx, template)
    }
}


/// The command pages keyed by their lowercase path.
pub fn routes(
    config: Arc<ConfigStore>,
    security: Arc<SecurityProvider>,
    users: Arc<dyn UserStore>,
    log_file: PathBuf,
) -> Routes {
    let mut routes = Routes::new();
    routes.insert("index.html", Box::new(index::IndexPage::new(security.clone())));
    routes.insert("config.html", Box::new(config::ConfigPage::new(config, security.clone())));
    routes.insert("log.html", Box::new(log_page::LogPage::new(security.clone(), log_file)));
    routes.insert("login.html", Box::new(login::LoginPage::new(security.clone())));
    routes.insert("logout.html", Box::new(login::LogoutPage::new(security.clone())));
    routes.insert("user/overview.html", Box::new(users::UserOverviewPage::new(users.clone())));
    routes.insert("user/edit.html", Box::new(users::UserEditPage::new(users, security)));
    routes
}

/// Reads `template` and swaps every `{Name}` for its value.
fn render(template: &Path, replacements: &[(&str, &str)]) -> Result<Response, HttpError> {
    let mut html = std::fs::read_to_string(template)?;
    for (name, value) in replacements {
        html = html.replace(&format!("{{{}}}", name), value);
    }

    Ok(Response::builder(Status::Ok)
        .content_type("text/html")
        .body_from_string(&html)
        .build())
}


#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::config::AppConfig;
    use crate::security::{sessions::Principal, RoleTable};
    use crate::users::{FileUserStore, User};
    use std::io::Cursor;

    /// Everything a page needs, rooted in a temporary directory.
    pub(crate) struct Site {
        pub dir: tempfile::TempDir,
        pub config: Arc<ConfigStore>,
        pub security: Arc<SecurityProvider>,
        pub users: Arc<FileUserStore>,
    }

    impl Site {
        pub fn new() -> Self {
            let _ = pretty_env_logger::try_init();
            let dir = tempfile::tempdir().unwrap();
            let mut config = AppConfig::default();
            config.server.web_root = dir.path().join("www");
            std::fs::create_dir_all(config.server.web_root.join("user")).unwrap();

            let rules = RoleTable::parse(config.security.rules.iter().map(|(p, r)| (p.as_str(), r.as_str()))).unwrap();
            let users = Arc::new(FileUserStore::new(dir.path().join("users.toml")));
            let security = Arc::new(SecurityProvider::new(users.clone(), rules, config.security.roles.clone()));

            Site {
                config: Arc::new(ConfigStore::new(config, None)),
                dir,
                security,
                users,
            }
        }

        pub fn template(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.dir.path().join("www").join(name);
            std::fs::write(&path, contents).unwrap();
            path
        }

        pub fn add_user(&self, name: &str, password: &str, roles: &[&str]) -> User {
            crate::security::test::add_user(&*self.users, name, password, roles)
        }
    }

    pub(crate) fn context(raw: &str, path: &str, user: Option<&User>) -> Context {
        Context {
            request: plainhttp::Request::parse(&mut Cursor::new(raw.as_bytes().to_vec())).unwrap().unwrap(),
            user: user.map(Principal::from),
            path: path.into(),
        }
    }

    pub(crate) fn body(response: Response) -> String {
        let mut bytes = Vec::new();
        response.write_to(&mut bytes).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        text.splitn(2, "\r\n\r\n").nth(1).unwrap_or("").to_string()
    }

    #[test]
    fn render_replaces_every_occurrence() {
        let site = Site::new();
        let template = site.template("t.html", "{A} and {A} but not {B}");
        let html = body(render(&template, &[("A", "x")]).unwrap());
        assert_eq!(html, "x and x but not {B}");
    }

    #[test]
    fn routes_cover_all_command_pages() {
        let site = Site::new();
        let routes = routes(site.config.clone(), site.security.clone(), site.users.clone(), site.dir.path().join("log"));
        let mut keys: Vec<_> = routes.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec![
            "config.html", "index.html", "log.html", "login.html", "logout.html",
            "user/edit.html", "user/overview.html",
        ]);
    }
}
