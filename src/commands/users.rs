use std::path::Path;
use std::sync::Arc;

use plainhttp::{HttpError, Response};
use uuid::Uuid;

use super::{render, CommandHandler};
use crate::app::Context;
use crate::security::SecurityProvider;
use crate::users::{User, UserStore};


pub struct UserOverviewPage {
    users: Arc<dyn UserStore>,
}

impl UserOverviewPage {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        UserOverviewPage { users }
    }
}

impl CommandHandler for UserOverviewPage {
    fn handle_get(&self, _ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        let mut list = String::new();
        for user in self.users.get_all()? {
            list.push_str(&format!(
                "<li><a href=\"/user/edit.html?id={}\">{}</a></li>\n",
                user.id,
                html_escape::encode_text(&user.name),
            ));
        }
        render(template, &[("UserList", &list)])
    }
}


/// Shows one user's roles and changes them.
pub struct UserEditPage {
    users: Arc<dyn UserStore>,
    security: Arc<SecurityProvider>,
}

impl UserEditPage {
    pub fn new(users: Arc<dyn UserStore>, security: Arc<SecurityProvider>) -> Self {
        UserEditPage { users, security }
    }

    fn user(&self, id: Option<&str>) -> Result<User, HttpError> {
        let id = id
            .and_then(|id| Uuid::parse_str(id.trim()).ok())
            .ok_or_else(|| HttpError::bad_request("Invalid user ID."))?;

        self.users.get_by_id(&id)?
            .ok_or_else(|| HttpError::not_found("User not found."))
    }
}

impl CommandHandler for UserEditPage {
    fn handle_get(&self, ctx: &Context, template: &Path) -> Result<Response, HttpError> {
        let user = self.user(ctx.request.query().get("id"))?;

        let mut roles = String::new();
        for role in self.security.roles() {
            let checked = if user.roles.iter().any(|r| r.eq_ignore_ascii_case(role)) {
                " checked=\"checked\""
            } else {
                ""
            };
            let role = html_escape::encode_double_quoted_attribute(role);
            roles.push_str(&format!(
                "<label><input type=\"checkbox\" name=\"Role\" value=\"{0}\"{1} /> {0}</label><br/>\r\n",
                role, checked
            ));
        }

        render(template, &[
            ("UserId", &user.id.to_string()),
            ("Username", &html_escape::encode_text(&user.name)),
            ("Roles", &roles),
        ])
    }

    /// Replaces the roles of the user named by `UserId` with the posted
    /// `Role` fields. Any unknown role rejects the whole update.
    fn handle_post(&self, ctx: &Context, _template: &Path) -> Result<Response, HttpError> {
        let form = ctx.request.form();
        let mut user = self.user(form.get("UserId"))?;

        let roles: Vec<String> = form.get_all("Role").map(String::from).collect();
        if !roles.iter().all(|role| self.security.role_exists(role)) {
            return Err(HttpError::bad_request("Invalid roles."));
        }

        user.roles = roles;
        self.users.update_roles(&user)?;
        Ok(Response::redirect("/user/overview.html"))
    }
}
