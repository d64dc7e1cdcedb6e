//! Authentication and authorization.

use std::sync::Arc;

use plainhttp::{HttpError, Request};

use crate::users::UserStore;

pub mod password;
pub mod rules;
pub mod sessions;

pub use rules::RoleTable;
pub use sessions::{Principal, SessionCache};

pub const SESSION_COOKIE: &str = "sessionToken";


pub struct SecurityProvider {
    users: Arc<dyn UserStore>,
    sessions: SessionCache,
    rules: Arc<RoleTable>,
    roles: Vec<String>,
}

impl SecurityProvider {
    pub fn new(users: Arc<dyn UserStore>, rules: RoleTable, roles: Vec<String>) -> Self {
        SecurityProvider::with_sessions(users, rules, roles, SessionCache::default())
    }

    pub fn with_sessions(
        users: Arc<dyn UserStore>,
        rules: RoleTable,
        roles: Vec<String>,
        sessions: SessionCache,
    ) -> Self {
        SecurityProvider {
            users,
            sessions,
            rules: Arc::new(rules),
            roles,
        }
    }

    /// Checks the credentials and starts a session for them.
    ///
    /// Returns the session token, or `None` if the user is unknown or the
    /// password is wrong.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<String>, HttpError> {
        let user = match self.users.get_by_name(username)? {
            Some(user) => user,
            None => {
                log::info!("Login attempt for unknown user {:?}", username);
                return Ok(None);
            }
        };

        if !password::verify(username, password, &user.password_salt, &user.password_hash) {
            log::info!("Wrong password for user {}", user.name);
            return Ok(None);
        }

        log::info!("User {} logged in", user.name);
        Ok(Some(self.sessions.create(Principal::from(&user))))
    }

    /// Ends the session named by the request's cookie, if any.
    pub fn logout(&self, request: &Request) {
        if let Some(token) = request.cookie(SESSION_COOKIE) {
            self.sessions.invalidate(token);
        }
    }

    /// The signed-in user making `request`.
    ///
    /// Roles are read from the user store again, so changes show up in
    /// running sessions. A session whose user has disappeared is ended.
    pub fn user_for(&self, request: &Request) -> Result<Option<Principal>, HttpError> {
        let token = match request.cookie(SESSION_COOKIE) {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(None),
        };
        let session = match self.sessions.resolve(token) {
            Some(principal) => principal,
            None => return Ok(None),
        };

        match self.users.get_by_id(&session.id)? {
            Some(user) => Ok(Some(Principal::from(&user))),
            None => {
                log::info!("Ending session of removed user {}", session.name);
                self.sessions.invalidate(token);
                Ok(None)
            }
        }
    }

    pub fn user_is_in_role(&self, path: &str, method: &str, user: Option<&Principal>) -> bool {
        self.rules.is_allowed(path, method, user)
    }

    pub fn role_exists(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn login_cookie(token: &str) -> String {
        format!("{}={}", SESSION_COOKIE, token)
    }

    pub fn logout_cookie() -> String {
        format!("{}=expired; expires=Thu, 01 Jan 1970 00:00:00 GMT", SESSION_COOKIE)
    }
}
