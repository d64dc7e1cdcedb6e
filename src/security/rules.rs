//! Which roles may use which methods on which pages.

use std::collections::HashMap;

use super::sessions::Principal;


#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Malformed role rule for {path}: {entry:?} (expected role=METHOD|METHOD)")]
pub struct RuleError {
    pub path: String,
    pub entry: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Grant {
    role: String,
    methods: Vec<String>,
}

/// Page paths mapped to the roles allowed on them.
///
/// Pages without an entry are open to everybody, signed in or not.
#[derive(Clone, Debug, Default)]
pub struct RoleTable {
    rules: HashMap<String, Vec<Grant>>,
}

impl RoleTable {
    pub fn parse<'a, I>(rules: I) -> Result<Self, RuleError>
        where I: IntoIterator<Item=(&'a str, &'a str)> {
        let mut table = RoleTable::default();
        for (path, rule) in rules {
            table.insert(path, rule)?;
        }
        Ok(table)
    }

    /// Adds the rule for `path`, formatted as `role=GET|POST;role2=GET`.
    ///
    /// An empty rule leaves the page unrestricted.
    pub fn insert(&mut self, path: &str, rule: &str) -> Result<(), RuleError> {
        let path = normalize(path);
        let malformed = |entry: &str| RuleError { path: path.clone(), entry: entry.to_string() };

        let mut grants = Vec::new();
        for entry in rule.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(2, '=');
            let role = parts.next().unwrap_or("").trim();
            let methods = parts.next().ok_or_else(|| malformed(entry))?;
            if role.is_empty() {
                return Err(malformed(entry));
            }

            let methods: Vec<String> = methods.split('|')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_ascii_uppercase)
                .collect();
            grants.push(Grant { role: role.to_string(), methods });
        }

        if grants.is_empty() {
            self.rules.remove(&path);
        } else {
            self.rules.insert(path, grants);
        }
        Ok(())
    }

    pub fn is_restricted(&self, path: &str) -> bool {
        self.rules.contains_key(&normalize(path))
    }

    /// Decides whether `user` may use `method` on `path`.
    pub fn is_allowed(&self, path: &str, method: &str, user: Option<&Principal>) -> bool {
        let grants = match self.rules.get(&normalize(path)) {
            None => return true,
            Some(grants) => grants,
        };
        let user = match user {
            None => return false,
            Some(user) => user,
        };

        grants.iter().any(|grant| {
            grant.methods.iter().any(|m| m == method) && user.has_role(&grant.role)
        })
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_lowercase()
}
