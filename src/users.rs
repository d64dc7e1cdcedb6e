//! User accounts.

use std::path::PathBuf;
use std::sync::Mutex;

use toml::value::{Table, Value};
use uuid::Uuid;


#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub password_hash: String,
    pub password_salt: String,
    pub roles: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unable to read or write user file: {0}")]
    Io(#[from] std::io::Error),
    #[error("User file is not valid toml: {0}")]
    Format(#[from] toml::de::Error),
    #[error("Unable to serialize users: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid user entry: {0}")]
    Invalid(String),
    #[error("A user named {0} already exists")]
    DuplicateName(String),
    #[error("No user with id {0}")]
    NotFound(Uuid),
}

impl From<Error> for plainhttp::HttpError {
    fn from(err: Error) -> Self {
        plainhttp::HttpError::server(err)
    }
}


pub trait UserStore: Send + Sync {
    fn get_all(&self) -> Result<Vec<User>, Error>;
    fn get_by_id(&self, id: &Uuid) -> Result<Option<User>, Error>;
    /// Names match exactly.
    fn get_by_name(&self, name: &str) -> Result<Option<User>, Error>;
    /// Stores the roles of `user`; other fields are left alone.
    fn update_roles(&self, user: &User) -> Result<(), Error>;
    fn add(&self, user: User) -> Result<(), Error>;
}


/// Users kept as `[[user]]` tables in a TOML file.
///
/// Every call reads the file again, so edits made while the server runs
/// are picked up. Access goes through one mutex.
pub struct FileUserStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileUserStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileUserStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<Vec<User>, Error> {
        if !self.path.exists() {
            log::debug!("No user file at {}", self.path.to_string_lossy());
            return Ok(Vec::new());
        }

        let contents = std::fs::read(&self.path)?;
        let toml = toml::from_slice::<Value>(&contents)?;
        let entries = match toml.get("user") {
            None => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(Error::Invalid("`user` must be an array of tables".into())),
        };

        entries.iter().map(user_from_toml).collect()
    }

    fn write(&self, users: &[User]) -> Result<(), Error> {
        let mut root = Table::new();
        root.insert("user".into(), Value::Array(users.iter().map(user_to_toml).collect()));
        std::fs::write(&self.path, toml::to_string(&Value::Table(root))?)?;
        Ok(())
    }
}

impl UserStore for FileUserStore {
    fn get_all(&self) -> Result<Vec<User>, Error> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read()
    }

    fn get_by_id(&self, id: &Uuid) -> Result<Option<User>, Error> {
        Ok(self.get_all()?.into_iter().find(|u| &u.id == id))
    }

    fn get_by_name(&self, name: &str) -> Result<Option<User>, Error> {
        Ok(self.get_all()?.into_iter().find(|u| u.name == name))
    }

    fn update_roles(&self, user: &User) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut users = self.read()?;
        let stored = users.iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(Error::NotFound(user.id))?;
        stored.roles = user.roles.clone();
        self.write(&users)?;
        log::info!("Updated roles of {} to {:?}", user.name, user.roles);
        Ok(())
    }

    fn add(&self, user: User) -> Result<(), Error> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut users = self.read()?;
        if users.iter().any(|u| u.name == user.name) {
            return Err(Error::DuplicateName(user.name));
        }
        log::info!("Adding user {} ({})", user.name, user.id);
        users.push(user);
        self.write(&users)
    }
}

fn user_from_toml(entry: &Value) -> Result<User, Error> {
    let field = |name: &str| -> Result<String, Error> {
        entry.get(name)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::Invalid(format!("missing or non-string field `{}`", name)))
    };

    let id = field("id")?;
    let id = Uuid::parse_str(&id).map_err(|_| Error::Invalid(format!("not a uuid: {}", id)))?;

    let roles = match entry.get("roles") {
        None => Vec::new(),
        Some(Value::Array(roles)) => {
            roles.iter()
                .map(|r| r.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| Error::Invalid(format!("roles of {} must be strings", id)))?
        }
        Some(_) => return Err(Error::Invalid(format!("roles of {} must be a list", id))),
    };

    Ok(User {
        id,
        name: field("name")?,
        password_hash: field("password_hash")?,
        password_salt: field("password_salt")?,
        roles,
    })
}

fn user_to_toml(user: &User) -> Value {
    let mut table = Table::new();
    table.insert("id".into(), Value::String(user.id.to_string()));
    table.insert("name".into(), Value::String(user.name.clone()));
    table.insert("password_hash".into(), Value::String(user.password_hash.clone()));
    table.insert("password_salt".into(), Value::String(user.password_salt.clone()));
    table.insert("roles".into(), Value::Array(user.roles.iter().cloned().map(Value::String).collect()));
    Value::Table(table)
}


#[cfg(test)]
mod test {
    use super::*;

    fn user(name: &str, roles: &[&str]) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.into(),
            password_hash: "hash".into(),
            password_salt: "salt".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn missing_file_means_no_users() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("users.toml"));
        assert!(store.get_all().unwrap().is_empty());
        assert_eq!(store.get_by_name("admin").unwrap(), None);
    }

    #[test]
    fn added_users_can_be_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("users.toml"));
        let alice = user("alice", &["admin"]);
        let bob = user("bob", &[]);
        store.add(alice.clone()).unwrap();
        store.add(bob.clone()).unwrap();

        assert_eq!(store.get_all().unwrap(), vec![alice.clone(), bob.clone()]);
        assert_eq!(store.get_by_id(&bob.id).unwrap(), Some(bob));
        assert_eq!(store.get_by_name("alice").unwrap(), Some(alice));
        assert_eq!(store.get_by_name("Alice").unwrap(), None);
    }

    #[test]
    fn duplicate_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("users.toml"));
        store.add(user("alice", &[])).unwrap();
        assert!(matches!(store.add(user("alice", &[])), Err(Error::DuplicateName(_))));
    }

    #[test]
    fn update_roles_only_touches_roles() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUserStore::new(dir.path().join("users.toml"));
        let alice = user("alice", &["support"]);
        store.add(alice.clone()).unwrap();

        let mut changed = alice.clone();
        changed.roles = vec!["admin".into(), "support".into()];
        changed.password_hash = "ignored".into();
        store.update_roles(&changed).unwrap();

        let stored = store.get_by_id(&alice.id).unwrap().unwrap();
        assert_eq!(stored.roles, vec!["admin", "support"]);
        assert_eq!(stored.password_hash, "hash");

        assert!(matches!(store.update_roles(&user("ghost", &[])), Err(Error::NotFound(_))));
    }

    #[test]
    fn malformed_entries_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.toml");
        std::fs::write(&path, "[[user]]\nid = \"not-a-uuid\"\nname = \"x\"\n").unwrap();

        let store = FileUserStore::new(path);
        assert!(matches!(store.get_all(), Err(Error::Invalid(_))));
    }
}
