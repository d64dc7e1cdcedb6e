use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex, RwLock};

use plainhttp::form::Fields;
use toml::value::{Table, Value};


#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub users: UsersConfig,
    pub security: SecurityConfig,
}

/// The part of the configuration that can be changed at runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub web_port: u16,
    pub web_root: PathBuf,
    pub default_pages: Vec<String>,
    pub directory_browsing: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub file: PathBuf,
    pub level: log::LevelFilter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsersConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityConfig {
    pub roles: Vec<String>,
    /// Lowercased page path to its `role=GET|POST;role2=GET` rule.
    pub rules: BTreeMap<String, String>,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unable to find configuration file at {0}")]
    FileNotFound(PathBuf),
    #[error("Unable to read or write configuration file: {0}")]
    FileReadError(#[from] std::io::Error),
    #[error("Configuration file is not valid toml: {0}")]
    FileFormatSyntaxError(#[from] toml::de::Error),
    #[error("Unable to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}


impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            web_port: 8080,
            web_root: PathBuf::from("www"),
            default_pages: vec!["index.html".into(), "index.htm".into()],
            directory_browsing: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert("config.html".into(), "admin=GET|POST;support=GET".into());
        rules.insert("log.html".into(), "admin=GET|POST;support=GET".into());
        rules.insert("user/overview.html".into(), "admin=GET".into());
        rules.insert("user/edit.html".into(), "admin=GET|POST".into());

        AppConfig {
            server: ServerConfig::default(),
            logging: LoggingConfig {
                file: PathBuf::from("bastion.log"),
                level: log::LevelFilter::Info,
            },
            users: UsersConfig {
                path: PathBuf::from("users.toml"),
            },
            security: SecurityConfig {
                roles: vec!["admin".into(), "support".into()],
                rules,
            },
        }
    }
}

impl ServerConfig {
    /// Applies the fields posted by the configuration page.
    ///
    /// An unchecked checkbox is simply missing from a form, so directory
    /// browsing is switched off unless the form says otherwise. Unknown
    /// fields and unparseable ports are ignored.
    pub fn set_values(&mut self, form: &Fields) {
        self.directory_browsing = false;

        for (name, value) in form.iter() {
            match name {
                "WebPort" => {
                    if let Ok(port) = value.parse::<u16>() {
                        self.web_port = port;
                    }
                }
                "WebRoot" => self.web_root = PathBuf::from(value),
                "DefaultPages" => {
                    self.default_pages = value.split(';').map(String::from).collect();
                }
                "DirectoryBrowsing" => self.directory_browsing = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
    }
}


pub fn load<P: Deref<Target=Path>+AsRef<Path>>(path: Option<P>) -> Result<AppConfig, Error> {
    let mut result = AppConfig::default();

    let config_path = match path {
        Some(path) => path,
        None => return Ok(result),
    };
    if !config_path.is_file() {
        return Err(Error::FileNotFound(config_path.to_path_buf()));
    }

    let config = std::fs::read(&*config_path)?;
    let toml = toml::from_slice::<Value>(&config)?;

    if let Some(server) = section(&toml, "server")? {
        if let Some(port) = server.get("web_port") {
            let port = port.as_integer()
                .ok_or_else(|| invalid("server.web_port must be an integer"))?;
            if port < 0 || port > i64::from(u16::MAX) {
                return Err(invalid(format!("server.web_port out of range: {}", port)));
            }
            result.server.web_port = port as u16;
        }
        if let Some(root) = string(server, "server.web_root")? {
            result.server.web_root = PathBuf::from(root);
        }
        if let Some(pages) = server.get("default_pages") {
            result.server.default_pages = strings(pages, "server.default_pages")?;
        }
        if let Some(browsing) = server.get("directory_browsing") {
            result.server.directory_browsing = browsing.as_bool()
                .ok_or_else(|| invalid("server.directory_browsing must be true or false"))?;
        }
    }

    if let Some(logging) = section(&toml, "logging")? {
        if let Some(file) = string(logging, "logging.file")? {
            result.logging.file = PathBuf::from(file);
        }
        if let Some(level) = string(logging, "logging.level")? {
            result.logging.level = level.parse()
                .map_err(|_| invalid(format!("logging.level is not a log level: {}", level)))?;
        }
    }

    if let Some(users) = section(&toml, "users")? {
        if let Some(path) = string(users, "users.path")? {
            result.users.path = PathBuf::from(path);
        }
    }

    if let Some(security) = section(&toml, "security")? {
        if let Some(roles) = security.get("roles") {
            result.security.roles = strings(roles, "security.roles")?;
        }
        if let Some(rules) = security.get("rules") {
            let rules = rules.as_table()
                .ok_or_else(|| invalid("security.rules must be a table of page = \"role=METHOD|METHOD\""))?;
            let mut parsed = BTreeMap::new();
            for (page, rule) in rules.iter() {
                let rule = rule.as_str()
                    .ok_or_else(|| invalid(format!("security.rules.\"{}\" must be a string", page)))?;
                parsed.insert(page.trim_matches('/').to_lowercase(), rule.to_string());
            }
            result.security.rules = parsed;
        }
    }

    log::debug!("Loaded configuration from {}", config_path.to_string_lossy());
    Ok(result)
}

fn section<'a>(toml: &'a Value, name: &str) -> Result<Option<&'a Table>, Error> {
    match toml.get(name) {
        None => Ok(None),
        Some(Value::Table(table)) => Ok(Some(table)),
        Some(_) => Err(invalid(format!("{} must be a table", name))),
    }
}

fn string<'a>(table: &'a Table, key: &str) -> Result<Option<&'a str>, Error> {
    let name = key.rsplit('.').next().unwrap_or(key);
    match table.get(name) {
        None => Ok(None),
        Some(value) => value.as_str()
            .map(Some)
            .ok_or_else(|| invalid(format!("{} must be a string", key))),
    }
}

fn strings(value: &Value, key: &str) -> Result<Vec<String>, Error> {
    let array = value.as_array().ok_or_else(|| invalid(format!("{} must be a list of strings", key)))?;
    array.iter()
        .map(|item| {
            item.as_str()
                .map(String::from)
                .ok_or_else(|| invalid(format!("{} must be a list of strings", key)))
        })
        .collect()
}

fn invalid<S: Into<String>>(message: S) -> Error {
    Error::InvalidConfiguration(message.into())
}


pub fn to_toml(config: &AppConfig) -> Result<String, Error> {
    let mut server = Table::new();
    server.insert("web_port".into(), Value::Integer(i64::from(config.server.web_port)));
    server.insert("web_root".into(), Value::String(config.server.web_root.to_string_lossy().into_owned()));
    server.insert("default_pages".into(), string_array(&config.server.default_pages));
    server.insert("directory_browsing".into(), Value::Boolean(config.server.directory_browsing));

    let mut logging = Table::new();
    logging.insert("file".into(), Value::String(config.logging.file.to_string_lossy().into_owned()));
    logging.insert("level".into(), Value::String(config.logging.level.to_string().to_lowercase()));

    let mut users = Table::new();
    users.insert("path".into(), Value::String(config.users.path.to_string_lossy().into_owned()));

    let mut rules = Table::new();
    for (page, rule) in config.security.rules.iter() {
        rules.insert(page.clone(), Value::String(rule.clone()));
    }
    let mut security = Table::new();
    security.insert("roles".into(), string_array(&config.security.roles));
    security.insert("rules".into(), Value::Table(rules));

    let mut root = Table::new();
    root.insert("server".into(), Value::Table(server));
    root.insert("logging".into(), Value::Table(logging));
    root.insert("users".into(), Value::Table(users));
    root.insert("security".into(), Value::Table(security));

    Ok(toml::to_string(&Value::Table(root))?)
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}


/// Holds the live configuration and tells subscribers when it is saved.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<AppConfig>,
    subscribers: Mutex<Vec<mpsc::Sender<ServerConfig>>>,
}

impl ConfigStore {
    /// `path` is where [`save`](Self::save) writes to; without one, saved
    /// changes only live in memory.
    pub fn new(config: AppConfig, path: Option<PathBuf>) -> Self {
        ConfigStore {
            path,
            current: RwLock::new(config),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> AppConfig {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// A snapshot of the server settings; later saves don't change it.
    pub fn server(&self) -> ServerConfig {
        self.current.read().unwrap_or_else(|e| e.into_inner()).server.clone()
    }

    /// Every successful save sends the new server settings down the
    /// returned channel.
    pub fn subscribe(&self) -> mpsc::Receiver<ServerConfig> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).push(tx);
        rx
    }

    pub fn save(&self, server: ServerConfig) -> Result<(), Error> {
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            let mut updated = current.clone();
            updated.server = server.clone();

            if let Some(path) = &self.path {
                std::fs::write(path, to_toml(&updated)?)?;
                log::info!("Saved configuration to {}", path.to_string_lossy());
            }
            *current = updated;
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(server.clone()).is_ok());
        Ok(())
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_path_gives_defaults() {
        let config = load::<&Path>(None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.web_port, 8080);
        assert_eq!(config.security.roles, vec!["admin", "support"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn reads_all_sections() {
        let file = write_config(r#"
            [server]
            web_port = 9090
            web_root = "/srv/www"
            default_pages = ["home.html"]
            directory_browsing = true

            [logging]
            file = "/var/log/bastion.log"
            level = "debug"

            [users]
            path = "/etc/bastion/users.toml"

            [security]
            roles = ["adminrole"]

            [security.rules]
            "Admin.html" = "adminrole=GET|POST"
        "#);

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.server, ServerConfig {
            web_port: 9090,
            web_root: PathBuf::from("/srv/www"),
            default_pages: vec!["home.html".into()],
            directory_browsing: true,
        });
        assert_eq!(config.logging.level, log::LevelFilter::Debug);
        assert_eq!(config.users.path, PathBuf::from("/etc/bastion/users.toml"));
        assert_eq!(config.security.roles, vec!["adminrole"]);
        assert_eq!(config.security.rules.get("admin.html").map(String::as_str), Some("adminrole=GET|POST"));
        assert_eq!(config.security.rules.len(), 1);
    }

    #[test]
    fn sample_config_spells_out_the_defaults() {
        let sample = Path::new(env!("CARGO_MANIFEST_DIR")).join("etc/bastion.toml");
        assert_eq!(load(Some(sample.as_path())).unwrap(), AppConfig::default());
    }

    #[test]
    fn absent_keys_keep_their_defaults() {
        let file = write_config("[server]\nweb_port = 1234\n");
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.server.web_port, 1234);
        assert_eq!(config.server.web_root, PathBuf::from("www"));
        assert_eq!(config.logging, AppConfig::default().logging);
    }

    #[test]
    fn wrong_types_are_rejected() {
        for contents in &[
            "[server]\nweb_port = \"eighty\"\n",
            "[server]\nweb_port = 70000\n",
            "[server]\ndefault_pages = \"index.html\"\n",
            "[logging]\nlevel = \"loud\"\n",
            "server = 3\n",
            "[security.rules]\n\"a.html\" = 1\n",
        ] {
            let file = write_config(contents);
            let err = load(Some(file.path())).unwrap_err();
            assert!(matches!(err, Error::InvalidConfiguration(_)), "{}: {}", contents, err);
        }
    }

    #[test]
    fn saved_file_loads_back() {
        let mut config = AppConfig::default();
        config.server.web_port = 8181;
        config.server.default_pages = vec!["a.html".into(), "b.html".into()];

        let file = write_config(&to_toml(&config).unwrap());
        assert_eq!(load(Some(file.path())).unwrap(), config);
    }

    #[test]
    fn set_values_applies_form_and_resets_checkbox() {
        let mut server = ServerConfig { directory_browsing: true, ..ServerConfig::default() };

        let form = plainhttp::form::parse(
            b"WebPort=9000&WebRoot=/srv/site&DefaultPages=home.html;index.html&Other=x",
            plainhttp::form::Charset::Utf8,
        );
        server.set_values(&form);

        assert_eq!(server.web_port, 9000);
        assert_eq!(server.web_root, PathBuf::from("/srv/site"));
        assert_eq!(server.default_pages, vec!["home.html", "index.html"]);
        assert!(!server.directory_browsing);

        let form = plainhttp::form::parse(b"WebPort=nope&DirectoryBrowsing=TRUE", plainhttp::form::Charset::Utf8);
        server.set_values(&form);
        assert_eq!(server.web_port, 9000);
        assert!(server.directory_browsing);
    }

    #[test]
    fn save_writes_file_and_notifies_subscribers() {
        let file = write_config("");
        let store = ConfigStore::new(AppConfig::default(), Some(file.path().to_path_buf()));
        let changes = store.subscribe();

        let mut server = store.server();
        server.web_port = 8282;
        store.save(server.clone()).unwrap();

        assert_eq!(changes.try_recv().unwrap(), server);
        assert_eq!(store.server().web_port, 8282);
        assert_eq!(load(Some(file.path())).unwrap().server.web_port, 8282);
    }

    #[test]
    fn dropped_subscribers_are_forgotten() {
        let store = ConfigStore::new(AppConfig::default(), None);
        drop(store.subscribe());
        let live = store.subscribe();

        store.save(ServerConfig::default()).unwrap();
        assert!(live.try_recv().is_ok());
        assert_eq!(store.subscribers.lock().unwrap().len(), 1);
    }
}
