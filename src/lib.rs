use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;

use anyhow::{bail, Context, Result};
use plainhttp::server::{Listener, State};
use uuid::Uuid;

pub mod app;
pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod security;
pub mod static_files;
pub mod users;
mod console;

use config::{AppConfig, ConfigStore};
use security::{password, RoleTable, SecurityProvider};
use users::{FileUserStore, User, UserStore};


/// A running server: the listener plus everything behind it.
pub struct Server {
    listener: Arc<Listener>,
    config: Arc<ConfigStore>,
}

impl Server {
    /// Wires up the request pipeline and starts listening on the configured
    /// port. Saving a new configuration moves the listener to the new port.
    pub fn start(config: AppConfig, config_path: Option<PathBuf>) -> Result<Server> {
        let users: Arc<dyn UserStore> = Arc::new(FileUserStore::new(config.users.path.clone()));
        let rules = RoleTable::parse(
            config.security.rules.iter().map(|(page, rule)| (page.as_str(), rule.as_str()))
        ).context("Invalid security.rules in configuration")?;
        let security = Arc::new(SecurityProvider::new(users.clone(), rules, config.security.roles.clone()));

        let port = config.server.web_port;
        let log_file = config.logging.file.clone();
        let store = Arc::new(ConfigStore::new(config, config_path));

        let routes = commands::routes(store.clone(), security.clone(), users, log_file);
        let dispatcher = app::Dispatcher::new(store.clone(), security, routes);
        let listener = Arc::new(Listener::new(dispatcher, errors::PageErrorHandler::new(store.clone())));

        listener.start(port).with_context(|| format!("Unable to start server on port {}", port))?;
        watch_config(&store, Arc::downgrade(&listener))?;

        Ok(Server { listener, config: store })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> State {
        self.listener.state()
    }

    /// The port actually listened on, falling back to the configured one.
    pub fn port(&self) -> u16 {
        self.local_addr()
            .map(|addr| addr.port())
            .unwrap_or_else(|| self.config.server().web_port)
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn stop(&self) {
        self.listener.stop();
    }
}

/// Restarts the listener whenever the configuration is saved. The thread
/// ends once the listener is gone.
fn watch_config(store: &ConfigStore, listener: Weak<Listener>) -> Result<()> {
    let changes = store.subscribe();
    thread::Builder::new()
        .name("config-watch".into())
        .spawn(move || {
            for server in changes {
                let listener = match listener.upgrade() {
                    Some(listener) => listener,
                    None => break,
                };
                log::info!("Config updated. Reinitializing for port {}.", server.web_port);
                if let Err(err) = listener.restart(server.web_port) {
                    log::error!("Unable to restart listener: {}", err);
                }
            }
            log::debug!("Config watcher finished");
        })
        .context("Unable to start config watcher")?;
    Ok(())
}


pub fn add_user(config: &AppConfig, name: &str, password: &str, roles: &[&str]) -> Result<User> {
    if name.is_empty() {
        bail!("User name must not be empty");
    }
    for role in roles {
        if !config.security.roles.iter().any(|r| r.eq_ignore_ascii_case(role)) {
            bail!("Unknown role {:?}; configured roles are {:?}", role, config.security.roles);
        }
    }

    let salt = password::generate_salt();
    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        password_hash: password::hash(name, password, &salt),
        password_salt: salt,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    };

    let store = FileUserStore::new(config.users.path.clone());
    store.add(user.clone())
        .with_context(|| format!("Unable to add user to {}", config.users.path.to_string_lossy()))?;
    Ok(user)
}


pub fn main() -> Result<()> {
    let matches = clap::App::new("bastion")
        .version(clap::crate_version!())
        .author(clap::crate_authors!())
        .about("Serves a web root over HTTP/1.0 with role based access control")
        .arg(
            clap::Arg::with_name("config")
                .long("config")
                .short("c")
                .help("Where can I find my configuration?")
                .takes_value(true)
                .global(true))
        .arg(
            clap::Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .global(true)
                .help("Log more (debug); repeat for trace"))
        .subcommand(
            clap::SubCommand::with_name("adduser")
                .about("Creates a user account")
                .arg(clap::Arg::with_name("name").required(true).index(1))
                .arg(clap::Arg::with_name("password").required(true).index(2))
                .arg(
                    clap::Arg::with_name("role")
                        .long("role")
                        .short("r")
                        .help("Role to grant; may be repeated")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1)))
        .get_matches();

    let config_path = matches.value_of("config").map(PathBuf::from);
    let config = config::load(config_path.as_deref())?;

    let level = match matches.occurrences_of("verbose") {
        0 => config.logging.level,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(adduser) = matches.subcommand_matches("adduser") {
        logging::init(level, None)?;
        let name = adduser.value_of("name").unwrap_or_default();
        let password = adduser.value_of("password").unwrap_or_default();
        let roles: Vec<&str> = adduser.values_of("role").map(|r| r.collect()).unwrap_or_default();

        let user = add_user(&config, name, password, &roles)?;
        println!("Added user {} ({}) with roles {:?}", user.name, user.id, user.roles);
        return Ok(());
    }

    logging::init(level, Some(&config.logging.file))?;
    log::debug!("Running here: {}", std::env::current_dir()?.to_string_lossy());

    let server = Server::start(config, config_path)?;
    let stdin = io::stdin();
    match console::run(stdin.lock(), io::stdout(), &server)? {
        console::Outcome::Shutdown => server.stop(),
        console::Outcome::InputClosed => {
            log::info!("Console input closed; serving until killed");
            loop {
                thread::park();
            }
        }
    }

    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn test_config(dir: &tempfile::TempDir) -> AppConfig {
        let _ = pretty_env_logger::try_init();
        let mut config = AppConfig::default();
        config.server.web_port = 0;
        config.server.web_root = dir.path().join("www");
        config.users.path = dir.path().join("users.toml");
        config.logging.file = dir.path().join("bastion.log");
        config
    }

    #[test]
    fn add_user_checks_roles_and_hashes_password() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);

        assert!(add_user(&config, "ada", "pw", &["wizard"]).is_err());
        assert!(add_user(&config, "", "pw", &[]).is_err());

        let user = add_user(&config, "ada", "pw", &["admin"]).unwrap();
        assert!(password::verify("ada", "pw", &user.password_salt, &user.password_hash));
        assert_eq!(FileUserStore::new(config.users.path.clone()).get_by_name("ada").unwrap(), Some(user));
    }

    #[test]
    fn saving_config_moves_the_listener() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::start(test_config(&dir), None).unwrap();
        let first = server.port();
        assert_eq!(server.state(), State::Started);

        let mut settings = server.config().server();
        settings.web_port = 0;
        server.config().save(settings).unwrap();

        // The watcher restarts asynchronously; port 0 picks a fresh port.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while server.port() == first && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_ne!(server.port(), first);
        server.stop();
        assert_eq!(server.state(), State::Stopped);
    }

    #[test]
    fn console_runs_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::start(test_config(&dir), None).unwrap();

        let mut output = Vec::new();
        let outcome = console::run(Cursor::new("help\n\nstatus\nfrobnicate\nSHUTDOWN\nstatus\n"), &mut output, &server).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert_eq!(outcome, console::Outcome::Shutdown);
        assert!(output.contains("shutdown  stop the server"));
        assert!(output.contains("Listener Started on 0.0.0.0:"));
        assert!(output.contains("Huh? Unknown command \"frobnicate\""));
        assert_eq!(output.matches("Listener").count(), 1);

        let outcome = console::run(Cursor::new("browse\n"), Vec::new(), &server).unwrap();
        assert_eq!(outcome, console::Outcome::InputClosed);
    }
}
