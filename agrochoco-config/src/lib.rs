use anyhow::Context;
use serde::{Deserialize, Serialize};

const CONF_DIR: &str = "conf/";
const SECRET_FILE: &str = "secret.toml";
const MAIN_FILE: &str = "main.toml";

#[derive(Deserialize, Serialize, Debug, Default)]
struct Secret {
    #[serde(default)]
    pub db_password: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Api {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for Api {
    fn default() -> Self {
        Api {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Session {
    pub db_url: String,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            db_url: "sqlite://db/session.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Server {
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Server { port: 8081 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Log {
    pub directory: String,
    pub file_prefix: String,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            directory: "logs".to_string(),
            file_prefix: "agrochoco.log".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default)]
struct Main {
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub log: Log,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub api: Api,
    pub session: Session,
    pub server: Server,
    pub log: Log,
}

impl Config {
    fn from_parts(secret: Secret, main: Main) -> Self {
        let mut session = main.session;
        session.db_url = session.db_url.replace("{{password}}", &secret.db_password);
        Config {
            api: main.api,
            session,
            server: main.server,
            log: main.log,
        }
    }

    /// Load configuration from conf/secret.toml and conf/main.toml
    /// Searches for conf/ directory in current directory or parent directories
    /// # Errors
    /// - If conf/ directory is not found
    /// - If main.toml cannot be read or either file cannot be parsed
    pub fn load() -> anyhow::Result<Self> {
        let mut dir = std::env::current_dir().context("Failed to get current directory")?;
        loop {
            if dir.join(CONF_DIR).is_dir() {
                break;
            }
            if !dir.pop() {
                return Err(anyhow::anyhow!(
                    "Failed to find conf directory in current or parent directories"
                ));
            }
        }
        Self::load_from(&dir.join(CONF_DIR))
    }

    /// Load configuration from an explicit conf directory.
    /// A missing secret.toml is treated as an empty secret.
    pub fn load_from(conf_dir: &std::path::Path) -> anyhow::Result<Self> {
        let secret_file = conf_dir.join(SECRET_FILE);
        let main_file = conf_dir.join(MAIN_FILE);

        let secret = if secret_file.is_file() {
            toml::from_str(
                &std::fs::read_to_string(secret_file)
                    .context("Failed to open secret config file")?,
            )
            .context("Failed to parse secret config file")?
        } else {
            Secret::default()
        };
        let main = toml::from_str(
            &std::fs::read_to_string(main_file).context("Failed to open main config file")?,
        )
        .context("Failed to parse main config file")?;
        Ok(Self::from_parts(secret, main))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_parts(Secret::default(), Main::default())
    }
}
