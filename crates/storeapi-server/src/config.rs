use anyhow::{Result, anyhow, bail};

/// Which set of prefixed variables to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Dev,
    Prod,
    Test,
}

impl EnvState {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            "test" => Ok(Self::Test),
            other => bail!("Unknown ENV_STATE {:?}, expected dev, prod or test", other),
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Dev => "DEV_",
            Self::Prod => "PROD_",
            Self::Test => "TEST_",
        }
    }
}

/// Keys the deployment may still carry that this server does not act on:
/// remote log shipping (logs go to stdout) and B2 file storage (no upload
/// routes).
const UNSUPPORTED_KEYS: &[&str] = &["LOGTAIL_API_KEY", "B2_KEY_ID", "B2_APPLICATION_KEY", "B2_BUCKET_NAME"];

#[derive(Debug, Clone)]
pub struct Config {
    pub env_state: EnvState,
    pub database_url: String,
    pub db_force_rollback: bool,
    pub secret_key: Option<String>,
    pub mailgun_domain: Option<String>,
    pub mailgun_api_key: Option<String>,
    pub deepai_api_key: Option<String>,
    pub base_url: String,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    /// Prefixed names of unsupported keys that are set, for a startup warning.
    pub ignored_keys: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `ENV_STATE` picks dev, prod or test (default dev); every other key is
    /// read with that state's prefix, e.g. `PROD_DATABASE_URL`.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_state = match get("ENV_STATE") {
            Some(v) if !v.is_empty() => EnvState::parse(&v)?,
            _ => EnvState::Dev,
        };
        let prefix = env_state.prefix();
        let var = |key: &str| get(&format!("{prefix}{key}")).filter(|v| !v.is_empty());

        let database_url = match (var("DATABASE_URL"), env_state) {
            (Some(url), _) => url,
            (None, EnvState::Test) => "sqlite:///data.db".into(),
            (None, EnvState::Dev) => "sqlite:///storeapi.db".into(),
            (None, EnvState::Prod) => bail!("{prefix}DATABASE_URL must be set"),
        };

        let db_force_rollback = match var("DB_FORCE_ROLLBACK") {
            Some(v) => parse_bool(&v).ok_or_else(|| anyhow!("{prefix}DB_FORCE_ROLLBACK is not a boolean: {v:?}"))?,
            None => env_state == EnvState::Test,
        };

        let port = var("PORT")
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| anyhow!("{prefix}PORT: {e}"))?
            .unwrap_or(8000);

        let workers = var("WORKERS")
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| anyhow!("{prefix}WORKERS: {e}"))?
            .unwrap_or(4);

        let base_url = var("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let ignored_keys = UNSUPPORTED_KEYS
            .iter()
            .filter(|key| var(**key).is_some())
            .map(|key| format!("{prefix}{key}"))
            .collect();

        Ok(Self {
            env_state,
            database_url,
            db_force_rollback,
            secret_key: var("SECRET_KEY"),
            mailgun_domain: var("MAILGUN_DOMAIN"),
            mailgun_api_key: var("MAILGUN_API_KEY"),
            deepai_api_key: var("DEEPAI_API_KEY"),
            base_url,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            workers,
            ignored_keys,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
