use crate::error::{Error, Result};
use crate::models::listing::ListingKind;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Which remote document store backs the non-local collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Postgres,
    Memory,
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "production" => Ok(DataSource::Postgres),
            "memory" | "local" | "development" => Ok(DataSource::Memory),
            other => Err(format!("unknown data source '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub jwt_secret: String,
    pub public_rps: u32,
    pub admin_rps: u32,
    pub data_source: DataSource,
    pub database_url: Option<String>,
    pub cache_dir: PathBuf,
    pub local_store_dir: PathBuf,
    pub local_only_kinds: Vec<ListingKind>,
    pub remote_timeout_secs: u64,
    pub list_fetch_cap: usize,
    pub retention_days: i64,
    pub new_badge_days: i64,
    pub analytics_endpoint: Option<String>,
    pub json_logs: bool,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let data_source: DataSource = get_env_parse_or("DATA_SOURCE", DataSource::Postgres)?;
        let database_url = env::var("DATABASE_URL").ok();
        if data_source == DataSource::Postgres && database_url.is_none() {
            return Err(Error::Config(
                "DATABASE_URL is required when DATA_SOURCE=postgres".to_string(),
            ));
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            jwt_secret: get_env("JWT_SECRET")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            admin_rps: get_env_parse("ADMIN_RPS")?,
            data_source,
            database_url,
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/cache")),
            local_store_dir: env::var("LOCAL_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/local")),
            local_only_kinds: parse_kind_list(
                &env::var("LOCAL_ONLY_KINDS").unwrap_or_else(|_| "drives".to_string()),
            )?,
            remote_timeout_secs: get_env_parse_or("REMOTE_TIMEOUT_SECS", 12)?,
            list_fetch_cap: get_env_parse_or("LIST_FETCH_CAP", 1000)?,
            retention_days: get_env_parse_or("RETENTION_DAYS", 90)?,
            new_badge_days: get_env_parse_or("NEW_BADGE_DAYS", 7)?,
            analytics_endpoint: env::var("ANALYTICS_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(_) => get_env_parse(name),
        Err(_) => Ok(default),
    }
}

fn parse_kind_list(raw: &str) -> Result<Vec<ListingKind>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ListingKind>()
                .map_err(|e| Error::Config(format!("Invalid value for LOCAL_ONLY_KINDS: {}", e)))
        })
        .collect()
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_accepts_environment_aliases() {
        assert_eq!("production".parse::<DataSource>(), Ok(DataSource::Postgres));
        assert_eq!("Memory".parse::<DataSource>(), Ok(DataSource::Memory));
        assert!("sqlite".parse::<DataSource>().is_err());
    }

    #[test]
    fn kind_list_skips_blanks() {
        let kinds = parse_kind_list("drives, ,exams").unwrap();
        assert_eq!(kinds, vec![ListingKind::Drives, ListingKind::Exams]);
        assert!(parse_kind_list("blogs").is_err());
        assert!(parse_kind_list("").unwrap().is_empty());
    }
}
