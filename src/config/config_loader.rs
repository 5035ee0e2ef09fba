use std::{fmt::Display, str::FromStr};

use anyhow::{Result, anyhow};

use super::config_model::{Database, DotEnvyConfig, Server};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup; blank values count as unset.
pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let port = match get("SERVER_PORT") {
        Some(_) => parse_or(&get, "SERVER_PORT", 8080)?,
        None => parse_or(&get, "APP_PORT", 8080)?,
    };

    let server = Server {
        port,
        body_limit: parse_or(&get, "SERVER_BODY_LIMIT", 1)?,
        timeout: parse_or(&get, "SERVER_TIMEOUT", 30)?,
    };

    let url = match get("DATABASE_URL") {
        Some(url) => url,
        None => format!(
            "postgres://{}:{}@{}:{}/{}",
            get("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string()),
            get("POSTGRES_PASSWORD").unwrap_or_else(|| "postgres".to_string()),
            get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
            get("POSTGRES_PORT").unwrap_or_else(|| "5432".to_string()),
            get("POSTGRES_DB").unwrap_or_else(|| "substracker_db".to_string()),
        ),
    };

    let database = Database {
        url,
        max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
    };

    Ok(DotEnvyConfig { server, database })
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("{key} is invalid: {err}")),
        None => Ok(default),
    }
}
