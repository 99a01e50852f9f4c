use clap::{ArgAction, Parser};
use mongogate_core::Authenticator;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Process configuration, read once at startup from flags or the
/// environment (a `.env` file is loaded first when present).
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mongogate",
    version,
    about = "Read-only HTTP gateway in front of a MongoDB database"
)]
pub struct Config {
    /// MongoDB connection string. Required.
    #[arg(long, env = "MONGO_URI", hide_env_values = true)]
    pub mongo_uri: String,

    /// Database name; defaults to the one in the URI, else `test`.
    #[arg(long = "database", env = "MONGO_DATABASE")]
    pub database: Option<String>,

    #[arg(long, env = "API_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "API_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long = "bind", env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Route prefix; empty or `/` serves the routes at the root.
    #[arg(long, env = "API_PREFIX", default_value = "/api")]
    pub prefix: String,

    /// Upper bound for each store step (connect, query, close).
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 10_000)]
    pub store_timeout_ms: u64,

    /// Honour `limit`/`skip` on document lists (default limit 1000).
    #[arg(long, env = "PAGINATION", default_value_t = false, action = ArgAction::Set)]
    pub pagination: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mongo_uri.trim().is_empty() {
            anyhow::bail!("MONGO_URI is empty; refusing to start without a database");
        }
        if self.store_timeout_ms == 0 {
            anyhow::bail!("STORE_TIMEOUT_MS must be greater than zero");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// `"/api/"`, `"api"` and `"/api"` all become `"/api"`; root becomes `""`.
    pub fn route_prefix(&self) -> String {
        let trimmed = self.prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(
            credential(&self.username, "API_USERNAME"),
            credential(&self.password, "API_PASSWORD"),
        )
    }
}

// clap drops empty environment values; an empty configured credential is
// still a credential.
fn credential(flag: &Option<String>, var: &str) -> Option<String> {
    flag.clone().or_else(|| std::env::var(var).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["mongogate", "--mongo-uri", "mongodb://localhost:27017/app"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = parse(&[
            "--port",
            "8088",
            "--bind",
            "127.0.0.1",
            "--pagination",
            "true",
            "--store-timeout-ms",
            "250",
        ]);
        assert_eq!(cfg.listen_addr().to_string(), "127.0.0.1:8088");
        assert!(cfg.pagination);
        assert_eq!(cfg.store_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn prefix_is_normalised() {
        for (raw, want) in [("/api", "/api"), ("api/", "/api"), ("/", ""), ("", ""), ("/v1/db", "/v1/db")] {
            let cfg = parse(&["--prefix", raw]);
            assert_eq!(cfg.route_prefix(), want, "prefix {raw:?}");
        }
    }

    #[test]
    fn blank_uri_is_fatal() {
        let mut cfg = parse(&[]);
        assert!(cfg.validate().is_ok());
        cfg.mongo_uri = "   ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn credentials_from_flags() {
        let cfg = parse(&["--username", "reporter", "--password", "s3cret"]);
        assert!(cfg.authenticator().is_configured());
    }
}
