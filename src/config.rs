//! Environment-backed configuration.
//!
//! Every setting has a default; override with `MATCH_*` variables (plus the
//! conventional `OPENAI_API_KEY`, `SUPABASE_URL` and `SUPABASE_ANON_KEY`).

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::limiter::ConcurrencyLimiter;
use crate::orchestrator::ExactMatchPolicy;
use crate::prefilter::DEFAULT_KEEP;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {name}='{value}': expected {expected}")]
    Parse {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{name} must be at least 1")]
    Zero { name: &'static str },

    #[error("{name}={value} exceeds the maximum of {max}")]
    TooLarge {
        name: &'static str,
        value: usize,
        max: usize,
    },

    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    /// Simultaneous scoring calls per batch. Default: `25`.
    pub concurrency: usize,
    /// Pool size kept by the prefilter. Default: `200`.
    pub prefilter_keep: usize,
    pub exact_match: ExactMatchPolicy,
    /// JSON table of candidate embeddings; prefilter is off when unset.
    pub embeddings_path: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub scoring_model: String,
    pub embedding_model: String,
    pub request_timeout: Duration,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub candidate_table: String,
}

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SCORING_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5002,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            concurrency: 25,
            prefilter_keep: DEFAULT_KEEP,
            exact_match: ExactMatchPolicy::Shortcut,
            embeddings_path: None,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            scoring_model: DEFAULT_SCORING_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
            supabase_url: None,
            supabase_key: None,
            candidate_table: "mentors".to_string(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "MATCH_PORT";
    const ENV_BIND_ADDR: &'static str = "MATCH_BIND_ADDR";
    const ENV_CONCURRENCY: &'static str = "MATCH_CONCURRENCY";
    const ENV_PREFILTER_KEEP: &'static str = "MATCH_PREFILTER_KEEP";
    const ENV_EXACT_MATCH: &'static str = "MATCH_EXACT_MATCH_SHORTCUT";
    const ENV_EMBEDDINGS_PATH: &'static str = "MATCH_EMBEDDINGS_PATH";
    const ENV_OPENAI_KEY: &'static str = "OPENAI_API_KEY";
    const ENV_OPENAI_BASE_URL: &'static str = "MATCH_OPENAI_BASE_URL";
    const ENV_SCORING_MODEL: &'static str = "MATCH_SCORING_MODEL";
    const ENV_EMBEDDING_MODEL: &'static str = "MATCH_EMBEDDING_MODEL";
    const ENV_TIMEOUT: &'static str = "MATCH_REQUEST_TIMEOUT_SECS";
    const ENV_SUPABASE_URL: &'static str = "SUPABASE_URL";
    const ENV_SUPABASE_KEY: &'static str = "SUPABASE_ANON_KEY";
    const ENV_CANDIDATE_TABLE: &'static str = "MATCH_CANDIDATE_TABLE";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let exact_match = match get(Self::ENV_EXACT_MATCH) {
            Some(v) => {
                if parse_value::<bool>(Self::ENV_EXACT_MATCH, &v, "true or false")? {
                    ExactMatchPolicy::Shortcut
                } else {
                    ExactMatchPolicy::Disabled
                }
            }
            None => d.exact_match,
        };

        Ok(Self {
            port: parse_or(&get, Self::ENV_PORT, d.port, "a port number")?,
            bind_addr: parse_or(&get, Self::ENV_BIND_ADDR, d.bind_addr, "an IP address")?,
            concurrency: parse_or(
                &get,
                Self::ENV_CONCURRENCY,
                d.concurrency,
                "a positive integer",
            )?,
            prefilter_keep: parse_or(
                &get,
                Self::ENV_PREFILTER_KEEP,
                d.prefilter_keep,
                "a positive integer",
            )?,
            exact_match,
            embeddings_path: get(Self::ENV_EMBEDDINGS_PATH).map(PathBuf::from),
            openai_api_key: get(Self::ENV_OPENAI_KEY),
            openai_base_url: get(Self::ENV_OPENAI_BASE_URL).unwrap_or(d.openai_base_url),
            scoring_model: get(Self::ENV_SCORING_MODEL).unwrap_or(d.scoring_model),
            embedding_model: get(Self::ENV_EMBEDDING_MODEL).unwrap_or(d.embedding_model),
            request_timeout: Duration::from_secs(parse_or(
                &get,
                Self::ENV_TIMEOUT,
                d.request_timeout.as_secs(),
                "a number of seconds",
            )?),
            supabase_url: get(Self::ENV_SUPABASE_URL),
            supabase_key: get(Self::ENV_SUPABASE_KEY),
            candidate_table: get(Self::ENV_CANDIDATE_TABLE).unwrap_or(d.candidate_table),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Zero {
                name: Self::ENV_CONCURRENCY,
            });
        }
        if self.concurrency > ConcurrencyLimiter::MAX_SLOTS {
            return Err(ConfigError::TooLarge {
                name: Self::ENV_CONCURRENCY,
                value: self.concurrency,
                max: ConcurrencyLimiter::MAX_SLOTS,
            });
        }
        if self.prefilter_keep == 0 {
            return Err(ConfigError::Zero {
                name: Self::ENV_PREFILTER_KEEP,
            });
        }
        if let Some(ref path) = self.embeddings_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(
    name: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Parse {
        name,
        value: value.to_string(),
        expected,
    })
}

fn parse_or<T, G>(
    get: &G,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(v) => parse_value(name, &v, expected),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 5002);
        assert_eq!(config.concurrency, 25);
        assert_eq!(config.prefilter_keep, 200);
        assert_eq!(config.exact_match, ExactMatchPolicy::Shortcut);
        assert_eq!(config.scoring_model, "gpt-4-turbo");
        assert!(config.embeddings_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("MATCH_PORT", "8080"),
            ("MATCH_CONCURRENCY", "4"),
            ("MATCH_EXACT_MATCH_SHORTCUT", "false"),
            ("MATCH_SCORING_MODEL", "gpt-4o-mini"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.exact_match, ExactMatchPolicy::Disabled);
        assert_eq!(config.scoring_model, "gpt-4o-mini");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_parse_errors() {
        let err = Config::from_lookup(lookup(&[("MATCH_PORT", "99999")])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { name: "MATCH_PORT", .. }));

        let err =
            Config::from_lookup(lookup(&[("MATCH_EXACT_MATCH_SHORTCUT", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate() {
        let config = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero { .. })));

        let huge = usize::MAX.to_string();
        let config = Config::from_lookup(lookup(&[("MATCH_CONCURRENCY", huge.as_str())])).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooLarge {
                name: "MATCH_CONCURRENCY",
                ..
            })
        ));

        let config = Config {
            embeddings_path: Some(PathBuf::from("/definitely/not/here.json")),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::PathNotFound { .. })));
    }
}
