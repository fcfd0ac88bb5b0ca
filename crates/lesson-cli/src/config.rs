use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use lesson_core::models::SchedulerConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const CONFIG_FILE: &str = "lessons.toml";
const ENV_PREFIX: &str = "LESSONS_";

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Teacher used when `--teacher` / `--user` are omitted
    pub default_user: Option<Uuid>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "lessons.db".to_string(),
            log_level: "warn".to_string(),
            default_user: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then `lessons.toml`, then `LESSONS_*` environment variables.
    /// Nested keys use a double underscore, e.g. `LESSONS_SCHEDULER__MAX_WINDOW_DAYS`.
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
