//! Environment-driven configuration (§4.10).

use std::path::PathBuf;

use directories::ProjectDirs;

const ENV_DATA_DIR: &str = "CONTINUUM_DATA_DIR";
const ENV_MAINTENANCE_INTERVAL: &str = "CONTINUUM_MAINTENANCE_INTERVAL_SECS";
const ENV_MIN_VECTOR_SCORE: &str = "CONTINUUM_MIN_VECTOR_SCORE";
const ENV_RECALL_LIMIT: &str = "CONTINUUM_RECALL_LIMIT";

const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 3_600;
const DEFAULT_MIN_VECTOR_SCORE: f64 = 0.3;
const DEFAULT_RECALL_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub maintenance_interval_secs: u64,
    pub min_vector_score: f64,
    pub recall_limit: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_data_dir()),
            maintenance_interval_secs: parse_env_or(ENV_MAINTENANCE_INTERVAL, DEFAULT_MAINTENANCE_INTERVAL_SECS),
            min_vector_score: parse_env_or(ENV_MIN_VECTOR_SCORE, DEFAULT_MIN_VECTOR_SCORE),
            recall_limit: parse_env_or(ENV_RECALL_LIMIT, DEFAULT_RECALL_LIMIT),
        }
    }

    pub fn lexical_db_path(&self) -> PathBuf {
        self.data_dir.join("memories.sqlite3")
    }

    pub fn vector_index_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "continuum", "continuum")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".continuum"))
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_vars_fall_back_to_documented_defaults() {
        // SAFETY: test-local; no other test in this process reads these keys.
        unsafe {
            std::env::remove_var(ENV_MAINTENANCE_INTERVAL);
            std::env::remove_var(ENV_MIN_VECTOR_SCORE);
            std::env::remove_var(ENV_RECALL_LIMIT);
        }
        let config = Config::from_env();
        assert_eq!(config.maintenance_interval_secs, DEFAULT_MAINTENANCE_INTERVAL_SECS);
        assert_eq!(config.min_vector_score, DEFAULT_MIN_VECTOR_SCORE);
        assert_eq!(config.recall_limit, DEFAULT_RECALL_LIMIT);
    }

    #[test]
    fn derived_paths_live_under_data_dir() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/continuum-test"),
            maintenance_interval_secs: 1,
            min_vector_score: 0.1,
            recall_limit: 1,
        };
        assert_eq!(config.lexical_db_path(), PathBuf::from("/tmp/continuum-test/memories.sqlite3"));
        assert_eq!(config.vector_index_dir(), PathBuf::from("/tmp/continuum-test/vectors"));
    }
}
