//! Hand-rolled `key value` configuration reader. Unknown keys are ignored; every recognised
//! field has a documented default so a partial or absent config file still runs.

use std::{fs, path::Path};

use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct LnsConfig {
    pub instance: String,
    pub init_free_variables: usize,
    pub max_free_variables: f64,
    pub ms_per_variable: u64,
    pub max_idle_iterations: u64,
    pub random_branching: bool,
    pub random_relaxation: f64,
    pub temperature: f64,
    pub neighbors_accepted: u64,
    pub delta_probability: f64,
    pub min_temperature: f64,
    pub cooling_rate: f64,
    pub workers: u32,
    pub init_deadline_ms: u64,
    pub rng_seed: u64,
}

impl Default for LnsConfig {
    fn default() -> Self {
        LnsConfig {
            instance: String::new(),
            init_free_variables: 4,
            max_free_variables: 0.25,
            ms_per_variable: 50,
            max_idle_iterations: 200,
            random_branching: true,
            random_relaxation: 0.1,
            temperature: 2.0,
            neighbors_accepted: 30,
            delta_probability: 0.3,
            min_temperature: 0.05,
            cooling_rate: 0.95,
            workers: 1,
            init_deadline_ms: 5_000,
            rng_seed: 0,
        }
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|err| {
        Box::new(Error::MalformedConfig {
            key: key.to_string(),
            value: value.to_string(),
            reason: err.to_string(),
        })
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|err| {
        Box::new(Error::MalformedConfig {
            key: key.to_string(),
            value: value.to_string(),
            reason: err.to_string(),
        })
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    crate::utils::parse_bool_input(value).map_err(|err| {
        Box::new(Error::MalformedConfig {
            key: key.to_string(),
            value: value.to_string(),
            reason: err.to_string(),
        })
    })
}

impl LnsConfig {
    /// Parses a whitespace-separated `key value` config file. Blank lines and lines starting
    /// with `#` are skipped; unrecognised keys are ignored rather than rejected.
    pub fn load(path: &Path) -> Result<LnsConfig> {
        let contents = fs::read_to_string(path).map_err(|io_error| {
            Box::new(Error::FailedToReadConfig {
                path: path.to_string_lossy().to_string(),
                io_error,
            })
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<LnsConfig> {
        let mut config = LnsConfig::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key {
                "instance" => config.instance = value.to_string(),
                "init-free-variables" => {
                    config.init_free_variables = parse_u64(key, value)? as usize
                }
                "max-free-variables" => config.max_free_variables = parse_f64(key, value)?,
                "ms-per-variable" => config.ms_per_variable = parse_u64(key, value)?,
                "max-idle-iterations" => config.max_idle_iterations = parse_u64(key, value)?,
                "random-branching" => config.random_branching = parse_bool(key, value)?,
                "random-relaxation" => config.random_relaxation = parse_f64(key, value)?,
                "temperature" => config.temperature = parse_f64(key, value)?,
                "neighbors-accepted" => config.neighbors_accepted = parse_u64(key, value)?,
                "delta-probability" => config.delta_probability = parse_f64(key, value)?,
                "min-temperature" => config.min_temperature = parse_f64(key, value)?,
                "cooling-rate" => config.cooling_rate = parse_f64(key, value)?,
                "workers" => config.workers = parse_u64(key, value)? as u32,
                "init-deadline-ms" => config.init_deadline_ms = parse_u64(key, value)?,
                "rng-seed" => config.rng_seed = parse_u64(key, value)?,
                _ => {
                    // Unknown keys are ignored, matching the lineage's "ignore what you don't
                    // recognise" posture for config parsing.
                }
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_used_when_file_is_empty() {
        let config = LnsConfig::parse("").unwrap();
        assert_eq!(config.workers, 1);
        assert_eq!(config.neighbors_accepted, 30);
    }

    #[test]
    fn recognised_keys_override_defaults() {
        let config = LnsConfig::parse(
            "instance toy.ectt\nworkers 4\nneighbors-accepted 12\nrandom-branching no\n",
        )
        .unwrap();
        assert_eq!(config.instance, "toy.ectt");
        assert_eq!(config.workers, 4);
        assert_eq!(config.neighbors_accepted, 12);
        assert!(!config.random_branching);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = LnsConfig::parse("mystery-key 99\nworkers 2\n").unwrap();
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn malformed_value_is_reported_with_key_and_raw_value() {
        let err = LnsConfig::parse("workers not-a-number\n").unwrap_err();
        match *err {
            Error::MalformedConfig { key, value, .. } => {
                assert_eq!(key, "workers");
                assert_eq!(value, "not-a-number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let config = LnsConfig::parse("# a comment\n\nworkers 3\n").unwrap();
        assert_eq!(config.workers, 3);
    }
}
