//! Run configuration: a builder-assembled struct validated once at
//! `build()`, following the teacher's `Config::builder()` idiom
//! (`config::ConfigBuilder` in the teacher's own test suite).

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub network_file: String,
    pub plans_file: String,
    pub output_dir: String,
    pub end_time: u32,
    pub p: f64,
    pub alpha: f64,
    pub max_runs: u32,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

pub struct ConfigBuilder {
    network_file: String,
    plans_file: String,
    output_dir: String,
    end_time: u32,
    p: f64,
    alpha: f64,
    max_runs: u32,
}

impl ConfigBuilder {
    fn new() -> Self {
        ConfigBuilder {
            network_file: String::new(),
            plans_file: String::new(),
            output_dir: String::from("./"),
            end_time: 86400,
            p: 0.5,
            alpha: 1.0,
            max_runs: 1,
        }
    }

    pub fn network_file(mut self, file: impl Into<String>) -> Self {
        self.network_file = file.into();
        self
    }

    pub fn plans_file(mut self, file: impl Into<String>) -> Self {
        self.plans_file = file.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn end_time(mut self, time: u32) -> Self {
        self.end_time = time;
        self
    }

    pub fn p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn max_runs(mut self, max_runs: u32) -> Self {
        self.max_runs = max_runs;
        self
    }

    pub fn build(self) -> ConfigResult<Config> {
        if !(0.0..=1.0).contains(&self.p) {
            return Err(ConfigError::InvalidP(self.p));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        Ok(Config {
            network_file: self.network_file,
            plans_file: self.plans_file,
            output_dir: self.output_dir,
            end_time: self.end_time,
            p: self.p,
            alpha: self.alpha,
            max_runs: self.max_runs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_spec() {
        let config = Config::builder().network_file("net.xml").plans_file("plans.xml").build().unwrap();
        assert_eq!(config.p, 0.5);
        assert_eq!(config.alpha, 1.0);
        assert_eq!(config.end_time, 86400);
    }

    #[test]
    fn rejects_p_out_of_range() {
        assert!(Config::builder().p(1.5).build().is_err());
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        assert!(Config::builder().alpha(0.0).build().is_err());
    }
}
