//! Configuration validation.

use std::path::Path;

use crate::loader::ConfigLoader;
use crate::schema::Config;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_engine(config, &mut result);
        Self::validate_modules(config, &mut result);
        Self::validate_executors(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let engine = &config.engine;

        if engine.workers == 0 {
            result.add_error(ValidationError::new(
                "engine.workers",
                "workers must be greater than 0",
            ));
        }

        if engine.workers > 64 {
            result.add_warning(ValidationWarning::new(
                "engine.workers",
                "workers is very high (>64), each worker polls the queue independently",
            ));
        }

        if engine.idle_backoff_ms == 0 {
            result.add_error(ValidationError::new(
                "engine.idle_backoff_ms",
                "idle_backoff_ms must be greater than 0",
            ));
        }

        if engine.shutdown_grace_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "engine.shutdown_grace_secs",
                "shutdown_grace_secs is 0, busy workers will be aborted on stop",
            ));
        }

        for (i, id) in engine.default_executors.iter().enumerate() {
            if id.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("engine.default_executors[{}]", i),
                    "Executor id cannot be empty",
                ));
            }
        }
    }

    fn validate_modules(config: &Config, result: &mut ValidationResult) {
        if let Some(dir) = &config.modules.directory {
            let expanded = ConfigLoader::expand_path(dir);
            if !Path::new(&expanded).is_dir() {
                result.add_warning(ValidationWarning::new(
                    "modules.directory",
                    format!("Modules directory does not exist: {}", expanded),
                ));
            }
        }
    }

    fn validate_executors(config: &Config, result: &mut ValidationResult) {
        for (id, table) in &config.executors {
            if !table.is_object() {
                result.add_error(ValidationError::new(
                    format!("executors.{}", id),
                    "Executor configuration must be a table",
                ));
                continue;
            }

            let default = table.get("default_timeout_seconds").and_then(|v| v.as_u64());
            let max = table.get("max_timeout_seconds").and_then(|v| v.as_u64());

            if default == Some(0) {
                result.add_error(ValidationError::new(
                    format!("executors.{}.default_timeout_seconds", id),
                    "default_timeout_seconds must be greater than 0",
                ));
            }

            if let (Some(default), Some(max)) = (default, max) {
                if max < default {
                    result.add_error(ValidationError::new(
                        format!("executors.{}.max_timeout_seconds", id),
                        format!(
                            "max_timeout_seconds ({}) is below default_timeout_seconds ({})",
                            max, default
                        ),
                    ));
                }
            }
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let level = config.logging.level.to_lowercase();
        // Full filter directives such as "nexus=debug,info" are accepted as is.
        if !level.contains('=') && !level.contains(',') && !LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ValidationError::new(
                "logging.level",
                format!("Unknown log level: {}", config.logging.level),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
