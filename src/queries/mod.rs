//! Jobs defined in code. Unlike config-declared jobs these can carry row
//! filters and text replacers.

mod example;

pub use example::example_job;

use crate::core::error::{ConfigError, JobConfigError};
use crate::core::job::Job;

type JobFactory = fn() -> Result<Job, JobConfigError>;

const CATALOGUE: &[(&str, JobFactory)] = &[("example", example_job)];

pub fn names() -> impl Iterator<Item = &'static str> {
    CATALOGUE.iter().map(|(name, _)| *name)
}

/// Builds the catalogue job registered under `name`.
pub fn builtin(name: &str) -> Result<Job, ConfigError> {
    let (_, factory) = CATALOGUE
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigError::UnknownBuiltin(name.to_string()))?;
    Ok(factory()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalogue_entry_builds() {
        for name in names() {
            builtin(name).unwrap();
        }
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        assert!(matches!(
            builtin("nope"),
            Err(ConfigError::UnknownBuiltin(name)) if name == "nope"
        ));
    }
}
