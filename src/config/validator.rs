use crate::config::Config;
use crate::error::{QsbError, Result, ValidationError};
use regex::Regex;
use std::collections::HashSet;

/// Allowed corpus and source names
const NAME_PATTERN: &str = r"^[a-z0-9][a-z0-9_.-]*$";

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem found
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_shortcuts(config, &mut errors);
        Self::validate_corpora(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(QsbError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;

        if search.max_promoted == 0 {
            errors.push(ValidationError::new(
                "search.max_promoted",
                "Max promoted must be greater than 0",
            ));
        }

        if search.max_results_per_source == 0 {
            errors.push(ValidationError::new(
                "search.max_results_per_source",
                "Max results per source must be greater than 0",
            ));
        }

        if search.max_shortcuts > search.max_promoted {
            errors.push(ValidationError::new(
                "search.max_shortcuts",
                format!(
                    "Max shortcuts ({}) cannot exceed max promoted ({})",
                    search.max_shortcuts, search.max_promoted
                ),
            ));
        }
    }

    fn validate_shortcuts(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.shortcuts.enabled && config.shortcuts.max_stat_age_days == 0 {
            errors.push(ValidationError::new(
                "shortcuts.max_stat_age_days",
                "Max stat age must be at least one day",
            ));
        }
    }

    fn validate_corpora(config: &Config, errors: &mut Vec<ValidationError>) {
        let name_pattern = match Regex::new(NAME_PATTERN) {
            Ok(regex) => regex,
            Err(e) => {
                errors.push(ValidationError::new("corpora", format!("Bad name pattern: {}", e)));
                return;
            }
        };
        let mut corpus_names = HashSet::new();
        let mut source_names = HashSet::new();

        for (i, corpus) in config.corpora.iter().enumerate() {
            let path = format!("corpora[{}].name", i);
            if !name_pattern.is_match(&corpus.name) {
                errors.push(ValidationError::new(
                    path.clone(),
                    format!("Invalid corpus name: '{}'", corpus.name),
                ));
            }
            if !corpus_names.insert(corpus.name.as_str()) {
                errors.push(ValidationError::new(
                    path,
                    format!("Duplicate corpus name: '{}'", corpus.name),
                ));
            }

            if corpus.sources.is_empty() {
                errors.push(ValidationError::new(
                    format!("corpora[{}].sources", i),
                    format!("Corpus '{}' has no sources", corpus.name),
                ));
            }

            // Shortcuts map back to corpora through source names
            for (j, source) in corpus.sources.iter().enumerate() {
                let path = format!("corpora[{}].sources[{}].name", i, j);
                if !name_pattern.is_match(&source.name) {
                    errors.push(ValidationError::new(
                        path.clone(),
                        format!("Invalid source name: '{}'", source.name),
                    ));
                }
                if !source_names.insert(source.name.as_str()) {
                    errors.push(ValidationError::new(
                        path,
                        format!("Duplicate source name: '{}'", source.name),
                    ));
                }

                for (k, entry) in source.entries.iter().enumerate() {
                    if entry.text1.trim().is_empty() {
                        errors.push(ValidationError::new(
                            format!("corpora[{}].sources[{}].entries[{}].text1", i, j, k),
                            "Entry text cannot be empty",
                        ));
                    }
                }
            }
        }

        for (name, profile) in &config.profiles {
            for corpus in &profile.disabled_corpora {
                if !corpus_names.contains(corpus.as_str()) {
                    errors.push(ValidationError::new(
                        format!("profiles.{}.disabled_corpora", name),
                        format!("Unknown corpus: '{}'", corpus),
                    ));
                }
            }
        }
    }
}
