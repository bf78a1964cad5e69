//! TOML configuration files for the command line.
//!
//! ```toml
//! [search]
//! fuzzy = false
//! min_length = 12
//! max_length = 60
//! strategy = "offset"
//! index_side = "both"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, InputError, Result};
use crate::options::{FinderOptions, FinderOptionsBuilder, Strategy};
use crate::repeat::IndexSide;
use crate::runs::ReverseRule;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub search: SearchSettings,
}

/// The `[search]` table; every key is optional
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSettings {
    /// Start from the fuzzy preset instead of the exact defaults
    #[serde(default)]
    pub fuzzy: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub max_repeats: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub focus_offset: Option<usize>,
    pub threads: Option<usize>,
    pub strategy: Option<Strategy>,
    pub index_side: Option<IndexSide>,
    pub reverse_rule: Option<ReverseRule>,
    pub kmer_size: Option<usize>,
}

impl SearchSettings {
    /// Builder seeded with these settings; not validated until `build`
    #[must_use]
    pub fn to_builder(&self) -> FinderOptionsBuilder {
        let base = if self.fuzzy {
            FinderOptions::fuzzy()
        } else {
            FinderOptions::default()
        };
        self.apply(base.into_builder())
    }

    /// Overrides the builder's values with every key present here
    #[must_use]
    pub fn apply(&self, mut builder: FinderOptionsBuilder) -> FinderOptionsBuilder {
        if let Some(v) = self.min_length {
            builder = builder.min_length(v);
        }
        if let Some(v) = self.max_length {
            builder = builder.max_length(v);
        }
        if let Some(v) = self.max_repeats {
            builder = builder.max_repeats(v);
        }
        if let Some(v) = self.similarity_threshold {
            builder = builder.similarity_threshold(v);
        }
        if let Some(v) = self.focus_offset {
            builder = builder.focus_offset(v);
        }
        if let Some(v) = self.threads {
            builder = builder.worker_count(v);
        }
        if let Some(v) = self.strategy {
            builder = builder.strategy(v);
        }
        if let Some(v) = self.index_side {
            builder = builder.index_side(v);
        }
        if let Some(v) = self.reverse_rule {
            builder = builder.reverse_rule(v);
        }
        if let Some(v) = self.kmer_size {
            builder = builder.kmer_size(v);
        }
        builder
    }
}

/// Reads and parses a configuration file
pub fn parse_config(path: &Path) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path).map_err(|source| InputError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&contents, path)
}

/// Parses configuration text; `path` is only used in error messages
pub fn parse_config_str(contents: &str, path: &Path) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(contents).map_err(|e| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        detail: e.message().to_string(),
    })?;
    log::debug!("loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_full_search_table() -> Result<()> {
        let config = parse_config_str(
            r#"
            [search]
            min_length = 12
            max_length = 40
            max_repeats = 50
            threads = 2
            strategy = "offset"
            index_side = "reference"
            reverse_rule = "tandem-only"
            "#,
            Path::new("inline.toml"),
        )?;
        let options = config.search.to_builder().build()?;
        assert_eq!(options.min_length(), 12);
        assert_eq!(options.max_length(), 40);
        assert_eq!(options.max_repeats(), 50);
        assert_eq!(options.worker_count(), 2);
        assert_eq!(options.strategy(), Strategy::ByOffset);
        assert_eq!(options.index_side(), IndexSide::Reference);
        assert_eq!(options.reverse_rule(), ReverseRule::TandemOnly);
        Ok(())
    }

    #[test]
    fn test_missing_table_uses_defaults() -> Result<()> {
        let config = parse_config_str("", Path::new("empty.toml"))?;
        assert_eq!(config.search, SearchSettings::default());
        assert_eq!(config.search.to_builder().build()?, FinderOptions::default());
        Ok(())
    }

    #[test]
    fn test_fuzzy_preset_with_override() -> Result<()> {
        let config = parse_config_str(
            "[search]\nfuzzy = true\nmax_length = 90\n",
            Path::new("fuzzy.toml"),
        )?;
        let options = config.search.to_builder().build()?;
        let preset = FinderOptions::fuzzy();
        assert_eq!(options.min_length(), preset.min_length());
        assert_eq!(options.max_length(), 90);
        assert!((options.similarity_threshold() - preset.similarity_threshold()).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse_config_str("[search]\nwindow = 3\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigError(ConfigError::InvalidFile { .. })
        ));
    }

    #[test]
    fn test_invalid_values_fail_on_build() -> Result<()> {
        let config = parse_config_str(
            "[search]\nmin_length = 30\nmax_length = 10\n",
            Path::new("range.toml"),
        )?;
        assert!(config.search.to_builder().build().is_err());
        Ok(())
    }

    #[test]
    fn test_read_from_disk() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "[search]\nmin_length = 8")?;
        let config = parse_config(file.path())?;
        assert_eq!(config.search.min_length, Some(8));

        let missing = parse_config(Path::new("/nonexistent/repseek.toml")).unwrap_err();
        assert!(matches!(
            missing,
            Error::InputError(InputError::Unreadable { .. })
        ));
        Ok(())
    }
}
