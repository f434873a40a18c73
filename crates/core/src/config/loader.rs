use std::path::{Path, PathBuf};
use std::{env, fs};

use dirs::home_dir;
use shellexpand::full;
use thiserror::Error;

use crate::config::types::{
    ClassifyRuleConfig, ConfigFile, DEFAULT_INDEX_PATH, LoggingConfig, Profile, ResolvedConfig,
};
use crate::corpus::{ClassifyRule, DEFAULT_DENYLIST, DEFAULT_EXTENSIONS, default_rules};
use crate::index::{DocumentKind, TraversalLimits};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),

    #[error("failed to read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("failed to parse TOML in {0}: {1}")]
    ParseError(String, #[source] toml::de::Error),

    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("no profiles defined in config")]
    NoProfiles,

    #[error("version {0} is unsupported (expected 1)")]
    BadVersion(u32),

    #[error("invalid classification rule #{0}: {1}")]
    InvalidRule(usize, String),

    #[error("graph depths must satisfy 1 <= default_depth ({0}) <= max_depth ({1})")]
    InvalidDepth(u32, u32),

    #[error("environment variable ${var} in '{input}' is not set")]
    UndefinedVariable { var: String, input: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(
        config_path: Option<&Path>,
        profile_override: Option<&str>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let s = fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e))?;

        Self::from_toml(&s, &path, profile_override)
    }

    /// Resolve configuration from TOML text. `origin` is only used in errors.
    pub fn from_toml(
        text: &str,
        origin: &Path,
        profile_override: Option<&str>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let cf: ConfigFile = toml::from_str(text)
            .map_err(|e| ConfigError::ParseError(origin.display().to_string(), e))?;

        if cf.version != 1 {
            return Err(ConfigError::BadVersion(cf.version));
        }
        if cf.profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        let active = profile_override
            .map(ToOwned::to_owned)
            .or(cf.profile.clone())
            .unwrap_or_else(|| "default".to_string());

        let prof = cf
            .profiles
            .get(&active)
            .ok_or_else(|| ConfigError::ProfileNotFound(active.clone()))?;

        Self::resolve_profile(&active, prof, &cf)
    }

    fn resolve_profile(
        active: &str,
        prof: &Profile,
        cf: &ConfigFile,
    ) -> Result<ResolvedConfig, ConfigError> {
        let root = expand_path(&prof.root)?;
        let sub = |s: &str| s.replace("{{root}}", &root.to_string_lossy());

        let index_path =
            expand_path(&sub(prof.index_path.as_deref().unwrap_or(DEFAULT_INDEX_PATH)))?;

        let limits = TraversalLimits {
            default_depth: cf.graph.default_depth,
            max_depth: cf.graph.max_depth,
        };
        if limits.default_depth == 0 || limits.default_depth > limits.max_depth {
            return Err(ConfigError::InvalidDepth(limits.default_depth, limits.max_depth));
        }

        let classify_rules = match &cf.classify {
            Some(rules) => rules
                .iter()
                .enumerate()
                .map(|(i, rule)| resolve_rule(i + 1, rule))
                .collect::<Result<Vec<_>, _>>()?,
            None => default_rules(),
        };

        // Resolve log file path if present
        let logging = if let Some(ref file) = cf.logging.file {
            LoggingConfig {
                level: cf.logging.level.clone(),
                file_level: cf.logging.file_level.clone(),
                file: Some(expand_path(&sub(&file.to_string_lossy()))?),
            }
        } else {
            cf.logging.clone()
        };

        Ok(ResolvedConfig {
            active_profile: active.to_string(),
            excluded_folders: prof.excluded_folders.iter().map(PathBuf::from).collect(),
            extensions: cf
                .walker
                .extensions
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()),
            denylist: cf
                .walker
                .denylist
                .clone()
                .unwrap_or_else(|| DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect()),
            classify_rules,
            limits,
            search_limit: cf.search.default_limit,
            logging,
            root,
            index_path,
        })
    }
}

fn resolve_rule(position: usize, rule: &ClassifyRuleConfig) -> Result<ClassifyRule, ConfigError> {
    let kind: DocumentKind =
        rule.kind.parse().map_err(|e| ConfigError::InvalidRule(position, format!("{e}")))?;

    match (&rule.segment, &rule.file_name) {
        (Some(segment), None) => Ok(ClassifyRule::segment(segment, kind)),
        (None, Some(name)) => Ok(ClassifyRule::file_name(name, kind)),
        _ => Err(ConfigError::InvalidRule(
            position,
            "set exactly one of `segment` or `file_name`".to_string(),
        )),
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("kbindex").join("config.toml");
    }
    let home = home_dir().unwrap_or_else(|| PathBuf::from("~"));
    home.join(".config").join("kbindex").join("config.toml")
}

fn expand_path(input: &str) -> Result<PathBuf, ConfigError> {
    let expanded = full(input).map_err(|e| ConfigError::UndefinedVariable {
        var: e.var_name,
        input: input.to_string(),
    })?;
    Ok(PathBuf::from(expanded.to_string()))
}
