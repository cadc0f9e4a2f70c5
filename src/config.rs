use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;

/// Enforced floor for the periodic refresh, to keep the poller polite.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
/// Enforced floor for the task-definition cache TTL.
pub const MIN_TASK_DEFINITION_TTL: Duration = Duration::from_secs(60);

const DEFAULT_REFRESH_SECS: u64 = 30;
const DEFAULT_TASK_DEFINITION_TTL_SECS: u64 = 300;

/// Resolved runtime configuration: CLI flags over the optional YAML config
/// file, with floors applied. Validation happens here, before the core is
/// constructed; the core never sees an invalid config.
#[derive(Debug, Clone)]
pub struct Config {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub cluster: Option<String>,
    pub refresh_interval: Duration,
    pub task_definition_ttl: Duration,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default, alias = "refresh_interval")]
    refresh_secs: Option<u64>,
    #[serde(default, alias = "task_definition_ttl")]
    task_def_ttl_secs: Option<u64>,
}

impl Config {
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let file = match discover_config_path() {
            Some(path) => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => ConfigFile::default(),
        };
        Ok(Self::merge(file, args))
    }

    fn merge(file: ConfigFile, args: &CliArgs) -> Self {
        let refresh_secs = args
            .refresh_secs
            .or(file.refresh_secs)
            .unwrap_or(DEFAULT_REFRESH_SECS);
        let ttl_secs = args
            .task_def_ttl_secs
            .or(file.task_def_ttl_secs)
            .unwrap_or(DEFAULT_TASK_DEFINITION_TTL_SECS);

        Self {
            region: args.region.clone().or(file.region),
            profile: args.profile.clone().or(file.profile),
            cluster: args.cluster.clone().or(file.cluster),
            refresh_interval: Duration::from_secs(refresh_secs).max(MIN_REFRESH_INTERVAL),
            task_definition_ttl: Duration::from_secs(ttl_secs).max(MIN_TASK_DEFINITION_TTL),
        }
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ECSTOP_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("ecstop.yaml"),
        PathBuf::from("ecstop.yml"),
        PathBuf::from(".ecstop.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/ecstop/config.yaml"),
            PathBuf::from(&home).join(".config/ecstop/config.yml"),
            PathBuf::from(&home).join(".ecstop.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = Config::merge(ConfigFile::default(), &CliArgs::default());
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.task_definition_ttl, Duration::from_secs(300));
        assert_eq!(config.region, None);
        assert_eq!(config.cluster, None);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let file: ConfigFile = serde_yaml::from_str(
            "region: eu-west-1\ncluster: staging\nrefresh_secs: 60\n",
        )
        .expect("parse");
        let args = CliArgs {
            cluster: Some("prod".to_string()),
            refresh_secs: Some(15),
            ..CliArgs::default()
        };

        let config = Config::merge(file, &args);
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.cluster.as_deref(), Some("prod"));
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
    }

    #[test]
    fn floors_are_enforced() {
        let args = CliArgs {
            refresh_secs: Some(1),
            task_def_ttl_secs: Some(10),
            ..CliArgs::default()
        };
        let config = Config::merge(ConfigFile::default(), &args);
        assert_eq!(config.refresh_interval, MIN_REFRESH_INTERVAL);
        assert_eq!(config.task_definition_ttl, MIN_TASK_DEFINITION_TTL);
    }

    #[test]
    fn file_aliases_are_accepted() {
        let file: ConfigFile =
            serde_yaml::from_str("refresh_interval: 45\ntask_definition_ttl: 600\n")
                .expect("parse");
        let config = Config::merge(file, &CliArgs::default());
        assert_eq!(config.refresh_interval, Duration::from_secs(45));
        assert_eq!(config.task_definition_ttl, Duration::from_secs(600));
    }
}
