//! Layered configuration for the command line.
//!
//! Values are resolved lowest first: built-in defaults, a YAML config file,
//! environment variables (`MIGRAPTOR_*` before the legacy names), then flags.

use clap::Args;
use migraptor_core::config::default_registry;
use migraptor_core::{AppConfig, MigraptorError, MigrationSettings, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Flags shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub struct Options {
    /// GitLab API token
    #[arg(short = 'g', long, global = true)]
    pub token: Option<String>,

    /// Full path of the group to migrate
    #[arg(short = 'o', long, global = true)]
    pub old_group: Option<String>,

    /// Full path of the group receiving the migrated projects
    #[arg(short = 'n', long, global = true)]
    pub new_group: Option<String>,

    /// GitLab instance host
    #[arg(short = 'i', long, global = true)]
    pub instance: Option<String>,

    /// Container registry host, defaults to registry.<instance>
    #[arg(short = 'r', long, global = true)]
    pub registry: Option<String>,

    /// Registry password, defaults to the API token
    #[arg(short = 'p', long, global = true)]
    pub docker_password: Option<String>,

    /// Comma-separated project paths to migrate
    #[arg(short = 'l', long, value_delimiter = ',', global = true)]
    pub projects: Vec<String>,

    /// Comma-separated image tags to keep
    #[arg(short = 't', long, value_delimiter = ',', global = true)]
    pub tags: Vec<String>,

    /// Do not keep the parent group: move projects one by one into the new group
    #[arg(short = 'k', long, global = true)]
    pub keep_parent: bool,

    /// Log what would be done without changing anything
    #[arg(short = 'f', long, global = true)]
    pub dry_run: bool,

    /// Debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of the default locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// A list given either as a YAML sequence or as a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListValue {
    Many(Vec<String>),
    Csv(String),
}

impl ListValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            ListValue::Many(items) => clean_list(items),
            ListValue::Csv(raw) => parse_list(&raw),
        }
    }
}

/// Config file contents. Keys are accepted in kebab-case and snake_case.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigFile {
    #[serde(alias = "gitlab_token")]
    pub token: Option<String>,
    #[serde(alias = "gitlab_instance")]
    pub instance: Option<String>,
    #[serde(alias = "gitlab_registry")]
    pub registry: Option<String>,
    #[serde(alias = "docker_token", alias = "docker_password")]
    pub docker_password: Option<String>,
    #[serde(alias = "old_group_name", alias = "old_group")]
    pub old_group: Option<String>,
    #[serde(alias = "new_group_name", alias = "new_group")]
    pub new_group: Option<String>,
    #[serde(alias = "projects_list")]
    pub projects: Option<ListValue>,
    #[serde(alias = "tags_list")]
    pub tags: Option<ListValue>,
    #[serde(alias = "keep_parent")]
    pub keep_parent: Option<bool>,
    #[serde(alias = "dry_run")]
    pub dry_run: Option<bool>,
    pub verbose: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| MigraptorError::Config {
            message: format!("Cannot read config file {}: {}", path.display(), e),
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|e| MigraptorError::Config {
            message: format!("Invalid config file {}: {}", path.display(), e),
        })
    }
}

/// One configuration layer. `None` leaves the lower layer's value in place.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Layer {
    token: Option<String>,
    instance: Option<String>,
    registry: Option<String>,
    docker_password: Option<String>,
    old_group: Option<String>,
    new_group: Option<String>,
    projects: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    preserve_hierarchy: Option<bool>,
    dry_run: Option<bool>,
    verbose: Option<bool>,
}

impl Layer {
    fn defaults() -> Self {
        Self {
            instance: Some(AppConfig::DEFAULT_INSTANCE.to_string()),
            preserve_hierarchy: Some(true),
            dry_run: Some(false),
            verbose: Some(false),
            ..Default::default()
        }
    }

    fn overlay(self, higher: Layer) -> Layer {
        Layer {
            token: higher.token.or(self.token),
            instance: higher.instance.or(self.instance),
            registry: higher.registry.or(self.registry),
            docker_password: higher.docker_password.or(self.docker_password),
            old_group: higher.old_group.or(self.old_group),
            new_group: higher.new_group.or(self.new_group),
            projects: higher.projects.or(self.projects),
            tags: higher.tags.or(self.tags),
            preserve_hierarchy: higher.preserve_hierarchy.or(self.preserve_hierarchy),
            dry_run: higher.dry_run.or(self.dry_run),
            verbose: higher.verbose.or(self.verbose),
        }
    }

    fn from_file(file: ConfigFile) -> Self {
        Self {
            token: non_empty(file.token),
            instance: non_empty(file.instance),
            registry: non_empty(file.registry),
            docker_password: non_empty(file.docker_password),
            old_group: non_empty(file.old_group),
            new_group: non_empty(file.new_group),
            projects: file.projects.map(ListValue::into_vec),
            tags: file.tags.map(ListValue::into_vec),
            preserve_hierarchy: file.keep_parent,
            dry_run: file.dry_run,
            verbose: file.verbose,
        }
    }

    fn from_env(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |prefixed: &str, legacy: &str| {
            non_empty(lookup(prefixed)).or_else(|| non_empty(lookup(legacy)))
        };
        let flag = |prefixed: &str, legacy: &str| -> Result<Option<bool>> {
            match get(prefixed, legacy) {
                Some(raw) => parse_bool(&raw).map(Some).ok_or_else(|| MigraptorError::Config {
                    message: format!("{} is not a boolean: {}", prefixed, raw),
                }),
                None => Ok(None),
            }
        };

        Ok(Self {
            token: get("MIGRAPTOR_TOKEN", "GITLAB_TOKEN"),
            instance: get("MIGRAPTOR_INSTANCE", "GITLAB_INSTANCE"),
            registry: get("MIGRAPTOR_REGISTRY", "GITLAB_REGISTRY"),
            docker_password: get("MIGRAPTOR_DOCKER_PASSWORD", "DOCKER_TOKEN"),
            old_group: get("MIGRAPTOR_OLD_GROUP", "OLD_GROUP_NAME"),
            new_group: get("MIGRAPTOR_NEW_GROUP", "NEW_GROUP_NAME"),
            projects: get("MIGRAPTOR_PROJECTS", "PROJECTS_LIST").map(|raw| parse_list(&raw)),
            tags: get("MIGRAPTOR_TAGS", "TAGS_LIST").map(|raw| parse_list(&raw)),
            preserve_hierarchy: flag("MIGRAPTOR_KEEP_PARENT", "KEEP_PARENT")?,
            dry_run: flag("MIGRAPTOR_DRY_RUN", "DRY_RUN")?,
            verbose: flag("MIGRAPTOR_VERBOSE", "VERBOSE")?,
        })
    }

    fn from_options(options: &Options) -> Self {
        let list = |items: &[String]| {
            let items = clean_list(items.to_vec());
            (!items.is_empty()).then_some(items)
        };
        Self {
            token: non_empty(options.token.clone()),
            instance: non_empty(options.instance.clone()),
            registry: non_empty(options.registry.clone()),
            docker_password: non_empty(options.docker_password.clone()),
            old_group: non_empty(options.old_group.clone()),
            new_group: non_empty(options.new_group.clone()),
            projects: list(&options.projects),
            tags: list(&options.tags),
            // `-k` is inverted: setting it means "do not keep the parent".
            preserve_hierarchy: options.keep_parent.then_some(false),
            dry_run: options.dry_run.then_some(true),
            verbose: options.verbose.then_some(true),
        }
    }
}

/// Fully resolved configuration.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub token: String,
    pub docker_password: String,
    pub instance: String,
    pub registry: String,
    pub old_group: String,
    pub new_group: String,
    pub projects: Vec<String>,
    pub tags: Vec<String>,
    pub preserve_hierarchy: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("token", &"<redacted>")
            .field("instance", &self.instance)
            .field("registry", &self.registry)
            .field("old_group", &self.old_group)
            .field("new_group", &self.new_group)
            .field("projects", &self.projects)
            .field("tags", &self.tags)
            .field("preserve_hierarchy", &self.preserve_hierarchy)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl ResolvedConfig {
    /// Check the values every subcommand needs.
    pub fn require_common(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(MigraptorError::Validation {
                field: "token".into(),
                message: "GitLab token is required".into(),
            });
        }
        if self.old_group.is_empty() {
            return Err(MigraptorError::Validation {
                field: "old-group".into(),
                message: "old group name is required".into(),
            });
        }
        Ok(())
    }

    /// Settings for a migration run.
    pub fn migration_settings(&self) -> Result<MigrationSettings> {
        self.require_common()?;
        let mut settings = MigrationSettings::new(&self.old_group, &self.new_group)
            .with_project_filter(self.projects.clone())
            .with_tag_filter(self.tags.clone())
            .with_preserve_hierarchy(self.preserve_hierarchy)
            .with_dry_run(self.dry_run);
        settings.instance = self.instance.clone();
        settings.registry = self.registry.clone();
        settings.validate()?;
        Ok(settings)
    }
}

/// Where a config file was looked for.
pub struct SearchPaths {
    pub explicit: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub home_dir: Option<PathBuf>,
}

impl SearchPaths {
    pub fn from_process(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            working_dir: std::env::current_dir().ok(),
            home_dir: dirs::home_dir(),
        }
    }

    /// First existing config file, if any. An explicit path must exist.
    pub fn locate(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.explicit {
            if !path.is_file() {
                return Err(MigraptorError::Config {
                    message: format!("Config file not found: {}", path.display()),
                });
            }
            return Ok(Some(path.clone()));
        }

        let stem = AppConfig::CONFIG_FILE_STEM;
        let mut candidates = Vec::new();
        if let Some(dir) = &self.working_dir {
            candidates.push(dir.join(format!("{}.yaml", stem)));
            candidates.push(dir.join(format!("{}.yml", stem)));
        }
        if let Some(home) = &self.home_dir {
            candidates.push(home.join(format!(".{}.yaml", stem)));
            candidates.push(home.join(format!(".{}.yml", stem)));
        }
        Ok(candidates.into_iter().find(|path| path.is_file()))
    }
}

/// Resolve every layer into the final configuration.
pub fn resolve(
    options: &Options,
    paths: &SearchPaths,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let mut layers = Layer::defaults();

    if let Some(path) = paths.locate()? {
        tracing::debug!("Using config file {}", path.display());
        layers = layers.overlay(Layer::from_file(ConfigFile::load(&path)?));
    }
    layers = layers.overlay(Layer::from_env(env)?);
    layers = layers.overlay(Layer::from_options(options));

    let token = layers.token.unwrap_or_default();
    let instance = layers
        .instance
        .unwrap_or_else(|| AppConfig::DEFAULT_INSTANCE.to_string());
    let registry = layers
        .registry
        .unwrap_or_else(|| default_registry(&instance));
    let docker_password = layers.docker_password.unwrap_or_else(|| token.clone());
    let new_group = layers
        .new_group
        .map(|path| path.trim_start_matches('/').to_string())
        .unwrap_or_default();

    Ok(ResolvedConfig {
        token,
        docker_password,
        instance,
        registry,
        old_group: layers.old_group.unwrap_or_default(),
        new_group,
        projects: layers.projects.unwrap_or_default(),
        tags: layers.tags.unwrap_or_default(),
        preserve_hierarchy: layers.preserve_hierarchy.unwrap_or(true),
        dry_run: layers.dry_run.unwrap_or(false),
        verbose: layers.verbose.unwrap_or(false),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(raw: &str) -> Vec<String> {
    clean_list(raw.split(',').map(str::to_string).collect())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
