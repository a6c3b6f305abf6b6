use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::{CONFIG_FILENAME, CrosslinkConfig, DEFAULT_CONTENT_DIR, load_config};

const PROJECT_MARKERS: &[&str] = &[CONFIG_FILENAME, "package.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Config,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Config => "config",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub content_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub content_dir: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub content_source: ValueSource,
    pub config_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\ncontent_dir={} ({})\nconfig_path={} ({}, {})",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.content_dir),
            self.content_source.as_str(),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
            if self.config_path.exists() {
                "found"
            } else {
                "missing"
            }
        )
    }
}

/// Resolved paths plus the config file they point at.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub paths: ResolvedPaths,
    pub config: CrosslinkConfig,
}

pub fn resolve_runtime(context: &ResolutionContext, overrides: &PathOverrides) -> Result<Runtime> {
    resolve_runtime_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_runtime_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<Runtime>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| {
        lookup_env(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let (project_root, root_source) = if let Some(path) = overrides.project_root.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = lookup("CROSSLINK_PROJECT_ROOT") {
        (absolutize(Path::new(&value), &context.cwd), ValueSource::Env)
    } else if let Some(found) = find_project_root(&context.cwd) {
        (found, ValueSource::Heuristic)
    } else {
        (context.cwd.clone(), ValueSource::Default)
    };
    if !project_root.is_dir() {
        bail!(
            "project root does not exist: {}",
            normalize_for_display(&project_root)
        );
    }

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some(value) = lookup("CROSSLINK_CONFIG") {
        (absolutize(Path::new(&value), &project_root), ValueSource::Env)
    } else {
        (project_root.join(CONFIG_FILENAME), ValueSource::Default)
    };
    if config_source != ValueSource::Default && !config_path.exists() {
        bail!(
            "config file not found: {}",
            normalize_for_display(&config_path)
        );
    }
    let config = load_config(&config_path)?;

    let (content_dir, content_source) = if let Some(path) = overrides.content_dir.as_deref() {
        (absolutize(path, &project_root), ValueSource::Flag)
    } else if let Some(value) = lookup("CROSSLINK_CONTENT_DIR") {
        (absolutize(Path::new(&value), &project_root), ValueSource::Env)
    } else if let Some(value) = config.site.content_dir.as_deref() {
        (absolutize(Path::new(value), &project_root), ValueSource::Config)
    } else {
        (project_root.join(DEFAULT_CONTENT_DIR), ValueSource::Default)
    };

    Ok(Runtime {
        paths: ResolvedPaths {
            project_root,
            content_dir,
            config_path,
            root_source,
            content_source,
            config_source,
        },
        config,
    })
}

/// Nearest ancestor of `start` that looks like a site checkout.
fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| {
            PROJECT_MARKERS
                .iter()
                .any(|marker| candidate.join(marker).is_file())
        })
        .map(Path::to_path_buf)
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
