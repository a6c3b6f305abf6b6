use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_PAGE_FILES: &[&str] = &["page.tsx", "page.jsx", "page.ts", "page.js"];

const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// One routable page found under the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    /// Path relative to the content root, always `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
}

impl PageFile {
    pub fn new(content_dir: &Path, absolute_path: PathBuf) -> Self {
        let relative_path = absolute_path
            .strip_prefix(content_dir)
            .map(normalize_relative)
            .unwrap_or_else(|_| normalize_relative(&absolute_path));
        Self {
            relative_path,
            absolute_path,
        }
    }
}

/// A subtree that could not be read. It is reported per item and never
/// aborts the rest of the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub pages: Vec<PageFile>,
    pub failures: Vec<DiscoveryFailure>,
}

pub fn discover_pages(content_dir: &Path, page_files: &[String]) -> Result<Discovery> {
    if !content_dir.is_dir() {
        bail!("content directory not found: {}", content_dir.display());
    }

    let mut discovery = Discovery::default();
    let walker = WalkDir::new(content_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let path = error
                    .path()
                    .map(|path| display_relative(content_dir, path))
                    .unwrap_or_else(|| "<unknown>".to_string());
                let reason = error
                    .io_error()
                    .map(|io| io.to_string())
                    .unwrap_or_else(|| error.to_string());
                warn!(path = %path, reason = %reason, "skipping unreadable subtree");
                discovery.failures.push(DiscoveryFailure { path, reason });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !page_files.iter().any(|candidate| candidate == name.as_ref()) {
            continue;
        }
        discovery
            .pages
            .push(PageFile::new(content_dir, entry.into_path()));
    }

    discovery
        .pages
        .sort_by(|left, right| left.relative_path.cmp(&right.relative_path));
    debug!(
        pages = discovery.pages.len(),
        failures = discovery.failures.len(),
        "discovery finished"
    );
    Ok(discovery)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Directory segments of a page path, excluding the file name itself.
pub fn directory_segments(relative_path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    segments.pop();
    segments
}

/// Directory segments that appear in the URL. Route groups such as
/// `(marketing)` and parallel-route slots such as `@modal` are dropped.
pub fn route_segments(relative_path: &str) -> Vec<&str> {
    directory_segments(relative_path)
        .into_iter()
        .filter(|segment| !is_route_group(segment) && !segment.starts_with('@'))
        .collect()
}

pub fn route_for(relative_path: &str) -> String {
    format!("/{}", route_segments(relative_path).join("/"))
}

/// The last directory segment, or an empty string for the root page.
pub fn folder_name(relative_path: &str) -> &str {
    directory_segments(relative_path)
        .last()
        .copied()
        .unwrap_or_default()
}

fn is_route_group(segment: &str) -> bool {
    segment.starts_with('(') && segment.ends_with(')')
}

fn normalize_relative(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn display_relative(content_dir: &Path, path: &Path) -> String {
    path.strip_prefix(content_dir)
        .map(normalize_relative)
        .unwrap_or_else(|_| normalize_relative(path))
}
