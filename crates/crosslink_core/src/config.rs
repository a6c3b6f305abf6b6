use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::discovery::DEFAULT_PAGE_FILES;
use crate::eligibility::ExclusionRules;
use crate::links::default_contact_link;
use crate::rewrite::ComponentSpec;
use crate::topics::{Link, Topic, TopicCatalog};

pub const CONFIG_FILENAME: &str = "crosslink.toml";
pub const DEFAULT_CONTENT_DIR: &str = "app";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CrosslinkConfig {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub exclusions: ExclusionSection,
    #[serde(default)]
    pub topics: Vec<TopicEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    pub content_dir: Option<String>,
    pub page_files: Option<Vec<String>>,
    pub component_name: Option<String>,
    pub component_import: Option<String>,
    pub links_title: Option<String>,
    pub links_const: Option<String>,
    pub contact: Option<Link>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExclusionSection {
    pub hub_sections: Option<Vec<String>>,
    pub utility_pages: Option<Vec<String>>,
    pub markers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TopicEntry {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub fallback: bool,
    pub pillar: Link,
    #[serde(default)]
    pub related: Vec<Link>,
}

/// Load and parse a config file. Returns defaults if the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<CrosslinkConfig> {
    if !config_path.exists() {
        return Ok(CrosslinkConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: CrosslinkConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Everything the annotator needs besides paths, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub page_files: Vec<String>,
    pub component: ComponentSpec,
    pub contact: Link,
    pub exclusions: ExclusionRules,
    pub catalog: TopicCatalog,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_files: DEFAULT_PAGE_FILES.iter().map(|name| name.to_string()).collect(),
            component: ComponentSpec::default(),
            contact: default_contact_link(),
            exclusions: ExclusionRules::default(),
            catalog: TopicCatalog::builtin(),
        }
    }
}

impl Settings {
    pub fn from_config(config: &CrosslinkConfig) -> Result<Self> {
        let mut settings = Self::default();
        let site = &config.site;

        if let Some(page_files) = &site.page_files {
            let page_files = non_empty_values(page_files);
            if page_files.is_empty() {
                bail!("site.page_files cannot be empty");
            }
            settings.page_files = page_files;
        }
        if let Some(name) = &site.component_name {
            ensure_identifier("site.component_name", name)?;
            if !name.starts_with(|ch: char| ch.is_ascii_uppercase()) {
                bail!("site.component_name must start with an uppercase letter: {name}");
            }
            settings.component.name = name.clone();
        }
        if let Some(import) = &site.component_import {
            if import.trim().is_empty() {
                bail!("site.component_import cannot be empty");
            }
            settings.component.import_path = import.trim().to_string();
        }
        if let Some(title) = &site.links_title {
            settings.component.title = title.clone();
        }
        if let Some(links_const) = &site.links_const {
            ensure_identifier("site.links_const", links_const)?;
            settings.component.links_const = links_const.clone();
        }
        if let Some(contact) = &site.contact {
            if contact.href.trim().is_empty() {
                bail!("site.contact.href cannot be empty");
            }
            settings.contact = contact.clone();
        }

        let exclusions = &config.exclusions;
        if let Some(hubs) = &exclusions.hub_sections {
            settings.exclusions.hub_sections = non_empty_values(hubs);
        }
        if let Some(pages) = &exclusions.utility_pages {
            settings.exclusions.utility_pages = non_empty_values(pages);
        }
        if let Some(markers) = &exclusions.markers {
            settings.exclusions.markers = non_empty_values(markers);
        }
        // Pages we annotate must be recognized as annotated on the next run.
        let render_marker = settings.component.render_marker();
        if settings.exclusions.find_marker(&render_marker).is_none() {
            settings
                .exclusions
                .markers
                .push(settings.component.name.clone());
        }

        if !config.topics.is_empty() {
            settings.catalog = catalog_from_entries(&config.topics)?;
        }
        Ok(settings)
    }
}

fn catalog_from_entries(entries: &[TopicEntry]) -> Result<TopicCatalog> {
    let fallbacks: Vec<&TopicEntry> = entries.iter().filter(|entry| entry.fallback).collect();
    let fallback = match fallbacks.as_slice() {
        [fallback] => *fallback,
        [] => bail!("topics must mark exactly one entry with `fallback = true`"),
        _ => bail!(
            "topics mark {} entries as fallback; exactly one is allowed",
            fallbacks.len()
        ),
    };
    let rules = entries
        .iter()
        .filter(|entry| !entry.fallback)
        .map(|entry| {
            if entry.keywords.iter().all(|keyword| keyword.trim().is_empty()) {
                bail!("topic `{}` needs at least one keyword", entry.name);
            }
            Ok(topic_from_entry(entry))
        })
        .collect::<Result<Vec<_>>>()?;
    TopicCatalog::new(rules, topic_from_entry(fallback))
}

fn topic_from_entry(entry: &TopicEntry) -> Topic {
    Topic {
        name: entry.name.trim().to_string(),
        keywords: entry.keywords.clone(),
        pillar: entry.pillar.clone(),
        related: entry.related.clone(),
    }
}

fn non_empty_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn ensure_identifier(key: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$');
    if !valid {
        bail!("{key} must be a JavaScript identifier: {value}");
    }
    Ok(())
}
