use std::collections::BTreeSet;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// A cross-link destination and the text it is rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub label: String,
}

impl Link {
    pub fn new(href: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub keywords: Vec<String>,
    pub pillar: Link,
    pub related: Vec<Link>,
}

impl Topic {
    /// True when any keyword occurs in the (already lowercased) folder name.
    pub fn matches(&self, folder_name: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && folder_name.contains(keyword.as_str()))
    }
}

/// Priority-ordered classifier. Rules are evaluated front to back and the
/// first topic with a matching keyword wins; pages matching nothing land in
/// the fallback topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCatalog {
    rules: Vec<Topic>,
    fallback: Topic,
}

impl TopicCatalog {
    pub fn new(rules: Vec<Topic>, fallback: Topic) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for topic in rules.iter().chain(std::iter::once(&fallback)) {
            let name = topic.name.trim();
            if name.is_empty() {
                bail!("topic name cannot be empty");
            }
            if !seen.insert(name.to_string()) {
                bail!("duplicate topic name: {name}");
            }
            if topic.pillar.href.trim().is_empty() {
                bail!("topic `{name}` has an empty pillar href");
            }
        }
        let rules = rules
            .into_iter()
            .map(|mut topic| {
                topic.keywords = normalize_keywords(&topic.keywords);
                topic
            })
            .collect();
        Ok(Self { rules, fallback })
    }

    pub fn builtin() -> Self {
        Self {
            rules: vec![
                builtin_topic(
                    "historic",
                    &["historic", "heritage", "preservation", "landmark"],
                    ("/historic-restoration", "Historic Restoration Services"),
                    &[
                        (
                            "/historic-building-renovation-tampa",
                            "Historic Building Renovation in Tampa",
                        ),
                        (
                            "/historic-preservation-st-petersburg",
                            "Historic Preservation in St. Petersburg",
                        ),
                        (
                            "/historic-home-restoration-guide",
                            "Historic Home Restoration Guide",
                        ),
                        (
                            "/historic-restoration-costs-florida",
                            "Historic Restoration Costs in Florida",
                        ),
                    ],
                ),
                builtin_topic(
                    "disaster",
                    &[
                        "disaster",
                        "hurricane",
                        "storm",
                        "flood",
                        "water-damage",
                        "fire-damage",
                        "wind-damage",
                        "mold",
                        "emergency",
                        "recovery",
                        "insurance",
                    ],
                    ("/disaster-recovery", "Disaster Recovery & Restoration"),
                    &[
                        ("/hurricane-damage-repair", "Hurricane Damage Repair"),
                        (
                            "/storm-damage-restoration-tampa",
                            "Storm Damage Restoration in Tampa",
                        ),
                        ("/water-damage-restoration", "Water Damage Restoration"),
                        (
                            "/disaster-recovery-brandon",
                            "Disaster Recovery in Brandon",
                        ),
                        (
                            "/insurance-claim-construction",
                            "Insurance Claim Construction Help",
                        ),
                    ],
                ),
                builtin_topic(
                    "balcony",
                    &[
                        "balcony",
                        "balconies",
                        "railing",
                        "milestone",
                        "concrete",
                        "structural",
                        "sb-4d",
                    ],
                    ("/balcony-repair", "Balcony Repair & Restoration"),
                    &[
                        ("/balcony-inspection-florida", "Balcony Inspections in Florida"),
                        (
                            "/milestone-inspection-requirements",
                            "Milestone Inspection Requirements",
                        ),
                        ("/concrete-restoration", "Concrete Restoration"),
                        (
                            "/balcony-railing-replacement",
                            "Balcony Railing Replacement",
                        ),
                    ],
                ),
                builtin_topic(
                    "commercial",
                    &[
                        "commercial",
                        "office",
                        "retail",
                        "warehouse",
                        "tenant",
                        "restaurant",
                        "industrial",
                        "medical",
                        "church",
                    ],
                    ("/commercial-construction", "Commercial Construction Services"),
                    &[
                        (
                            "/commercial-renovation-tampa",
                            "Commercial Renovation in Tampa",
                        ),
                        ("/tenant-improvement", "Tenant Improvement Build-Outs"),
                        ("/office-buildout", "Office Build-Out Services"),
                        ("/retail-construction", "Retail Construction"),
                    ],
                ),
                builtin_topic(
                    "residential",
                    &[
                        "residential",
                        "home",
                        "house",
                        "kitchen",
                        "bathroom",
                        "remodel",
                        "addition",
                        "roof",
                        "garage",
                    ],
                    ("/residential-construction", "Residential Construction Services"),
                    &[
                        ("/custom-home-builder-tampa", "Custom Home Builder in Tampa"),
                        ("/home-additions", "Home Additions"),
                        ("/kitchen-remodeling", "Kitchen Remodeling"),
                        ("/whole-home-renovation", "Whole-Home Renovation"),
                    ],
                ),
            ],
            fallback: builtin_topic(
                "construction",
                &["construction", "contractor", "builder", "renovation"],
                ("/general-contractor-tampa", "General Contractor in Tampa Bay"),
                &[
                    ("/construction-management", "Construction Management"),
                    ("/design-build", "Design-Build Services"),
                    ("/commercial-construction", "Commercial Construction Services"),
                    (
                        "/residential-construction",
                        "Residential Construction Services",
                    ),
                ],
            ),
        }
    }

    /// Classify a folder name. Matching is case-insensitive.
    pub fn classify(&self, folder_name: &str) -> &Topic {
        let folder_name = folder_name.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|topic| topic.matches(&folder_name))
            .unwrap_or(&self.fallback)
    }

    pub fn rules(&self) -> &[Topic] {
        &self.rules
    }

    /// Topic names in evaluation order, fallback last.
    pub fn topic_names(&self) -> Vec<&str> {
        self.rules
            .iter()
            .chain(std::iter::once(&self.fallback))
            .map(|topic| topic.name.as_str())
            .collect()
    }
}

impl Default for TopicCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_topic(
    name: &str,
    keywords: &[&str],
    pillar: (&str, &str),
    related: &[(&str, &str)],
) -> Topic {
    Topic {
        name: name.to_string(),
        keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
        pillar: Link::new(pillar.0, pillar.1),
        related: related
            .iter()
            .map(|(href, label)| Link::new(*href, *label))
            .collect(),
    }
}

fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|keyword| keyword.trim().to_ascii_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}
