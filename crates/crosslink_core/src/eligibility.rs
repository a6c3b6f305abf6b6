use serde::Serialize;

use crate::discovery::{folder_name, route_segments};
use crate::source::find_default_export;

pub const DEFAULT_HUB_SECTIONS: &[&str] = &["services", "locations", "service-areas", "blog", "api"];

pub const DEFAULT_UTILITY_PAGES: &[&str] = &[
    "contact",
    "about",
    "gallery",
    "team",
    "privacy",
    "privacy-policy",
    "terms",
    "terms-of-service",
    "careers",
    "reviews",
    "testimonials",
    "sitemap",
    "thank-you",
];

pub const DEFAULT_MARKERS: &[&str] = &[
    "InternalLinks",
    "RelatedArticles",
    "RelatedServices",
    "RelatedLinks",
    "RelatedPosts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    SpecialPage,
    AlreadyHasLinks,
    NoExport,
}

impl Exclusion {
    pub fn reason(self) -> &'static str {
        match self {
            Self::SpecialPage => "special page",
            Self::AlreadyHasLinks => "already has links",
            Self::NoExport => "no export found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Excluded(Exclusion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRules {
    pub hub_sections: Vec<String>,
    pub utility_pages: Vec<String>,
    pub markers: Vec<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self {
            hub_sections: to_owned(DEFAULT_HUB_SECTIONS),
            utility_pages: to_owned(DEFAULT_UTILITY_PAGES),
            markers: to_owned(DEFAULT_MARKERS),
        }
    }
}

impl ExclusionRules {
    /// Structural pages: the site root, anything under a hub section, and
    /// named utility pages.
    pub fn is_special(&self, relative_path: &str) -> bool {
        let segments = route_segments(relative_path);
        let Some(first) = segments.first() else {
            return true;
        };
        if self.hub_sections.iter().any(|hub| hub.eq_ignore_ascii_case(first)) {
            return true;
        }
        let folder = folder_name(relative_path);
        self.utility_pages
            .iter()
            .any(|page| page.eq_ignore_ascii_case(folder))
    }

    pub fn find_marker(&self, text: &str) -> Option<&str> {
        self.markers
            .iter()
            .map(String::as_str)
            .find(|marker| !marker.is_empty() && text.contains(marker))
    }
}

/// Decide whether a page should be annotated. Checks run in a fixed order
/// and the first exclusion wins: special page, then existing links, then a
/// missing default export.
pub fn assess(relative_path: &str, text: &str, rules: &ExclusionRules) -> Eligibility {
    if rules.is_special(relative_path) {
        return Eligibility::Excluded(Exclusion::SpecialPage);
    }
    if rules.find_marker(text).is_some() {
        return Eligibility::Excluded(Exclusion::AlreadyHasLinks);
    }
    if find_default_export(text).is_none() {
        return Eligibility::Excluded(Exclusion::NoExport);
    }
    Eligibility::Eligible
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
