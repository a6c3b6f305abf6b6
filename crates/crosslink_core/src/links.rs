use std::collections::BTreeSet;

use crate::topics::{Link, Topic};

pub const DEFAULT_CONTACT_HREF: &str = "/contact";
pub const DEFAULT_CONTACT_LABEL: &str = "Schedule a Free Consultation";

pub const MAX_RELATED_LINKS: usize = 3;

pub fn default_contact_link() -> Link {
    Link::new(DEFAULT_CONTACT_HREF, DEFAULT_CONTACT_LABEL)
}

/// Build the ordered link list for a page: the topic pillar, up to three
/// related links, then the contact link. No entry points back at `route`
/// and no destination appears twice. Catalog entries pointing at the
/// contact destination are dropped so the contact link always comes last.
pub fn synthesize_links(topic: &Topic, route: &str, contact: &Link) -> Vec<Link> {
    let own_route = normalize_href(route);
    let contact_href = normalize_href(&contact.href);
    let mut seen = BTreeSet::new();
    seen.insert(own_route.clone());
    seen.insert(contact_href.clone());
    let mut links = Vec::with_capacity(MAX_RELATED_LINKS + 2);

    if seen.insert(normalize_href(&topic.pillar.href)) {
        links.push(topic.pillar.clone());
    }

    let mut related = 0usize;
    for candidate in &topic.related {
        if related == MAX_RELATED_LINKS {
            break;
        }
        if seen.insert(normalize_href(&candidate.href)) {
            links.push(candidate.clone());
            related += 1;
        }
    }

    if contact_href != own_route {
        links.push(contact.clone());
    }
    links
}

/// Compare destinations without trailing slashes, query strings, or
/// fragments. The site root stays `/`.
pub fn normalize_href(href: &str) -> String {
    let path = href
        .trim()
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
