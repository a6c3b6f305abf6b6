use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::discovery::{PageFile, discover_pages, folder_name, route_for};
use crate::eligibility::{Eligibility, Exclusion, assess};
use crate::links::synthesize_links;
use crate::rewrite::{RewriteError, rewrite_page, unified_diff};
use crate::runtime::normalize_for_display;
use crate::topics::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    DryRun,
}

impl RunMode {
    pub fn writes(self) -> bool {
        self == Self::Live
    }
}

#[derive(Debug, Clone)]
pub struct RunPlan<'a> {
    pub content_dir: &'a Path,
    pub mode: RunMode,
    pub settings: &'a Settings,
    pub include_diffs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Skipped {
        exclusion: Exclusion,
        reason: &'static str,
    },
    Updated {
        topic: String,
        links: Vec<Link>,
    },
    Error {
        reason: String,
    },
}

impl FileOutcome {
    fn skipped(exclusion: Exclusion) -> Self {
        Self::Skipped {
            exclusion,
            reason: exclusion.reason(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub relative_path: String,
    pub outcome: FileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Per-outcome counters. Built by folding outcomes, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub updated: usize,
    pub already_has_links: usize,
    pub special: usize,
    pub no_export: usize,
    pub errors: usize,
    pub by_topic: BTreeMap<String, usize>,
}

impl RunStats {
    pub fn record(self, outcome: &FileOutcome) -> Self {
        let total = self.total + 1;
        match outcome {
            FileOutcome::Skipped { exclusion, .. } => match exclusion {
                Exclusion::SpecialPage => Self {
                    total,
                    special: self.special + 1,
                    ..self
                },
                Exclusion::AlreadyHasLinks => Self {
                    total,
                    already_has_links: self.already_has_links + 1,
                    ..self
                },
                Exclusion::NoExport => Self {
                    total,
                    no_export: self.no_export + 1,
                    ..self
                },
            },
            FileOutcome::Updated { topic, .. } => {
                let mut by_topic = self.by_topic;
                *by_topic.entry(topic.clone()).or_insert(0) += 1;
                Self {
                    total,
                    updated: self.updated + 1,
                    by_topic,
                    ..self
                }
            }
            FileOutcome::Error { .. } => Self {
                total,
                errors: self.errors + 1,
                ..self
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub content_dir: String,
    pub files: Vec<FileReport>,
    pub stats: RunStats,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }

    /// 1 when any file failed, regardless of mode.
    pub fn exit_code(&self) -> u8 {
        if self.has_errors() { 1 } else { 0 }
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().filter_map(|file| match &file.outcome {
            FileOutcome::Error { reason } => Some((file.relative_path.as_str(), reason.as_str())),
            _ => None,
        })
    }
}

/// What would happen to one page, computed without touching disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Excluded(Exclusion),
    Rewritten {
        topic: String,
        links: Vec<Link>,
        output: String,
    },
}

pub fn annotate_source(
    relative_path: &str,
    text: &str,
    settings: &Settings,
) -> Result<Annotation, RewriteError> {
    if let Eligibility::Excluded(exclusion) = assess(relative_path, text, &settings.exclusions) {
        return Ok(Annotation::Excluded(exclusion));
    }
    let topic = settings.catalog.classify(folder_name(relative_path));
    let links = synthesize_links(topic, &route_for(relative_path), &settings.contact);
    let output = rewrite_page(text, &links, &settings.component)?;
    Ok(Annotation::Rewritten {
        topic: topic.name.clone(),
        links,
        output,
    })
}

/// Discover, classify, and rewrite every page under the content root. Only
/// a missing content root fails the run; every per-file problem becomes an
/// error outcome for that file.
pub fn annotate(plan: &RunPlan<'_>) -> Result<RunReport> {
    let discovery = discover_pages(plan.content_dir, &plan.settings.page_files)?;

    let mut files: Vec<FileReport> = discovery
        .failures
        .into_iter()
        .map(|failure| FileReport {
            relative_path: failure.path,
            outcome: FileOutcome::Error {
                reason: failure.reason,
            },
            diff: None,
        })
        .collect();
    files.extend(discovery.pages.iter().map(|page| process_page(page, plan)));
    files.sort_by(|left, right| left.relative_path.cmp(&right.relative_path));

    let stats = files
        .iter()
        .fold(RunStats::default(), |stats, file| stats.record(&file.outcome));

    Ok(RunReport {
        mode: plan.mode,
        content_dir: normalize_for_display(plan.content_dir),
        files,
        stats,
    })
}

fn process_page(page: &PageFile, plan: &RunPlan<'_>) -> FileReport {
    let (outcome, diff) = match annotate_file(page, plan) {
        Ok(result) => result,
        Err(error) => {
            let reason = format!("{error:#}");
            warn!(path = %page.relative_path, reason = %reason, "page failed");
            (FileOutcome::Error { reason }, None)
        }
    };
    FileReport {
        relative_path: page.relative_path.clone(),
        outcome,
        diff,
    }
}

fn annotate_file(page: &PageFile, plan: &RunPlan<'_>) -> Result<(FileOutcome, Option<String>)> {
    let text = fs::read_to_string(&page.absolute_path)
        .with_context(|| format!("failed to read {}", page.absolute_path.display()))?;

    match annotate_source(&page.relative_path, &text, plan.settings)? {
        Annotation::Excluded(exclusion) => {
            debug!(path = %page.relative_path, reason = exclusion.reason(), "skipped");
            Ok((FileOutcome::skipped(exclusion), None))
        }
        Annotation::Rewritten {
            topic,
            links,
            output,
        } => {
            let diff = plan
                .include_diffs
                .then(|| unified_diff(&page.relative_path, &text, &output));
            if plan.mode.writes() {
                fs::write(&page.absolute_path, &output)
                    .with_context(|| format!("failed to write {}", page.absolute_path.display()))?;
                info!(path = %page.relative_path, topic = %topic, links = links.len(), "updated");
            } else {
                debug!(path = %page.relative_path, topic = %topic, "would update");
            }
            Ok((FileOutcome::Updated { topic, links }, diff))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    use sha2::{Digest, Sha256};
    use tempfile::tempdir;
    use walkdir::WalkDir;

    use super::{FileOutcome, RunMode, RunPlan, RunReport, RunStats, annotate};
    use crate::config::Settings;
    use crate::eligibility::Exclusion;

    fn page(heading: &str) -> String {
        format!(
            "import Hero from '@/components/Hero';\n\nexport const metadata = {{ title: '{heading}' }};\n\nexport default function Page() {{\n  return (\n    <main>\n      <Hero title=\"{heading}\" />\n      <section className=\"cta\">\n        <a href=\"/contact\">Call today</a>\n      </section>\n    </main>\n  );\n}}\n"
        )
    }

    fn write_page(root: &Path, dir: &str, text: &str) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).expect("create page dir");
        fs::write(dir.join("page.tsx"), text).expect("write page");
    }

    fn fingerprint(root: &Path) -> BTreeMap<String, String> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let bytes = fs::read(entry.path()).expect("read file");
                (
                    entry.path().to_string_lossy().to_string(),
                    format!("{:x}", Sha256::digest(&bytes)),
                )
            })
            .collect()
    }

    fn run(root: &Path, mode: RunMode) -> RunReport {
        let settings = Settings::default();
        annotate(&RunPlan {
            content_dir: root,
            mode,
            settings: &settings,
            include_diffs: false,
        })
        .expect("annotate")
    }

    fn outcome<'a>(report: &'a RunReport, path: &str) -> &'a FileOutcome {
        &report
            .files
            .iter()
            .find(|file| file.relative_path == path)
            .expect("file in report")
            .outcome
    }

    #[test]
    fn live_run_updates_and_classifies() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("app");
        write_page(&root, "disaster-recovery-brandon", &page("Brandon"));
        write_page(&root, "contact", &page("Contact"));
        write_page(
            &root,
            "storm-guide",
            &page("Guide").replace("<Hero", "<RelatedArticles />\n      <Hero"),
        );

        let report = run(&root, RunMode::Live);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.stats.total, 3);
        assert_eq!(report.stats.updated, 1);
        assert_eq!(report.stats.special, 1);
        assert_eq!(report.stats.already_has_links, 1);
        assert_eq!(report.stats.by_topic.get("disaster"), Some(&1));

        match outcome(&report, "disaster-recovery-brandon/page.tsx") {
            FileOutcome::Updated { topic, links } => {
                assert_eq!(topic, "disaster");
                assert!((4..=5).contains(&links.len()));
                assert_eq!(links.last().map(|link| link.href.as_str()), Some("/contact"));
                assert!(links.iter().all(|link| link.href != "/disaster-recovery-brandon"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let written = fs::read_to_string(root.join("disaster-recovery-brandon/page.tsx"))
            .expect("read updated");
        assert!(written.contains("import InternalLinks from '@/components/InternalLinks';"));
        assert!(written.contains("<InternalLinks title=\"Related Services\" links={internalLinks} />"));
        assert_eq!(
            fs::read_to_string(root.join("contact/page.tsx")).expect("read contact"),
            page("Contact")
        );
    }

    #[test]
    fn second_live_run_is_a_no_op() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("app");
        write_page(&root, "hurricane-roof-repair", &page("Roof"));
        write_page(&root, "kitchen-remodel-tampa", &page("Kitchen"));

        let first = run(&root, RunMode::Live);
        assert_eq!(first.stats.updated, 2);
        let after_first = fingerprint(&root);

        let second = run(&root, RunMode::Live);
        assert_eq!(second.stats.updated, 0);
        assert_eq!(second.stats.already_has_links, 2);
        assert_eq!(fingerprint(&root), after_first);
    }

    #[test]
    fn dry_run_writes_nothing_and_matches_live_counts() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("app");
        for index in 0..10 {
            write_page(&root, &format!("commercial-project-{index}"), &page("Project"));
        }
        let before = fingerprint(&root);

        let dry = run(&root, RunMode::DryRun);
        assert_eq!(dry.exit_code(), 0);
        assert_eq!(dry.stats.updated, 10);
        assert_eq!(fingerprint(&root), before);

        let live = run(&root, RunMode::Live);
        assert_eq!(live.stats, dry.stats);
        assert_ne!(fingerprint(&root), before);
    }

    #[test]
    fn one_broken_page_does_not_stop_the_batch() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("app");
        write_page(&root, "balcony-repair-tampa", &page("Balcony"));
        write_page(&root, "office-buildout", &page("Office"));
        write_page(
            &root,
            "broken-layout",
            "export default function Page() {\n  return null;\n}\n",
        );

        let report = run(&root, RunMode::Live);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.stats.updated, 2);
        assert_eq!(report.stats.errors, 1);
        assert_eq!(
            report.errors().collect::<Vec<_>>(),
            vec![("broken-layout/page.tsx", "could not find insertion point")]
        );
        assert_eq!(
            fs::read_to_string(root.join("broken-layout/page.tsx")).expect("read broken"),
            "export default function Page() {\n  return null;\n}\n"
        );
    }

    #[test]
    fn unanchorable_export_is_an_error_not_a_skip() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("app");
        let source = "const Page = () => <main>Roofing</main>;\n\nexport default Page;\n";
        write_page(&root, "roof-repair-tampa", source);
        write_page(&root, "roof-replacement", &page("Roof"));

        let report = run(&root, RunMode::Live);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.stats.no_export, 0);
        assert_eq!(report.stats.updated, 1);
        assert_eq!(
            outcome(&report, "roof-repair-tampa/page.tsx"),
            &FileOutcome::Error {
                reason: "could not find insertion point".to_string(),
            }
        );
        assert_eq!(
            fs::read_to_string(root.join("roof-repair-tampa/page.tsx")).expect("read page"),
            source
        );
    }

    #[test]
    fn dry_run_still_reports_errors() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("app");
        write_page(&root, "broken", "export default function Page() {}\n");
        write_page(&root, "no-export", "export function Page() {}\n");

        let report = run(&root, RunMode::DryRun);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.stats.no_export, 1);
        assert_eq!(
            outcome(&report, "no-export/page.tsx"),
            &FileOutcome::Skipped {
                exclusion: Exclusion::NoExport,
                reason: "no export found",
            }
        );
    }

    #[test]
    fn diffs_are_collected_on_request() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("app");
        write_page(&root, "historic-church-restoration", &page("Church"));
        let settings = Settings::default();
        let report = annotate(&RunPlan {
            content_dir: &root,
            mode: RunMode::DryRun,
            settings: &settings,
            include_diffs: true,
        })
        .expect("annotate");
        let diff = report.files[0].diff.as_deref().expect("diff");
        assert!(diff.contains("+const internalLinks = ["));
    }

    #[test]
    fn stats_fold_counts_every_outcome() {
        let outcomes = [
            FileOutcome::Updated {
                topic: "disaster".to_string(),
                links: Vec::new(),
            },
            FileOutcome::Error {
                reason: "boom".to_string(),
            },
            FileOutcome::Updated {
                topic: "disaster".to_string(),
                links: Vec::new(),
            },
        ];
        let folded = outcomes
            .iter()
            .fold(RunStats::default(), |stats, outcome| stats.record(outcome));
        assert_eq!(folded.total, 3);
        assert_eq!(folded.updated, 2);
        assert_eq!(folded.by_topic.get("disaster"), Some(&2));
        assert_eq!(folded.errors, 1);
    }
}
