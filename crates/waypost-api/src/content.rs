// crates/waypost-api/src/content.rs
// ============================================================================
// Module: Content Loader
// Description: Markdown content scanning with YAML frontmatter.
// Purpose: Serve articles and projects from a content directory.
// Dependencies: serde, serde_yaml, time
// ============================================================================

//! ## Overview
//! Content lives under `<dir>/articles/<slug>/<slug>.md` and
//! `<dir>/projects/<slug>/<slug>.md` with YAML frontmatter between `---`
//! fences. Loading is pure file read + parse: no caching and no concurrency
//! concerns. Slugs are validated before any path is formed, so a caller can
//! never traverse outside the content directory. Unparsable entries are
//! skipped in listings and reported as not-found on single fetch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory names skipped while scanning content.
const SKIP_DIRS: [&str; 4] = ["all", "categories", ".git", "node_modules"];
/// Upper bound for listing limits after clamping.
const MAX_CONTENT_LIMIT: usize = 50;

// ============================================================================
// SECTION: Models
// ============================================================================

/// A published article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    /// Article title.
    pub title: String,
    /// Directory-derived slug.
    pub slug: String,
    /// Markdown body.
    pub content: String,
    /// Publication timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// Optional category label.
    pub category: Option<String>,
    /// Tag labels.
    pub tags: Vec<String>,
    /// Optional summary line.
    pub summary: Option<String>,
}

/// A published project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Project title.
    pub title: String,
    /// Directory-derived slug.
    pub slug: String,
    /// Markdown body.
    pub content: String,
    /// Optional status label.
    pub status: Option<String>,
    /// Technology labels.
    pub technologies: Vec<String>,
    /// Optional repository URL.
    pub github_url: Option<String>,
    /// Optional live demo URL.
    pub demo_url: Option<String>,
}

/// YAML frontmatter fields shared by articles and projects.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    /// Entry title.
    title: Option<String>,
    /// Publication date, RFC 3339 timestamp or plain `YYYY-MM-DD`.
    date: Option<String>,
    /// Category label.
    category: Option<String>,
    /// Tag labels.
    tags: Vec<String>,
    /// Summary line.
    summary: Option<String>,
    /// Project status label.
    status: Option<String>,
    /// Technology labels.
    technologies: Vec<String>,
    /// Repository URL.
    github_url: Option<String>,
    /// Live demo URL.
    demo_url: Option<String>,
}

/// A parsed markdown document: frontmatter plus body.
struct ParsedEntry {
    /// Parsed frontmatter fields.
    front: FrontMatter,
    /// Markdown body following the frontmatter fence.
    body: String,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Markdown content loader rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct ContentService {
    /// Directory holding `articles/` subdirectories.
    articles_path: PathBuf,
    /// Directory holding `projects/` subdirectories.
    projects_path: PathBuf,
}

impl ContentService {
    /// Creates a loader rooted at `content_dir`.
    ///
    /// A missing directory is not an error; listings are simply empty.
    #[must_use]
    pub fn new(content_dir: &Path) -> Self {
        Self {
            articles_path: content_dir.join("articles"),
            projects_path: content_dir.join("projects"),
        }
    }

    /// Lists articles, optionally filtered by category, newest first.
    ///
    /// The limit clamps to `[1, 50]`. An invalid category yields an empty
    /// list rather than an error.
    #[must_use]
    pub fn articles(&self, category: Option<&str>, limit: usize) -> Vec<Article> {
        let limit = limit.clamp(1, MAX_CONTENT_LIMIT);
        if let Some(category) = category
            && !is_valid_category(category)
        {
            return Vec::new();
        }
        let mut articles: Vec<Article> = scan_entries(&self.articles_path)
            .into_iter()
            .map(|(slug, entry)| build_article(slug, entry))
            .filter(|article| match category {
                Some(category) => article.category.as_deref() == Some(category),
                None => true,
            })
            .collect();
        articles.sort_by(|a, b| b.date.cmp(&a.date));
        articles.truncate(limit);
        articles
    }

    /// Fetches a single article by slug.
    #[must_use]
    pub fn article(&self, slug: &str) -> Option<Article> {
        if !is_valid_slug(slug) {
            return None;
        }
        let entry = read_entry_dir(&self.articles_path.join(slug))?;
        Some(build_article(slug.to_string(), entry))
    }

    /// Lists projects with the limit clamped to `[1, 50]`.
    #[must_use]
    pub fn projects(&self, limit: usize) -> Vec<Project> {
        let limit = limit.clamp(1, MAX_CONTENT_LIMIT);
        let mut projects: Vec<Project> = scan_entries(&self.projects_path)
            .into_iter()
            .map(|(slug, entry)| build_project(slug, entry))
            .collect();
        projects.truncate(limit);
        projects
    }

    /// Fetches a single project by slug.
    #[must_use]
    pub fn project(&self, slug: &str) -> Option<Project> {
        if !is_valid_slug(slug) {
            return None;
        }
        let entry = read_entry_dir(&self.projects_path.join(slug))?;
        Some(build_project(slug.to_string(), entry))
    }
}

// ============================================================================
// SECTION: Scanning & Parsing
// ============================================================================

/// Returns true for slugs restricted to `[A-Za-z0-9_-]`.
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slug.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Returns true for categories restricted to alphanumeric and hyphen.
fn is_valid_category(category: &str) -> bool {
    !category.is_empty() && category.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

/// Scans per-slug subdirectories, parsing each entry and skipping failures.
fn scan_entries(base: &Path) -> Vec<(String, ParsedEntry)> {
    let Ok(dir) = fs::read_dir(base) else {
        return Vec::new();
    };
    let mut entries = Vec::new();
    for item in dir.flatten() {
        let path = item.path();
        if !path.is_dir() {
            continue;
        }
        let Some(slug) = path.file_name().and_then(|name| name.to_str()).map(str::to_string)
        else {
            continue;
        };
        if slug.starts_with('.') || SKIP_DIRS.contains(&slug.as_str()) || !is_valid_slug(&slug) {
            continue;
        }
        if let Some(entry) = read_entry_dir(&path) {
            entries.push((slug, entry));
        }
    }
    entries
}

/// Reads the markdown document for one entry directory.
///
/// Prefers `<slug>.md`; falls back to the lexically first markdown file so
/// repeated scans stay deterministic.
fn read_entry_dir(path: &Path) -> Option<ParsedEntry> {
    let slug = path.file_name()?.to_str()?;
    let preferred = path.join(format!("{slug}.md"));
    let document = if preferred.is_file() {
        preferred
    } else {
        let mut markdown: Vec<PathBuf> = fs::read_dir(path)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|candidate| {
                candidate.is_file()
                    && candidate.extension().and_then(|ext| ext.to_str()) == Some("md")
            })
            .collect();
        markdown.sort();
        markdown.into_iter().next()?
    };
    let contents = fs::read_to_string(document).ok()?;
    parse_front_matter(&contents)
}

/// Splits a document into YAML frontmatter and markdown body.
fn parse_front_matter(contents: &str) -> Option<ParsedEntry> {
    let Some(rest) = contents.strip_prefix("---") else {
        return Some(ParsedEntry {
            front: FrontMatter::default(),
            body: contents.to_string(),
        });
    };
    let (raw_front, body) = rest.split_once("\n---")?;
    let front: FrontMatter = serde_yaml::from_str(raw_front).ok()?;
    let body = body.strip_prefix('\n').unwrap_or(body);
    Some(ParsedEntry {
        front,
        body: body.to_string(),
    })
}

/// Parses a frontmatter date, accepting RFC 3339 or plain `YYYY-MM-DD`.
///
/// Entries without a usable date sort last (unix epoch).
fn parse_entry_date(raw: Option<&str>) -> OffsetDateTime {
    if let Some(raw) = raw {
        if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
            return parsed;
        }
        let format = time::macros::format_description!("[year]-[month]-[day]");
        if let Ok(date) = Date::parse(raw, &format) {
            return date.midnight().assume_utc();
        }
    }
    OffsetDateTime::UNIX_EPOCH
}

/// Builds an article from a parsed entry.
fn build_article(slug: String, entry: ParsedEntry) -> Article {
    let date = parse_entry_date(entry.front.date.as_deref());
    Article {
        title: entry.front.title.unwrap_or_else(|| slug.clone()),
        slug,
        content: entry.body,
        date,
        category: entry.front.category,
        tags: entry.front.tags,
        summary: entry.front.summary,
    }
}

/// Builds a project from a parsed entry.
fn build_project(slug: String, entry: ParsedEntry) -> Project {
    Project {
        title: entry.front.title.unwrap_or_else(|| slug.clone()),
        slug,
        content: entry.body,
        status: entry.front.status,
        technologies: entry.front.technologies,
        github_url: entry.front.github_url,
        demo_url: entry.front.demo_url,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;
    use time::macros::datetime;

    use super::ContentService;
    use super::is_valid_slug;

    fn write_entry(root: &Path, kind: &str, slug: &str, contents: &str) {
        let dir = root.join(kind).join(slug);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{slug}.md")), contents).unwrap();
    }

    #[test]
    fn articles_parse_frontmatter_and_sort_newest_first() {
        let temp = TempDir::new().unwrap();
        write_entry(
            temp.path(),
            "articles",
            "older-post",
            "---\ntitle: Older\ndate: 2024-01-10\ncategory: research\n---\nOlder body.\n",
        );
        write_entry(
            temp.path(),
            "articles",
            "newer-post",
            "---\ntitle: Newer\ndate: 2025-06-01\ntags:\n  - agents\n---\nNewer body.\n",
        );
        let service = ContentService::new(temp.path());
        let articles = service.articles(None, 10);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Newer");
        assert_eq!(articles[0].tags, vec!["agents".to_string()]);
        assert_eq!(articles[0].date, datetime!(2025-06-01 00:00:00 UTC));
        assert_eq!(articles[1].title, "Older");
        assert_eq!(articles[1].category.as_deref(), Some("research"));
        assert!(articles[1].content.contains("Older body."));
    }

    #[test]
    fn category_filter_matches_exactly() {
        let temp = TempDir::new().unwrap();
        write_entry(
            temp.path(),
            "articles",
            "filtered",
            "---\ntitle: Filtered\ncategory: research\n---\nBody.\n",
        );
        let service = ContentService::new(temp.path());
        assert_eq!(service.articles(Some("research"), 10).len(), 1);
        assert!(service.articles(Some("other"), 10).is_empty());
        assert!(service.articles(Some("../escape"), 10).is_empty());
    }

    #[test]
    fn traversal_slugs_are_rejected_before_path_formation() {
        let temp = TempDir::new().unwrap();
        let service = ContentService::new(temp.path());
        assert!(service.article("../../etc/passwd").is_none());
        assert!(service.project("a/b").is_none());
        assert!(!is_valid_slug("."));
        assert!(!is_valid_slug(""));
        assert!(is_valid_slug("welcome-post_1"));
    }

    #[test]
    fn missing_directories_yield_empty_listings() {
        let temp = TempDir::new().unwrap();
        let service = ContentService::new(&temp.path().join("absent"));
        assert!(service.articles(None, 10).is_empty());
        assert!(service.projects(10).is_empty());
    }

    #[test]
    fn documents_without_frontmatter_still_serve_their_body() {
        let temp = TempDir::new().unwrap();
        write_entry(temp.path(), "projects", "bare", "Just a body.\n");
        let service = ContentService::new(temp.path());
        let project = service.project("bare").unwrap();
        assert_eq!(project.title, "bare");
        assert!(project.content.contains("Just a body."));
    }

    #[test]
    fn projects_parse_their_frontmatter_fields() {
        let temp = TempDir::new().unwrap();
        write_entry(
            temp.path(),
            "projects",
            "relay",
            "---\ntitle: Relay\nstatus: active\ntechnologies:\n  - rust\n  - sqlite\ngithub_url: \
             https://example.com/relay\n---\nRelay body.\n",
        );
        let service = ContentService::new(temp.path());
        let project = service.project("relay").unwrap();
        assert_eq!(project.status.as_deref(), Some("active"));
        assert_eq!(project.technologies, vec!["rust".to_string(), "sqlite".to_string()]);
        assert_eq!(project.github_url.as_deref(), Some("https://example.com/relay"));
    }

    #[test]
    fn skip_directories_are_ignored_while_scanning() {
        let temp = TempDir::new().unwrap();
        write_entry(temp.path(), "articles", "real", "---\ntitle: Real\n---\nBody.\n");
        write_entry(temp.path(), "articles", "categories", "---\ntitle: Index\n---\nBody.\n");
        let service = ContentService::new(temp.path());
        let articles = service.articles(None, 10);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Real");
    }
}
