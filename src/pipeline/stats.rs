// src/pipeline/stats.rs

//! Leaderboards over a crawled forum graph.
//!
//! Each report filters the graph by category title and ranks authors,
//! topics, and long words. Reports are independent, so [`calculate_all`]
//! runs them side by side on the blocking pool.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::future::try_join_all;
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;

use crate::error::Result;
use crate::graph::GraphStore;
use crate::models::{Author, Config, EntityId, Post, ReportConfig, StatsConfig, Topic};
use crate::utils::log;
use crate::utils::text::word_counts;

/// Category selection for one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl StatsFilter {
    /// Whether a category with this title is part of the report. A non-empty
    /// include list takes precedence over the exclude list.
    pub fn allows(&self, title: &str) -> bool {
        if !self.include.is_empty() {
            return self.include.iter().any(|t| t == title);
        }
        !self.exclude.iter().any(|t| t == title)
    }

    fn describe(&self) -> String {
        if !self.include.is_empty() {
            format!("only {}", self.include.join(", "))
        } else if !self.exclude.is_empty() {
            format!("excluding {}", self.exclude.join(", "))
        } else {
            "all categories".to_string()
        }
    }
}

impl From<&ReportConfig> for StatsFilter {
    fn from(report: &ReportConfig) -> Self {
        Self {
            include: report.include.clone(),
            exclude: report.exclude.clone(),
        }
    }
}

/// One value in a leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Count(usize),
    Ratio(f64),
    Text(String),
    Author { name: String, url: Option<String> },
    Topic { title: String, url: String },
    /// Seconds between two instants
    Span(i64),
}

impl Cell {
    fn author(author: &Author) -> Self {
        Self::Author {
            name: author.name().to_string(),
            url: author.url().map(str::to_string),
        }
    }

    fn topic(topic: &Topic) -> Self {
        Self::Topic {
            title: topic.title().to_string(),
            url: topic.url().to_string(),
        }
    }

    /// HTML fragment for this value. Authors and topics become links.
    fn to_html(&self) -> String {
        match self {
            Self::Author { name, url: Some(url) } => link(url, name),
            Self::Topic { title, url } => link(url, title),
            other => encode_text(&other.to_string()).into_owned(),
        }
    }
}

fn link(href: &str, label: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        encode_double_quoted_attribute(href),
        encode_text(label)
    )
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => f.write_str(&group_thousands(&n.to_string())),
            Self::Ratio(x) => {
                let fixed = format!("{x:.2}");
                match fixed.split_once('.') {
                    Some((whole, frac)) => write!(f, "{}.{frac}", group_thousands(whole)),
                    None => f.write_str(&fixed),
                }
            }
            Self::Text(s) => f.write_str(s),
            Self::Author { name, .. } => f.write_str(name),
            Self::Topic { title, .. } => f.write_str(title),
            Self::Span(secs) => {
                let secs = (*secs).max(0);
                write!(
                    f,
                    "{:02}d {:02}h {:02}m",
                    secs / 86_400,
                    secs % 86_400 / 3_600,
                    secs % 3_600 / 60
                )
            }
        }
    }
}

/// Insert `,` every three digits of an integer string.
fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("{sign}{out}")
}

/// A ranked table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Rows shown when rendered
    pub print_len: usize,
}

/// Totals and averages for the filtered graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_topics: usize,
    pub total_posts: usize,
    pub total_words: usize,
    pub avg_posts_per_topic: f64,
    pub avg_words_per_topic: f64,
    pub avg_words_per_post: f64,
}

impl Summary {
    fn rows(&self) -> Vec<(&'static str, Cell)> {
        vec![
            ("Total Topics", Cell::Count(self.total_topics)),
            ("Total Posts", Cell::Count(self.total_posts)),
            ("Total Words", Cell::Count(self.total_words)),
            ("Avg Posts per Topic", Cell::Ratio(self.avg_posts_per_topic)),
            ("Avg Words per Topic", Cell::Ratio(self.avg_words_per_topic)),
            ("Avg Words per Post", Cell::Ratio(self.avg_words_per_post)),
        ]
    }
}

/// Everything computed for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStats {
    pub title: String,
    pub summary: Summary,
    pub leaderboards: Vec<Leaderboard>,
}

impl ReportStats {
    pub fn leaderboard(&self, title: &str) -> Option<&Leaderboard> {
        self.leaderboards.iter().find(|l| l.title == title)
    }
}

/// Word figures of one post.
struct PostFigures<'a> {
    words: Cow<'a, BTreeMap<String, usize>>,
    word_count: usize,
    letters: usize,
}

impl<'a> PostFigures<'a> {
    fn of(post: &'a Post) -> Self {
        let words = match post.words() {
            Some(words) => Cow::Borrowed(words),
            None => Cow::Owned(word_counts(post.content())),
        };
        let word_count = post.word_count().unwrap_or_else(|| words.values().sum());
        let letters = words.iter().map(|(w, n)| w.chars().count() * n).sum();
        Self {
            words,
            word_count,
            letters,
        }
    }
}

/// Per-author or per-topic accumulator.
#[derive(Default)]
struct Tally<'a> {
    posts: usize,
    words: usize,
    letters: usize,
    /// Topics for authors, authors for topics
    related: HashSet<&'a EntityId>,
    first: Option<chrono::NaiveDateTime>,
    last: Option<chrono::NaiveDateTime>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, post: &Post, figures: &PostFigures, related: Option<&'a EntityId>) {
        self.posts += 1;
        self.words += figures.word_count;
        self.letters += figures.letters;
        if let Some(id) = related {
            self.related.insert(id);
        }
        let at = post.posted_at();
        self.first = Some(self.first.map_or(at, |t| t.min(at)));
        self.last = Some(self.last.map_or(at, |t| t.max(at)));
    }

    fn avg_word_length(&self) -> f64 {
        ratio(self.letters, self.words)
    }

    fn words_per_post(&self) -> f64 {
        ratio(self.words, self.posts)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// A row before ranking.
struct Entry {
    label: String,
    key: f64,
    row: Vec<Cell>,
}

fn leaderboard(title: impl Into<String>, headers: &[&str], print_len: usize, mut entries: Vec<Entry>) -> Leaderboard {
    entries.sort_by(|a, b| b.key.total_cmp(&a.key).then_with(|| a.label.cmp(&b.label)));
    Leaderboard {
        title: title.into(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: entries.into_iter().map(|e| e.row).collect(),
        print_len,
    }
}

/// Populate word counts on every post. Idempotent.
pub fn pre_compute(store: &mut GraphStore) {
    let pending = store.posts().filter(|p| !p.is_pre_computed()).count();
    store.pre_compute_words();
    ::log::info!("Pre-computed word counts for {pending} posts");
}

/// Compute the summary and leaderboards for one report.
///
/// Posts that were never pre-computed are tokenized on the fly.
pub fn calculate_stats(store: &GraphStore, report: &ReportConfig, settings: &StatsConfig) -> ReportStats {
    let filter = StatsFilter::from(report);
    ::log::info!("Calculating '{}' ({})", report.title, filter.describe());

    let topics: Vec<&Topic> = store
        .categories()
        .filter(|c| filter.allows(c.title()))
        .flat_map(|c| c.topics())
        .filter_map(|id| store.topic(id))
        .collect();
    let topic_ids: HashSet<&EntityId> = topics.iter().map(|t| t.id()).collect();
    let posts: Vec<&Post> = topics
        .iter()
        .flat_map(|t| t.posts())
        .filter_map(|id| store.post(id))
        .collect();
    let figures: HashMap<&EntityId, PostFigures> =
        posts.iter().map(|p| (p.id(), PostFigures::of(p))).collect();

    let mut by_author: HashMap<&EntityId, Tally> = HashMap::new();
    let mut by_topic: HashMap<&EntityId, Tally> = HashMap::new();
    for post in &posts {
        let post_figures = &figures[post.id()];
        if let Some(author_id) = post.author() {
            by_author
                .entry(author_id)
                .or_default()
                .add(post, post_figures, post.topic());
        }
        if let Some(topic_id) = post.topic() {
            by_topic
                .entry(topic_id)
                .or_default()
                .add(post, post_figures, post.author());
        }
    }

    let total_words: usize = figures.values().map(|f| f.word_count).sum();
    let summary = Summary {
        total_topics: topics.len(),
        total_posts: posts.len(),
        total_words,
        avg_posts_per_topic: ratio(posts.len(), topics.len()),
        avg_words_per_topic: ratio(total_words, topics.len()),
        avg_words_per_post: ratio(total_words, posts.len()),
    };

    let authors: Vec<(&Author, &Tally)> = by_author
        .iter()
        .filter_map(|(id, tally)| store.author(id).map(|a| (a, tally)))
        .collect();
    let topic_tallies: Vec<(&Topic, &Tally)> = by_topic
        .iter()
        .filter_map(|(id, tally)| store.topic(id).map(|t| (t, tally)))
        .collect();

    let min = settings.min_posts;
    let author_board = |title: String, header: &str, value: &dyn Fn(&Author, &Tally) -> Option<Cell>| {
        let entries = authors
            .iter()
            .filter_map(|&(author, tally)| {
                let cell = value(author, tally)?;
                Some(Entry {
                    label: author.name().to_string(),
                    key: sort_key(&cell),
                    row: vec![Cell::author(author), cell],
                })
            })
            .collect();
        leaderboard(title, &["Author", header], settings.author_rows, entries)
    };
    let topic_board = |title: String, header: &str, value: &dyn Fn(&Tally) -> Option<Cell>| {
        let entries = topic_tallies
            .iter()
            .filter_map(|&(topic, tally)| {
                let cell = value(tally)?;
                Some(Entry {
                    label: topic.title().to_string(),
                    key: sort_key(&cell),
                    row: vec![Cell::topic(topic), cell],
                })
            })
            .collect();
        leaderboard(title, &["Topic", header], settings.topic_rows, entries)
    };

    let mut leaderboards = vec![
        author_board("Most Topics by Author".into(), "Count", &|author, _| {
            let opened = author.new_threads().iter().filter(|t| topic_ids.contains(t)).count();
            Some(Cell::Count(opened))
        }),
        author_board("Most Posts by Author".into(), "Count", &|_, t| Some(Cell::Count(t.posts))),
        author_board("Most Words by Author".into(), "Count", &|_, t| Some(Cell::Count(t.words))),
        author_board(
            format!("Longest Avg Word by Author (More Than {min} Posts)"),
            "Word Length",
            &|_, t| (t.posts > min).then(|| Cell::Ratio(t.avg_word_length())),
        ),
        author_board(
            format!("Highest Avg Words per Post by Author (More Than {min} Posts)"),
            "Word Count",
            &|_, t| (t.posts > min).then(|| Cell::Ratio(t.words_per_post())),
        ),
        author_board("Most Average Posts per Topic by Author".into(), "Avg Posts", &|_, t| {
            Some(Cell::Ratio(ratio(t.posts, t.related.len())))
        }),
        topic_board("Most Words by Topic".into(), "Word Count", &|t| Some(Cell::Count(t.words))),
        topic_board("Most Posts by Topic".into(), "Post Count", &|t| Some(Cell::Count(t.posts))),
        topic_board("Most Posters by Topic".into(), "Author Count", &|t| {
            Some(Cell::Count(t.related.len()))
        }),
        topic_board(
            format!("Longest Avg Word by Topic (More Than {min} Posts)"),
            "Word Length",
            &|t| (t.posts > min).then(|| Cell::Ratio(t.avg_word_length())),
        ),
        topic_board(
            format!("Highest Avg Words per Post by Topic (More Than {min} Posts)"),
            "Words Per Post",
            &|t| (t.posts > min).then(|| Cell::Ratio(t.words_per_post())),
        ),
        topic_board("Longest Time Active by Topic".into(), "Time Span", &|t| match (t.first, t.last) {
            (Some(first), Some(last)) => Some(Cell::Span((last - first).num_seconds())),
            _ => None,
        }),
    ];
    leaderboards.push(longest_words(store, &posts, &figures, settings));

    ReportStats {
        title: report.title.clone(),
        summary,
        leaderboards,
    }
}

fn sort_key(cell: &Cell) -> f64 {
    match cell {
        Cell::Count(n) => *n as f64,
        Cell::Ratio(x) => *x,
        Cell::Span(secs) => *secs as f64,
        _ => 0.0,
    }
}

/// Words longer than the configured length, with who used them and where.
fn longest_words(
    store: &GraphStore,
    posts: &[&Post],
    figures: &HashMap<&EntityId, PostFigures>,
    settings: &StatsConfig,
) -> Leaderboard {
    let mut usage: BTreeMap<&str, Vec<&Post>> = BTreeMap::new();
    for post in posts {
        for word in figures[post.id()].words.keys() {
            if word.chars().count() > settings.long_word_length {
                usage.entry(word.as_str()).or_default().push(post);
            }
        }
    }

    let entries = usage
        .into_iter()
        .map(|(word, posts)| {
            let authors: BTreeSet<&str> = posts
                .iter()
                .filter_map(|p| p.author().and_then(|id| store.author(id)))
                .map(|a| a.name())
                .collect();
            let topics: BTreeSet<&str> = posts
                .iter()
                .filter_map(|p| p.topic().and_then(|id| store.topic(id)))
                .map(|t| t.title())
                .collect();
            let length = word.chars().count();
            Entry {
                label: word.to_string(),
                key: length as f64,
                row: vec![
                    Cell::Text(authors.into_iter().collect::<Vec<_>>().join(", ")),
                    Cell::Text(topics.into_iter().collect::<Vec<_>>().join(", ")),
                    Cell::Text(word.to_string()),
                    Cell::Count(length),
                ],
            }
        })
        .collect();

    leaderboard(
        "Longest Words",
        &["Authors", "Topics", "Words", "Length"],
        settings.topic_rows,
        entries,
    )
}

/// Compute every configured report, each on its own blocking task.
pub async fn calculate_all(store: Arc<GraphStore>, settings: &StatsConfig) -> Result<Vec<ReportStats>> {
    let tasks = settings.reports.iter().cloned().map(|report| {
        let store = Arc::clone(&store);
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || calculate_stats(&store, &report, &settings))
    });
    Ok(try_join_all(tasks).await?)
}

/// Render reports as plain-text tables.
pub fn render_text(reports: &[ReportStats]) -> String {
    let mut out = String::new();
    for report in reports {
        let rule = "=".repeat(40);
        out.push_str(&format!("\n{rule}\n {} \n{rule}\n\n", report.title));

        let summary: Vec<Vec<String>> = report
            .summary
            .rows()
            .into_iter()
            .map(|(metric, value)| vec![metric.to_string(), value.to_string()])
            .collect();
        out.push_str(&table(&["Metric".to_string(), "Count".to_string()], &summary));
        out.push_str("\nLeaderboard Details:\n\n");

        for board in &report.leaderboards {
            out.push_str(&board.title);
            out.push('\n');
            let mut headers = vec!["#".to_string()];
            headers.extend(board.headers.iter().cloned());
            let rows: Vec<Vec<String>> = board
                .rows
                .iter()
                .take(board.print_len)
                .enumerate()
                .map(|(i, row)| {
                    let mut cells = vec![(i + 1).to_string()];
                    cells.extend(row.iter().map(Cell::to_string));
                    cells
                })
                .collect();
            out.push_str(&table(&headers, &rows));
            out.push('\n');
        }
    }
    out
}

fn table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = |fill: char| {
        let segments: Vec<String> = widths.iter().map(|w| fill.to_string().repeat(w + 2)).collect();
        format!("+{}+\n", segments.join("+"))
    };
    let line = |cells: &[String]| {
        let padded: Vec<String> = widths
            .iter()
            .zip(cells)
            .map(|(w, c)| format!(" {c}{} ", " ".repeat(w - c.chars().count())))
            .collect();
        format!("|{}|\n", padded.join("|"))
    };

    let mut out = border('-');
    out.push_str(&line(headers));
    out.push_str(&border('='));
    for row in rows {
        out.push_str(&line(row));
        out.push_str(&border('-'));
    }
    out
}

/// Render every report as its own HTML page, plus an `index.html` linking
/// them. Returns `(file name, document)` pairs.
pub fn render_html(reports: &[ReportStats]) -> Vec<(String, String)> {
    let mut used = HashSet::new();
    let mut pages = Vec::with_capacity(reports.len() + 1);
    let mut index = String::from("<h1>Forum Leaderboards</h1>\n<ul>\n");

    for report in reports {
        let stem = page_stem(&report.title);
        let mut name = format!("{stem}.html");
        let mut n = 1;
        while name == "index.html" || used.contains(&name) {
            n += 1;
            name = format!("{stem}_{n}.html");
        }
        used.insert(name.clone());

        index.push_str(&format!("<li>{}</li>\n", link(&name, &report.title)));
        pages.push((name, report_page(report)));
    }
    index.push_str("</ul>\n");

    pages.push(("index.html".to_string(), html_document("Forum Leaderboards", &index)));
    pages
}

/// Lowercase alphanumeric words of a title joined by `_`.
fn page_stem(title: &str) -> String {
    let words: Vec<String> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        "report".to_string()
    } else {
        words.join("_")
    }
}

fn report_page(report: &ReportStats) -> String {
    let mut body = format!("<h1>{}</h1>\n", encode_text(&report.title));
    body.push_str("<table>\n<tr><th>Metric</th><th>Count</th></tr>\n");
    for (metric, value) in report.summary.rows() {
        body.push_str(&format!("<tr><td>{metric}</td><td>{}</td></tr>\n", value.to_html()));
    }
    body.push_str("</table>\n");

    for board in &report.leaderboards {
        body.push_str(&format!("<h2>{}</h2>\n<table>\n<tr><th>#</th>", encode_text(&board.title)));
        for header in &board.headers {
            body.push_str(&format!("<th>{}</th>", encode_text(header)));
        }
        body.push_str("</tr>\n");
        for (i, row) in board.rows.iter().take(board.print_len).enumerate() {
            body.push_str(&format!("<tr><td>{}</td>", i + 1));
            for cell in row {
                body.push_str(&format!("<td>{}</td>", cell.to_html()));
            }
            body.push_str("</tr>\n");
        }
        body.push_str("</table>\n");
    }
    html_document(&report.title, &body)
}

fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
        encode_text(title)
    )
}

/// Pre-compute words, run every report, and write the text rendering to
/// `paths.report_file` and the HTML pages under `paths.html_dir`.
pub async fn run_stats(config: &Config, mut store: GraphStore) -> Result<Vec<ReportStats>> {
    log::header("Calculating statistics");
    pre_compute(&mut store);

    let reports = calculate_all(Arc::new(store), &config.stats).await?;
    write_report(&config.paths.report_file, &render_text(&reports)).await?;

    let html_dir = Path::new(&config.paths.html_dir);
    for (name, document) in render_html(&reports) {
        write_report(html_dir.join(name), &document).await?;
    }

    log::summary(
        "Statistics complete",
        &[
            ("Reports", reports.len().to_string()),
            ("Written to", config.paths.report_file.clone()),
            ("HTML pages", config.paths.html_dir.clone()),
        ],
    );
    Ok(reports)
}

async fn write_report(path: impl AsRef<Path>, text: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::graph::store::tests::sample_store;

    fn report(include: &[&str], exclude: &[&str]) -> ReportConfig {
        ReportConfig {
            title: "Test".to_string(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn settings() -> StatsConfig {
        StatsConfig {
            min_posts: 2,
            long_word_length: 6,
            ..StatsConfig::default()
        }
    }

    /// First two columns of every row, rendered.
    fn ranking(stats: &ReportStats, title: &str) -> Vec<(String, String)> {
        stats
            .leaderboard(title)
            .unwrap()
            .rows
            .iter()
            .map(|row| (row[0].to_string(), row[1].to_string()))
            .collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_include_wins() {
        let filter = StatsFilter {
            include: vec!["General".to_string()],
            exclude: vec!["General".to_string()],
        };
        assert!(filter.allows("General"));
        assert!(!filter.allows("Fun & Games"));

        let filter = StatsFilter::from(&report(&[], &["Fun & Games"]));
        assert!(filter.allows("General"));
        assert!(!filter.allows("Fun & Games"));
        assert!(StatsFilter::default().allows("anything"));
    }

    #[test]
    fn test_summary() {
        let stats = calculate_stats(&sample_store(), &report(&[], &[]), &settings());
        assert_eq!(stats.summary.total_topics, 2);
        assert_eq!(stats.summary.total_posts, 5);
        assert_eq!(stats.summary.total_words, 11);
        assert_eq!(stats.summary.avg_posts_per_topic, 2.5);
        assert_eq!(stats.summary.avg_words_per_topic, 5.5);
        assert!((stats.summary.avg_words_per_post - 2.2).abs() < 1e-9);
        assert_eq!(stats.leaderboards.len(), 13);
    }

    #[test]
    fn test_author_leaderboards() {
        let stats = calculate_stats(&sample_store(), &report(&[], &[]), &settings());

        assert_eq!(
            ranking(&stats, "Most Posts by Author"),
            pairs(&[("alice", "3"), ("bob", "1"), ("deleted", "1")])
        );
        assert_eq!(
            ranking(&stats, "Most Topics by Author"),
            pairs(&[("alice", "2"), ("bob", "0"), ("deleted", "0")])
        );
        assert_eq!(
            ranking(&stats, "Most Words by Author"),
            pairs(&[("alice", "6"), ("bob", "3"), ("deleted", "2")])
        );
        assert_eq!(
            ranking(&stats, "Longest Avg Word by Author (More Than 2 Posts)"),
            pairs(&[("alice", "4.67")])
        );
        assert_eq!(
            ranking(&stats, "Most Average Posts per Topic by Author"),
            pairs(&[("alice", "1.50"), ("bob", "1.00"), ("deleted", "1.00")])
        );
    }

    #[test]
    fn test_topic_leaderboards() {
        let stats = calculate_stats(&sample_store(), &report(&[], &[]), &settings());

        assert_eq!(
            ranking(&stats, "Most Words by Topic"),
            pairs(&[("T1", "7"), ("T2", "4")])
        );
        assert_eq!(
            ranking(&stats, "Most Posters by Topic"),
            pairs(&[("T1", "2"), ("T2", "2")])
        );
        assert_eq!(
            ranking(&stats, "Longest Time Active by Topic"),
            pairs(&[("T1", "01d 02h 00m"), ("T2", "00d 03h 00m")])
        );
        assert_eq!(
            ranking(&stats, "Highest Avg Words per Post by Topic (More Than 2 Posts)"),
            pairs(&[("T1", "2.33")])
        );
    }

    #[test]
    fn test_longest_words() {
        let stats = calculate_stats(&sample_store(), &report(&[], &[]), &settings());
        let board = stats.leaderboard("Longest Words").unwrap();
        assert_eq!(
            board.rows,
            vec![vec![
                Cell::Text("alice".to_string()),
                Cell::Text("T1, T2".to_string()),
                Cell::Text("opening".to_string()),
                Cell::Count(7),
            ]]
        );
    }

    #[test]
    fn test_excluded_category_yields_empty_report() {
        let stats = calculate_stats(&sample_store(), &report(&[], &["General"]), &settings());
        assert_eq!(stats.summary, Summary::default());
        assert!(stats.leaderboards.iter().all(|l| l.rows.is_empty()));
    }

    #[test]
    fn test_pre_compute_matches_on_the_fly() {
        let mut store = sample_store();
        let before = calculate_stats(&store, &report(&[], &[]), &settings());
        pre_compute(&mut store);
        assert!(store.posts().all(|p| p.is_pre_computed()));
        let after = calculate_stats(&store, &report(&[], &[]), &settings());
        assert_eq!(before, after);
    }

    #[test]
    fn test_cell_formatting() {
        assert_eq!(Cell::Count(1_234_567).to_string(), "1,234,567");
        assert_eq!(Cell::Count(12).to_string(), "12");
        assert_eq!(Cell::Ratio(1234.5).to_string(), "1,234.50");
        assert_eq!(Cell::Span(90_061).to_string(), "01d 01h 01m");
        assert_eq!(
            serde_json::to_value(Cell::Count(3)).unwrap(),
            serde_json::json!({"kind": "count", "value": 3})
        );
    }

    #[test]
    fn test_render_caps_rows() {
        let mut settings = settings();
        settings.author_rows = 1;
        let stats = calculate_stats(&sample_store(), &report(&[], &[]), &settings);
        let text = render_text(&[stats]);

        assert!(text.contains(" Test "));
        assert!(text.contains("| Total Posts "));
        assert!(text.contains("Most Posts by Author\n"));
        let section = text
            .split("Most Posts by Author\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap();
        assert!(section.contains("alice"));
        assert!(!section.contains("bob"));
    }

    #[test]
    fn test_html_links_authors_and_topics() {
        let mut report = report(&[], &[]);
        report.title = "Fun & Games".to_string();
        let stats = calculate_stats(&sample_store(), &report, &settings());
        let pages = render_html(&[stats]);

        assert_eq!(pages.len(), 2);
        let (name, page) = &pages[0];
        assert_eq!(name, "fun_games.html");
        assert!(page.contains("<title>Fun &amp; Games</title>"));
        assert!(page.contains(r#"<a href="https://forum.test/u/alice/">alice</a>"#));
        assert!(page.contains(r#"<a href="https://forum.test/t1/">T1</a>"#));
        // bob has no profile link
        assert!(page.contains("<td>bob</td>"));

        let (index_name, index) = &pages[1];
        assert_eq!(index_name, "index.html");
        assert!(index.contains(r#"<a href="fun_games.html">Fun &amp; Games</a>"#));
    }

    #[test]
    fn test_html_page_names_are_unique() {
        let store = sample_store();
        let stats = [
            calculate_stats(&store, &report(&[], &[]), &settings()),
            calculate_stats(&store, &report(&[], &[]), &settings()),
            calculate_stats(&store, &ReportConfig { title: "Index".to_string(), ..report(&[], &[]) }, &settings()),
        ];
        let names: Vec<String> = render_html(&stats).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["test.html", "test_2.html", "index_2.html", "index.html"]);
    }

    #[tokio::test]
    async fn test_calculate_all_runs_every_report() {
        let settings = StatsConfig {
            reports: vec![report(&[], &[]), report(&["General"], &[]), report(&[], &["General"])],
            ..settings()
        };
        let reports = calculate_all(Arc::new(sample_store()), &settings).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].summary, reports[1].summary);
        assert_eq!(reports[2].summary.total_posts, 0);
    }

    #[tokio::test]
    async fn test_run_stats_writes_report() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.report_file = tmp.path().join("out/summary.txt").to_string_lossy().into_owned();
        config.paths.html_dir = tmp.path().join("html").to_string_lossy().into_owned();

        let reports = run_stats(&config, sample_store()).await.unwrap();
        assert_eq!(reports.len(), 3);

        let text = std::fs::read_to_string(&config.paths.report_file).unwrap();
        assert!(text.contains("Forum Leaderboard Including 'Fun & Games'"));
        assert!(text.contains("Longest Words"));

        let index = std::fs::read_to_string(tmp.path().join("html/index.html")).unwrap();
        assert!(index.contains("forum_leaderboard_excluding_fun_games.html"));
        let page = tmp.path().join("html/forum_leaderboard_excluding_fun_games.html");
        assert!(std::fs::read_to_string(page).unwrap().contains("<h2>Longest Words</h2>"));
    }
}
