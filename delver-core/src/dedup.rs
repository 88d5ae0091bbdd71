//! Deduplicating store for sources and findings.
//!
//! The convergence point of all concurrent branches: search tasks register
//! sources and findings as soon as they are produced, and the store
//! reconciles duplicates across branches. All mutations go through one
//! internal mutex; callers never lock. First-seen order is preserved so the
//! final `ResearchResult` is deterministic given sequential dispatch.

use crate::types::{Finding, ResearchResult, SourceRef};
use std::collections::HashMap;
use std::sync::Mutex;
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Query parameters that commonly distinguish documents on the same path
/// and therefore survive normalization.
const KEPT_QUERY_PARAMS: &[&str] = &["id", "p", "v", "q"];

/// Normalize a URL for identity comparison.
///
/// Keeps scheme, host, and path; strips fragments and all query parameters
/// except a small allowlist of ones that distinguish documents. Unparsable
/// inputs fall back to the trimmed original string so a malformed URL is
/// still deduplicated against itself.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| KEPT_QUERY_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let mut normalized = url.to_string();
    // Trailing slash carries no identity except on the bare origin.
    if normalized.ends_with('/') && url.path() != "/" {
        normalized.pop();
    }
    normalized
}

/// Normalize finding text into its identity key.
///
/// NFKC normalization, casefold, whitespace collapse, and trailing sentence
/// punctuation trim. Exact match on this key is the mandatory dedup
/// criterion; anything fuzzier risks silently dropping distinct facts.
pub fn normalize_finding_text(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_string()
}

#[derive(Default)]
struct StoreInner {
    /// Sources in first-seen order.
    sources: Vec<SourceRef>,
    /// Normalized URL -> index into `sources`.
    source_index: HashMap<String, usize>,
    /// Findings in first-seen order.
    findings: Vec<Finding>,
    /// Normalized text -> index into `findings`.
    finding_index: HashMap<String, usize>,
}

/// Thread-safe registry of seen sources and findings.
///
/// One store is created per research tree invocation and shared by every
/// task in that tree; it is never a process-wide singleton, so multiple
/// trees can run concurrently without cross-contamination.
#[derive(Default)]
pub struct DedupStore {
    inner: Mutex<StoreInner>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Returns `true` if it was new.
    ///
    /// The stored ref keeps the normalized URL; a later duplicate with a
    /// title backfills a missing title on the winner.
    pub fn add_source(&self, source: SourceRef) -> bool {
        let key = normalize_url(&source.url);
        let mut inner = self.inner.lock().expect("dedup store poisoned");

        if let Some(&idx) = inner.source_index.get(&key) {
            if inner.sources[idx].title.is_none() && source.title.is_some() {
                inner.sources[idx].title = source.title;
            }
            return false;
        }

        let idx = inner.sources.len();
        inner.sources.push(SourceRef {
            url: key.clone(),
            title: source.title,
        });
        inner.source_index.insert(key, idx);
        true
    }

    /// Register a finding, merging into an existing duplicate if one exists.
    ///
    /// At-most-one-winner semantics: of two concurrent calls with the same
    /// normalized text, one inserts and the other merges its source set into
    /// the winner. Returns a clone of the winning (merged) finding.
    pub fn add_finding(&self, finding: Finding) -> Finding {
        let key = normalize_finding_text(&finding.text);
        let mut inner = self.inner.lock().expect("dedup store poisoned");

        if let Some(&idx) = inner.finding_index.get(&key) {
            for source in finding.source_refs {
                let url = normalize_url(&source.url);
                if !inner.findings[idx].source_refs.iter().any(|s| s.url == url) {
                    inner.findings[idx].source_refs.push(SourceRef {
                        url,
                        title: source.title,
                    });
                }
            }
            return inner.findings[idx].clone();
        }

        let mut source_refs = Vec::new();
        for source in finding.source_refs {
            let url = normalize_url(&source.url);
            if !source_refs.iter().any(|s: &SourceRef| s.url == url) {
                source_refs.push(SourceRef {
                    url,
                    title: source.title,
                });
            }
        }
        let stored = Finding {
            text: finding.text,
            source_refs,
        };
        let idx = inner.findings.len();
        inner.findings.push(stored.clone());
        inner.finding_index.insert(key, idx);
        stored
    }

    /// Number of distinct sources registered so far.
    pub fn source_count(&self) -> usize {
        self.inner.lock().expect("dedup store poisoned").sources.len()
    }

    /// Number of distinct findings registered so far.
    pub fn finding_count(&self) -> usize {
        self.inner.lock().expect("dedup store poisoned").findings.len()
    }

    /// All findings registered so far, first-seen order.
    pub fn findings(&self) -> Vec<Finding> {
        self.inner
            .lock()
            .expect("dedup store poisoned")
            .findings
            .clone()
    }

    /// Assemble the terminal research result from current contents.
    pub fn snapshot(&self) -> ResearchResult {
        let inner = self.inner.lock().expect("dedup store poisoned");
        ResearchResult {
            learnings: inner.findings.iter().map(|f| f.text.clone()).collect(),
            visited_urls: inner.sources.iter().map(|s| s.url.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_source(url: &str) -> SourceRef {
        SourceRef::new(url, None)
    }

    fn make_finding(text: &str, urls: &[&str]) -> Finding {
        Finding::new(
            text,
            urls.iter().map(|u| SourceRef::new(*u, None)).collect(),
        )
    }

    #[test]
    fn test_normalize_url_strips_fragment_and_query() {
        assert_eq!(
            normalize_url("https://example.com/a/b?utm_source=x#section"),
            "https://example.com/a/b"
        );
    }

    #[test]
    fn test_normalize_url_keeps_distinguishing_params() {
        assert_eq!(
            normalize_url("https://example.com/watch?v=abc123&utm_source=x"),
            "https://example.com/watch?v=abc123"
        );
    }

    #[test]
    fn test_normalize_url_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.com/docs/"),
            "https://example.com/docs"
        );
        // Bare origin keeps its slash; that's how Url prints it.
        assert_eq!(normalize_url("https://example.com"), "https://example.com/");
    }

    #[test]
    fn test_normalize_url_unparsable_falls_back() {
        assert_eq!(normalize_url("  not a url  "), "not a url");
    }

    #[test]
    fn test_normalize_finding_text() {
        assert_eq!(
            normalize_finding_text("  Transformers   changed NLP.  "),
            "transformers changed nlp"
        );
        assert_eq!(
            normalize_finding_text("Transformers changed NLP"),
            "transformers changed nlp"
        );
    }

    #[test]
    fn test_add_source_dedups_by_normalized_url() {
        let store = DedupStore::new();
        assert!(store.add_source(make_source("https://example.com/a?utm=1")));
        assert!(!store.add_source(make_source("https://example.com/a#frag")));
        assert_eq!(store.source_count(), 1);
    }

    #[test]
    fn test_add_source_backfills_title() {
        let store = DedupStore::new();
        store.add_source(make_source("https://example.com/a"));
        store.add_source(SourceRef::new("https://example.com/a", Some("Title".into())));
        let result = store.snapshot();
        assert_eq!(result.visited_urls, vec!["https://example.com/a"]);
    }

    #[test]
    fn test_add_finding_merges_source_sets() {
        let store = DedupStore::new();
        store.add_finding(make_finding(
            "Attention is all you need",
            &["https://a.example/1"],
        ));
        let merged = store.add_finding(make_finding(
            "attention is all you need.",
            &["https://b.example/2"],
        ));
        assert_eq!(store.finding_count(), 1);
        assert_eq!(merged.source_refs.len(), 2);
        // The winner's text (first registration) is kept.
        assert_eq!(merged.text, "Attention is all you need");
    }

    #[test]
    fn test_add_finding_idempotent_same_source() {
        let store = DedupStore::new();
        store.add_finding(make_finding("fact", &["https://a.example/1"]));
        let merged = store.add_finding(make_finding("fact", &["https://a.example/1"]));
        assert_eq!(merged.source_refs.len(), 1);
    }

    #[test]
    fn test_distinct_findings_stay_distinct() {
        let store = DedupStore::new();
        store.add_finding(make_finding("fact one", &[]));
        store.add_finding(make_finding("fact two", &[]));
        assert_eq!(store.finding_count(), 2);
    }

    #[test]
    fn test_snapshot_preserves_first_seen_order() {
        let store = DedupStore::new();
        store.add_source(make_source("https://example.com/first"));
        store.add_source(make_source("https://example.com/second"));
        store.add_source(make_source("https://example.com/first"));
        store.add_finding(make_finding("alpha", &[]));
        store.add_finding(make_finding("beta", &[]));

        let result = store.snapshot();
        assert_eq!(
            result.visited_urls,
            vec!["https://example.com/first", "https://example.com/second"]
        );
        assert_eq!(result.learnings, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_have_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(DedupStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.add_finding(Finding::new(
                    "shared fact",
                    vec![SourceRef::new(format!("https://example.com/{i}"), None)],
                ));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.finding_count(), 1);
        let findings = store.findings();
        assert_eq!(findings[0].source_refs.len(), 16);
    }
}
