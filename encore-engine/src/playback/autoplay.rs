//! Autoplay planner
//!
//! Proposes replacement tracks when a session's queue empties with autoplay
//! enabled. Search intent comes from the most recent history entry:
//! keywords from its title first, detected genres second. Candidates are
//! filtered for music-likeness and de-duplicated against history.
//!
//! The orchestrator bounds every proposal with a timeout, so a slow
//! resolver only delays the session's fall back to idle.

use crate::resolver::TrackResolver;
use crate::track::{normalize_title, Requester, Track};
use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Search terms queried per proposal
const MAX_SEARCH_TERMS: usize = 3;

/// Candidates requested per search term
const RESULTS_PER_TERM: usize = 2;

/// Queries used when there is no usable history
const POPULAR_QUERIES: &[&str] = &[
    "popular music 2024",
    "trending songs",
    "top hits playlist",
    "viral music mix",
    "best songs ever",
];

/// Genre name and the title keywords that signal it
const GENRE_KEYWORDS: &[(&str, &[&str])] = &[
    ("phonk", &["phonk", "drift"]),
    ("lofi", &["lofi", "lo-fi", "chill", "study"]),
    ("trap", &["trap", "bass"]),
    ("house", &["house", "edm", "electronic"]),
    ("pop", &["pop", "mainstream"]),
    ("rock", &["rock", "metal"]),
    ("hip hop", &["hip hop", "rap", "hiphop"]),
    ("jazz", &["jazz", "smooth"]),
    ("classical", &["classical", "orchestra"]),
    ("ambient", &["ambient", "relaxing"]),
];

const MUSIC_MARKERS: &[&str] = &[
    "official music video",
    "official video",
    "lyrics",
    "audio",
    "music video",
    "official audio",
    "full song",
    "original mix",
];

const NON_MUSIC_MARKERS: &[&str] = &[
    "tutorial",
    "how to",
    "review",
    "reaction",
    "gameplay",
    "news",
    "interview",
    "behind the scenes",
    "making of",
];

const MIN_MUSIC_SECS: u64 = 30;
const MAX_MUSIC_SECS: u64 = 600;

static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("bracket pattern is valid"));
static VIDEO_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(hd|official|video|lyrics|mv)\b").expect("video word pattern is valid"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word pattern is valid"));

/// Source of autoplay proposals
///
/// Implemented by [`AutoplayPlanner`]; tests substitute scripted proposals.
#[async_trait]
pub trait AutoplayProvider: Send + Sync {
    /// Up to `count` tracks following `history` (oldest first); never fails,
    /// an empty result means nothing suitable was found
    async fn propose(&self, history: &[Track], count: usize) -> Vec<Track>;
}

#[derive(Debug, Clone)]
struct CachedProposal {
    tracks: Vec<Track>,
    stored_at: Instant,
}

/// Resolver-backed autoplay planner with a per-seed result cache
pub struct AutoplayPlanner {
    resolver: Arc<dyn TrackResolver>,
    cache: DashMap<String, CachedProposal>,
    cache_ttl: Duration,
}

impl AutoplayPlanner {
    pub fn new(resolver: Arc<dyn TrackResolver>, cache_ttl: Duration) -> Self {
        Self {
            resolver,
            cache: DashMap::new(),
            cache_ttl,
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn cached(&self, key: &str) -> Option<Vec<Track>> {
        let entry = self.cache.get(key)?;
        if entry.stored_at.elapsed() < self.cache_ttl {
            return Some(entry.tracks.clone());
        }
        drop(entry);
        self.cache.remove(key);
        None
    }

    async fn related(&self, seed: &Track, history: &[Track], count: usize) -> Vec<Track> {
        let mut seen = SeenTracks::from_history(history);
        let mut picked = Vec::new();

        for term in search_terms(seed.title()).iter().take(MAX_SEARCH_TERMS) {
            if picked.len() >= count {
                break;
            }
            match self.resolver.search(term, RESULTS_PER_TERM).await {
                Ok(candidates) => {
                    debug!("Autoplay term '{}' returned {} candidates", term, candidates.len());
                    picked.extend(
                        candidates
                            .into_iter()
                            .filter(|t| is_likely_music(t) && seen.admit(t)),
                    );
                }
                Err(e) => warn!("Autoplay search failed for '{}': {}", term, e),
            }
        }

        picked.truncate(count);
        picked
    }

    async fn popular(&self, history: &[Track], count: usize) -> Vec<Track> {
        let query = POPULAR_QUERIES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(POPULAR_QUERIES[0]);

        match self.resolver.search(query, count).await {
            Ok(candidates) => {
                let mut seen = SeenTracks::from_history(history);
                candidates
                    .into_iter()
                    .filter(|t| is_likely_music(t) && seen.admit(t))
                    .take(count)
                    .collect()
            }
            Err(e) => {
                warn!("Autoplay popular query '{}' failed: {}", query, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl AutoplayProvider for AutoplayPlanner {
    async fn propose(&self, history: &[Track], count: usize) -> Vec<Track> {
        if count == 0 {
            return Vec::new();
        }

        let Some(seed) = history.last() else {
            debug!("Autoplay has no history, using popular fallback");
            return mark_autoplay(self.popular(history, count).await);
        };

        let key = seed.reference().to_string();
        if let Some(cached) = self.cached(&key) {
            let mut seen = SeenTracks::from_history(history);
            let tracks: Vec<_> = cached.into_iter().filter(|t| seen.admit(t)).take(count).collect();
            if !tracks.is_empty() {
                debug!("Autoplay cache hit for {} ({} tracks)", key, tracks.len());
                return tracks;
            }
        }

        let mut tracks = self.related(seed, history, count).await;
        if tracks.is_empty() {
            info!("No related tracks for '{}', using popular fallback", seed.title());
            tracks = self.popular(history, count).await;
        }

        let tracks = mark_autoplay(tracks);
        if !tracks.is_empty() {
            self.cache.insert(
                key,
                CachedProposal {
                    tracks: tracks.clone(),
                    stored_at: Instant::now(),
                },
            );
        }
        tracks
    }
}

fn mark_autoplay(tracks: Vec<Track>) -> Vec<Track> {
    tracks
        .into_iter()
        .map(|t| t.with_requester(Requester::Autoplay))
        .collect()
}

/// Normalized titles and references already used
struct SeenTracks {
    titles: HashSet<String>,
    references: HashSet<String>,
}

impl SeenTracks {
    fn from_history(history: &[Track]) -> Self {
        Self {
            titles: history.iter().map(Track::normalized_title).collect(),
            references: history.iter().map(|t| t.reference().to_string()).collect(),
        }
    }

    /// Record the track; false when its title or reference was already seen
    fn admit(&mut self, track: &Track) -> bool {
        let title = normalize_title(track.title());
        if self.titles.contains(&title) || self.references.contains(track.reference()) {
            return false;
        }
        self.titles.insert(title);
        self.references.insert(track.reference().to_string());
        true
    }
}

/// Title with bracketed segments and video noise words stripped
pub fn clean_title(title: &str) -> String {
    let stripped = BRACKETED.replace_all(title, "");
    let stripped = VIDEO_WORDS.replace_all(&stripped, "");
    let stripped = NON_WORD.replace_all(&stripped, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Genres whose keywords appear in the title
pub fn detect_genres(title: &str) -> Vec<&'static str> {
    let lower = title.to_lowercase();
    GENRE_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(genre, _)| *genre)
        .collect()
}

/// Search queries derived from a seed title, most specific first
pub fn search_terms(title: &str) -> Vec<String> {
    let clean = clean_title(title);
    let words: Vec<&str> = clean.split(' ').filter(|w| w.chars().count() > 2).collect();

    let mut terms = Vec::new();
    if words.len() >= 2 {
        terms.push(format!("{} {} mix", words[0], words[1]));
        terms.push(format!("{} similar songs", words[0]));
    }
    for genre in detect_genres(title) {
        terms.push(format!("{} music mix", genre));
        terms.push(format!("best {} songs", genre));
    }
    if terms.is_empty() {
        terms.push(format!("{} similar", clean));
        terms.push("popular music mix".to_string());
    }
    terms
}

/// Reject talk/video content and implausible durations
///
/// Unknown durations pass; a music marker in the title overrides the
/// duration check.
pub fn is_likely_music(track: &Track) -> bool {
    let title = track.title().to_lowercase();
    if NON_MUSIC_MARKERS.iter().any(|m| title.contains(m)) {
        return false;
    }
    let has_marker = MUSIC_MARKERS.iter().any(|m| title.contains(m))
        || track
            .source()
            .and_then(|s| s.uploader.as_deref())
            .is_some_and(|u| {
                let uploader = u.to_lowercase();
                MUSIC_MARKERS.iter().any(|m| uploader.contains(m))
            });
    match track.duration_secs() {
        Some(secs) => has_marker || (MIN_MUSIC_SECS..=MAX_MUSIC_SECS).contains(&secs),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverError;
    use std::sync::Mutex;

    fn track(reference: &str, title: &str, duration: u64) -> Track {
        Track::new(reference, title, Requester::user("u1", "User")).with_duration(duration)
    }

    /// Resolver answering every query with tracks named after it
    #[derive(Default)]
    struct EchoResolver {
        queries: Mutex<Vec<String>>,
        fail_terms: Vec<&'static str>,
    }

    #[async_trait]
    impl TrackResolver for EchoResolver {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, ResolverError> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.fail_terms.iter().any(|t| query.contains(t)) {
                return Err(ResolverError::Failed("offline".into()));
            }
            Ok((0..limit)
                .map(|i| track(&format!("{}#{}", query, i), &format!("{} result {}", query, i), 200))
                .collect())
        }

        async fn resolve_direct(&self, reference: &str) -> Result<Track, ResolverError> {
            Err(ResolverError::NotFound(reference.to_string()))
        }
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(
            clean_title("Daft Punk - One More Time (Official Video) [HD]"),
            "Daft Punk One More Time"
        );
        assert_eq!(clean_title("Song LYRICS mv"), "Song");
    }

    #[test]
    fn test_search_terms_from_keywords_and_genres() {
        let terms = search_terms("Night Drive Phonk (Official Audio)");
        assert_eq!(
            terms,
            vec![
                "Night Drive mix",
                "Night similar songs",
                "phonk music mix",
                "best phonk songs",
            ]
        );
    }

    #[test]
    fn test_search_terms_fallback() {
        assert_eq!(search_terms("Yo"), vec!["Yo similar", "popular music mix"]);
    }

    #[test]
    fn test_detect_genres() {
        assert_eq!(detect_genres("Chill Lo-Fi beats to study"), vec!["lofi"]);
        assert_eq!(detect_genres("Hip Hop Rock Anthem"), vec!["rock", "hip hop"]);
        assert!(detect_genres("Moonlight Sonata").is_empty());
    }

    #[test]
    fn test_is_likely_music() {
        assert!(is_likely_music(&track("a", "Great Song", 200)));
        assert!(!is_likely_music(&track("b", "Great Song reaction", 200)));
        assert!(!is_likely_music(&track("c", "Ten Hour Mix", 36_000)));
        assert!(is_likely_music(&track("d", "Ten Hour Mix (Official Audio)", 36_000)));
        assert!(!is_likely_music(&track("e", "Jingle", 10)));
        assert!(is_likely_music(&Track::new("f", "Unknown length", Requester::Autoplay)));
    }

    #[tokio::test]
    async fn test_propose_uses_title_terms_and_dedupes() {
        let resolver = Arc::new(EchoResolver::default());
        let planner = AutoplayPlanner::new(resolver.clone(), Duration::from_secs(3600));
        let history = vec![track("seed", "Midnight City Lights", 240)];

        let proposed = planner.propose(&history, 3).await;
        assert_eq!(proposed.len(), 3);
        assert!(proposed.iter().all(|t| *t.requester() == Requester::Autoplay));

        let refs: HashSet<_> = proposed.iter().map(|t| t.reference()).collect();
        assert_eq!(refs.len(), 3);

        // Two terms are enough for three candidates at two per term
        let queries = resolver.queries.lock().unwrap().clone();
        assert_eq!(queries, vec!["Midnight City mix", "Midnight similar songs"]);
    }

    #[tokio::test]
    async fn test_propose_filters_history_duplicates() {
        let resolver = Arc::new(EchoResolver::default());
        let planner = AutoplayPlanner::new(resolver, Duration::from_secs(3600));
        let history = vec![
            track("x", "Midnight City mix result 0", 200),
            track("seed", "Midnight City Lights", 240),
        ];

        let proposed = planner.propose(&history, 2).await;
        assert!(proposed
            .iter()
            .all(|t| t.normalized_title() != "midnight city mix result 0"));
    }

    #[tokio::test]
    async fn test_propose_caches_per_seed() {
        let resolver = Arc::new(EchoResolver::default());
        let planner = AutoplayPlanner::new(resolver.clone(), Duration::from_secs(3600));
        let history = vec![track("seed", "Midnight City Lights", 240)];

        let first = planner.propose(&history, 2).await;
        let calls = resolver.queries.lock().unwrap().len();
        let second = planner.propose(&history, 2).await;
        assert_eq!(first, second);
        assert_eq!(resolver.queries.lock().unwrap().len(), calls);

        planner.clear_cache();
        planner.propose(&history, 2).await;
        assert!(resolver.queries.lock().unwrap().len() > calls);
    }

    #[tokio::test]
    async fn test_failing_terms_fall_back_to_popular() {
        let resolver = Arc::new(EchoResolver {
            fail_terms: vec!["Midnight"],
            ..Default::default()
        });
        let planner = AutoplayPlanner::new(resolver.clone(), Duration::from_secs(3600));
        let history = vec![track("seed", "Midnight City Lights", 240)];

        let proposed = planner.propose(&history, 2).await;
        assert_eq!(proposed.len(), 2);
        let queries = resolver.queries.lock().unwrap().clone();
        assert!(POPULAR_QUERIES.contains(&queries.last().unwrap().as_str()));
    }

    #[tokio::test]
    async fn test_empty_history_uses_popular() {
        let resolver = Arc::new(EchoResolver::default());
        let planner = AutoplayPlanner::new(resolver.clone(), Duration::from_secs(3600));
        let proposed = planner.propose(&[], 2).await;
        assert_eq!(proposed.len(), 2);
        assert_eq!(resolver.queries.lock().unwrap().len(), 1);
    }
}
