//! Location resolver: literal lookup, then fuzzy broadening and a deterministic tie-break.
//!
//! City flow:  literal query → (zero hits) broadened terms → similarity floor
//!             → margin cut → disambiguation policy

use super::matching::{is_administrative, normalize, sequence_ratio};
use super::providers::Geocoder;
use super::types::{
    DisambiguationPolicy, LocationCandidate, LocationError, LocationSource, Resolution,
    ResolvedLocation,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shortest accepted city query, in characters.
pub const MIN_QUERY_CHARS: usize = 2;
/// Default result limit for the literal query.
pub const DEFAULT_LIMIT: usize = 7;
/// Result limit for each broadened term.
pub const BROADEN_LIMIT: usize = 10;
/// Best broadened score must reach this to count as a match.
pub const SIMILARITY_FLOOR: f64 = 0.55;
/// Broadened candidates within this distance of the best score survive.
pub const SCORE_MARGIN: f64 = 0.15;
/// US results with a state are more specific and slightly preferred.
pub const US_STATE_BONUS: f64 = 0.02;

/// Outcome of the best-location heuristic, as an index into the input slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestPick {
    Winner(usize),
    Ambiguous,
}

/// A broadened candidate with its similarity score (bonus included).
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: LocationCandidate,
    pub score: f64,
}

/// Resolves free-text city names through a [`Geocoder`].
#[derive(Clone)]
pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
    policy: DisambiguationPolicy,
    limit: usize,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            policy: DisambiguationPolicy::default(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_policy(mut self, policy: DisambiguationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn policy(&self) -> DisambiguationPolicy {
        self.policy
    }

    /// Resolve a city name, optionally narrowed to a country.
    pub fn resolve(&self, city: &str, country: Option<&str>) -> Result<Resolution, LocationError> {
        let city = city.trim();
        if city.chars().count() < MIN_QUERY_CHARS {
            return Err(LocationError::InputTooShort);
        }
        let country = country.map(str::trim).filter(|c| !c.is_empty());

        let literal = self.geocoder.direct(&with_country(city, country), self.limit)?;
        debug!(query = city, hits = literal.len(), "literal geocoder lookup");

        if !literal.is_empty() {
            let scored = literal
                .into_iter()
                .map(|candidate| ScoredCandidate { candidate, score: 1.0 })
                .collect();
            return Ok(self.decide(city, scored, LocationSource::Literal));
        }

        let broadened = self.broaden(city, country);
        if broadened.is_empty() {
            return Err(LocationError::NotFound(city.to_string()));
        }

        let ranked = rank_candidates(city, broadened);
        let top = ranked.first().map(|s| s.score).unwrap_or(0.0);
        debug!(query = city, top_score = top, candidates = ranked.len(), "broadened lookup ranked");
        if top < SIMILARITY_FLOOR {
            return Err(LocationError::NotFound(city.to_string()));
        }

        let shortlist: Vec<ScoredCandidate> = ranked
            .into_iter()
            .filter(|s| top - s.score <= SCORE_MARGIN)
            .take(self.limit)
            .collect();

        Ok(self.decide(city, shortlist, LocationSource::Broadened))
    }

    /// Query every broadened term, skipping failed lookups and duplicates.
    fn broaden(&self, city: &str, country: Option<&str>) -> Vec<LocationCandidate> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for term in broaden_terms(city) {
            match self.geocoder.direct(&with_country(&term, country), BROADEN_LIMIT) {
                Ok(hits) => {
                    for c in hits {
                        if seen.insert(c.dedup_key()) {
                            out.push(c);
                        }
                    }
                }
                Err(e) => warn!(term = %term, error = %e, "broadened lookup skipped"),
            }
        }
        out
    }

    fn decide(&self, query: &str, scored: Vec<ScoredCandidate>, source: LocationSource) -> Resolution {
        let located = |s: &ScoredCandidate| {
            Resolution::Located(ResolvedLocation {
                candidate: s.candidate.clone(),
                source,
                score: (source == LocationSource::Broadened).then_some(s.score),
            })
        };

        if scored.len() == 1 {
            return located(&scored[0]);
        }

        let candidates: Vec<LocationCandidate> = scored.iter().map(|s| s.candidate.clone()).collect();
        let pick = match self.policy {
            DisambiguationPolicy::PresentAll => BestPick::Ambiguous,
            DisambiguationPolicy::BestPick => best_location(query, &candidates),
        };

        match pick {
            BestPick::Winner(i) => located(&scored[i]),
            BestPick::Ambiguous => Resolution::Ambiguous {
                query: query.to_string(),
                candidates,
            },
        }
    }
}

fn with_country(city: &str, country: Option<&str>) -> String {
    match country {
        Some(cc) => format!("{},{}", city, cc),
        None => city.to_string(),
    }
}

/// Alternate query terms for a literal query that found nothing:
/// the longest word (≥3 chars), the first word, and the first three characters.
pub fn broaden_terms(input: &str) -> Vec<String> {
    let input = input.trim();
    let words: Vec<&str> = input.split_whitespace().collect();
    let mut terms: Vec<String> = Vec::new();

    let longest = words.iter().copied().fold(None::<&str>, |best, w| match best {
        Some(b) if b.chars().count() >= w.chars().count() => Some(b),
        _ => Some(w),
    });

    if let Some(longest) = longest {
        if longest.chars().count() >= 3 {
            terms.push(longest.to_string());
        }
    }
    if let Some(first) = words.first() {
        if Some(*first) != longest {
            terms.push(first.to_string());
        }
    }
    if input.chars().count() >= 3 {
        let prefix: String = input.chars().take(3).collect();
        if !terms.contains(&prefix) {
            terms.push(prefix);
        }
    }
    terms
}

/// Score candidates against the original input and sort best first.
pub fn rank_candidates(query: &str, candidates: Vec<LocationCandidate>) -> Vec<ScoredCandidate> {
    let q = normalize(query);
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let mut score = sequence_ratio(&normalize(&candidate.name), &q);
            if candidate.is_us() && candidate.has_state() {
                score += US_STATE_BONUS;
            }
            ScoredCandidate { candidate, score }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

fn distinct_us_states(pool: &[(usize, &LocationCandidate)]) -> usize {
    pool.iter()
        .filter(|(_, c)| c.is_us())
        .filter_map(|(_, c)| c.state.as_deref())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Deterministic tie-break over a candidate set. Never guesses between US
/// places in different states.
pub fn best_location(query: &str, candidates: &[LocationCandidate]) -> BestPick {
    match candidates.len() {
        0 => return BestPick::Ambiguous,
        1 => return BestPick::Winner(0),
        _ => {}
    }

    let q = query.trim().to_lowercase();
    let all: Vec<(usize, &LocationCandidate)> = candidates.iter().enumerate().collect();
    let non_admin: Vec<(usize, &LocationCandidate)> = all
        .iter()
        .copied()
        .filter(|(_, c)| !is_administrative(&c.name))
        .collect();

    // 1. Exact name match
    let exact: Vec<(usize, &LocationCandidate)> = non_admin
        .iter()
        .copied()
        .filter(|(_, c)| c.name.to_lowercase() == q)
        .collect();
    if !exact.is_empty() {
        if distinct_us_states(&exact) > 1 {
            return BestPick::Ambiguous;
        }
        let chosen = exact.iter().find(|(_, c)| c.has_state()).unwrap_or(&exact[0]);
        return BestPick::Winner(chosen.0);
    }

    let pool = if non_admin.is_empty() { &all } else { &non_admin };

    // 2. A lone non-US candidate
    let foreign: Vec<usize> = pool.iter().filter(|(_, c)| !c.is_us()).map(|(i, _)| *i).collect();
    if foreign.len() == 1 {
        return BestPick::Winner(foreign[0]);
    }

    // 3. US candidates, refusing to pick across states
    let us: Vec<(usize, &LocationCandidate)> = pool.iter().copied().filter(|(_, c)| c.is_us()).collect();
    if !us.is_empty() {
        if distinct_us_states(&us) > 1 {
            return BestPick::Ambiguous;
        }
        let chosen = us
            .iter()
            .find(|(_, c)| c.name.to_lowercase().starts_with(&q))
            .or_else(|| us.iter().find(|(_, c)| c.has_state()))
            .unwrap_or(&us[0]);
        return BestPick::Winner(chosen.0);
    }

    // 4. Fallback
    BestPick::Winner(non_admin.first().map(|(i, _)| *i).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGeocoder {
        answers: HashMap<String, Vec<LocationCandidate>>,
        failing: HashSet<String>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl FakeGeocoder {
        fn answer(mut self, query: &str, hits: Vec<LocationCandidate>) -> Self {
            self.answers.insert(query.to_lowercase(), hits);
            self
        }

        fn fail(mut self, query: &str) -> Self {
            self.failing.insert(query.to_lowercase());
            self
        }
    }

    impl Geocoder for FakeGeocoder {
        fn direct(&self, query: &str, limit: usize) -> Result<Vec<LocationCandidate>, LocationError> {
            self.calls.lock().unwrap().push((query.to_string(), limit));
            let key = query.to_lowercase();
            if self.failing.contains(&key) {
                return Err(LocationError::Network("connection refused".into()));
            }
            Ok(self.answers.get(&key).cloned().unwrap_or_default().into_iter().take(limit).collect())
        }
    }

    fn place(name: &str, state: Option<&str>, country: &str) -> LocationCandidate {
        LocationCandidate {
            name: name.into(),
            state: state.map(String::from),
            country: country.into(),
            lat: 10.0,
            lon: 20.0,
        }
    }

    fn resolver(fake: FakeGeocoder) -> (LocationResolver, Arc<FakeGeocoder>) {
        let fake = Arc::new(fake);
        (LocationResolver::new(fake.clone()), fake)
    }

    fn springfields() -> Vec<LocationCandidate> {
        vec![
            place("Springfield", Some("Illinois"), "US"),
            place("Springfield", Some("Missouri"), "US"),
            place("Springfield", Some("Massachusetts"), "US"),
        ]
    }

    fn located_name(r: Resolution) -> String {
        match r {
            Resolution::Located(loc) => loc.candidate.label(),
            Resolution::Ambiguous { candidates, .. } => panic!("ambiguous: {candidates:?}"),
        }
    }

    // ─── resolve ────────────────────────────────────────────────

    #[test]
    fn test_short_input_makes_no_call() {
        let (r, fake) = resolver(FakeGeocoder::default());
        assert!(matches!(r.resolve("a", None), Err(LocationError::InputTooShort)));
        assert!(matches!(r.resolve("  x ", Some("US")), Err(LocationError::InputTooShort)));
        assert!(matches!(r.resolve("", None), Err(LocationError::InputTooShort)));
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_literal_error_returns_without_broadening() {
        let (r, fake) = resolver(FakeGeocoder::default().fail("london"));
        assert!(matches!(r.resolve("London", None), Err(LocationError::Network(_))));
        assert_eq!(fake.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_single_literal_hit_resolves() {
        let (r, _) = resolver(FakeGeocoder::default().answer("oslo", vec![place("Oslo", None, "NO")]));
        let res = r.resolve("Oslo", None).unwrap();
        match res {
            Resolution::Located(loc) => {
                assert_eq!(loc.source, LocationSource::Literal);
                assert_eq!(loc.score, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_literal_query_carries_country_and_limit() {
        let (r, fake) = resolver(
            FakeGeocoder::default().answer("paris,fr", vec![place("Paris", Some("Ile-de-France"), "FR")]),
        );
        r.resolve(" Paris ", Some("FR")).unwrap();
        assert_eq!(fake.calls.lock().unwrap()[0], ("Paris,FR".to_string(), DEFAULT_LIMIT));
    }

    #[test]
    fn test_springfield_asks_user() {
        let (r, _) = resolver(FakeGeocoder::default().answer("springfield", springfields()));
        match r.resolve("Springfield", None).unwrap() {
            Resolution::Ambiguous { query, candidates } => {
                assert_eq!(query, "Springfield");
                assert_eq!(candidates.len(), 3);
            }
            other => panic!("expected disambiguation, got {other:?}"),
        }
    }

    #[test]
    fn test_present_all_surfaces_every_literal_hit() {
        let hits = vec![place("Paris", Some("Ile-de-France"), "FR"), place("Paris", Some("Texas"), "US")];
        let (r, _) = resolver(FakeGeocoder::default().answer("paris", hits.clone()));

        let best = r.clone().resolve("Paris", None).unwrap();
        assert_eq!(located_name(best), "Paris, Ile-de-France, FR");

        let r = r.with_policy(DisambiguationPolicy::PresentAll);
        match r.resolve("Paris", None).unwrap() {
            Resolution::Ambiguous { candidates, .. } => assert_eq!(candidates, hits),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_broadening_queries_derived_terms() {
        let (r, fake) = resolver(FakeGeocoder::default());
        assert!(matches!(r.resolve("Sant Xyzabc", None), Err(LocationError::NotFound(_))));

        let calls = fake.calls.lock().unwrap();
        let queries: Vec<&str> = calls.iter().map(|(q, _)| q.as_str()).collect();
        assert_eq!(queries, vec!["Sant Xyzabc", "Xyzabc", "Sant", "San"]);
        assert!(calls[1..].iter().all(|(_, limit)| *limit == BROADEN_LIMIT));
    }

    #[test]
    fn test_broadening_finds_typo() {
        let fake = FakeGeocoder::default()
            .answer("stokholmm", vec![])
            .answer("sto", vec![place("Stockholm", None, "SE"), place("Stow", Some("Ohio"), "US")]);
        let (r, _) = resolver(fake);

        match r.resolve("Stokholmm", None).unwrap() {
            Resolution::Located(loc) => {
                assert_eq!(loc.candidate.name, "Stockholm");
                assert_eq!(loc.source, LocationSource::Broadened);
                assert!(loc.score.unwrap() > SIMILARITY_FLOOR);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_broadening_skips_failed_terms_and_dedups() {
        let london = place("London", Some("England"), "GB");
        let fake = FakeGeocoder::default()
            .fail("lodnonn")
            .answer("lod", vec![london.clone(), london.clone(), place("Lodi", Some("Lombardy"), "IT")]);
        let (r, fake) = resolver(fake);
        let r = r.with_policy(DisambiguationPolicy::PresentAll);

        // Terms: "Lodnonn" (fails), "Lod". Lodi falls outside the margin.
        let res = r.resolve("Lodnonn Gb", None).unwrap();
        assert_eq!(fake.calls.lock().unwrap().len(), 3);
        assert_eq!(located_name(res), "London, England, GB");
    }

    #[test]
    fn test_below_floor_is_not_found() {
        let fake = FakeGeocoder::default().answer("zzq", vec![place("Aberdeen", None, "GB")]);
        let (r, _) = resolver(fake);
        assert!(matches!(r.resolve("zzqqqq", None), Err(LocationError::NotFound(_))));
    }

    #[test]
    fn test_broadened_us_states_ask_user() {
        let fake = FakeGeocoder::default().answer(
            "spr",
            vec![place("Springfeld", Some("Illinois"), "US"), place("Springfeld", Some("Ohio"), "US")],
        );
        let (r, _) = resolver(fake);
        assert!(matches!(r.resolve("Springfild", None).unwrap(), Resolution::Ambiguous { .. }));
    }

    #[test]
    fn test_margin_drops_weak_candidates() {
        let ranked = rank_candidates(
            "stockholm",
            vec![place("Stockholm", None, "SE"), place("Stockton", Some("California"), "US")],
        );
        assert_eq!(ranked[0].candidate.name, "Stockholm");
        assert!(ranked[0].score - ranked[1].score > SCORE_MARGIN);
    }

    // ─── helpers ────────────────────────────────────────────────

    #[test]
    fn test_broaden_terms() {
        assert_eq!(broaden_terms("New York City"), vec!["York", "New"]);
        assert_eq!(broaden_terms("Rome"), vec!["Rome", "Rom"]);
        assert_eq!(broaden_terms("St Petersburg"), vec!["Petersburg", "St", "St "]);
        assert_eq!(broaden_terms("ab"), Vec::<String>::new());
    }

    #[test]
    fn test_us_state_bonus_breaks_tie() {
        let ranked = rank_candidates(
            "portland",
            vec![place("Portland", None, "AU"), place("Portland", Some("Oregon"), "US")],
        );
        assert_eq!(ranked[0].candidate.country, "US");
        assert!((ranked[0].score - (1.0 + US_STATE_BONUS)).abs() < 1e-9);
    }

    // ─── best_location ──────────────────────────────────────────

    #[test]
    fn test_best_single_candidate() {
        assert_eq!(best_location("x", &[place("Anything", None, "US")]), BestPick::Winner(0));
    }

    #[test]
    fn test_best_exact_match_wins() {
        let c = vec![
            place("Londonderry", Some("New Hampshire"), "US"),
            place("London", Some("England"), "GB"),
            place("London County", None, "GB"),
        ];
        assert_eq!(best_location("london", &c), BestPick::Winner(1));
    }

    #[test]
    fn test_best_exact_match_ignores_administrative_names() {
        let c = vec![place("Cork County", None, "IE"), place("Cork", None, "IE")];
        assert_eq!(best_location("Cork County", &c), BestPick::Winner(1));
    }

    #[test]
    fn test_best_exact_prefers_state() {
        let c = vec![place("Tours", None, "FR"), place("Tours", Some("Centre-Val de Loire"), "FR")];
        assert_eq!(best_location("TOURS", &c), BestPick::Winner(1));
    }

    #[test]
    fn test_best_lone_foreign_candidate() {
        let c = vec![place("Parris", Some("Texas"), "US"), place("Pariss", None, "FR"), place("Parrish", Some("Texas"), "US")];
        assert_eq!(best_location("paris", &c), BestPick::Winner(1));
    }

    #[test]
    fn test_best_us_multi_state_is_ambiguous() {
        let c = vec![place("Springfeld", Some("Illinois"), "US"), place("Springfelt", Some("Ohio"), "US")];
        assert_eq!(best_location("springfield", &c), BestPick::Ambiguous);
    }

    #[test]
    fn test_best_exact_us_multi_state_is_ambiguous() {
        assert_eq!(best_location("Springfield", &springfields()), BestPick::Ambiguous);
    }

    #[test]
    fn test_best_us_single_state_prefers_prefix() {
        let c = vec![
            place("East Aurora", Some("New York"), "US"),
            place("Auroraville", Some("New York"), "US"),
        ];
        assert_eq!(best_location("aurora", &c), BestPick::Winner(1));
    }

    #[test]
    fn test_best_all_administrative_still_refuses_cross_state() {
        let c = vec![place("Cook County", Some("Illinois"), "US"), place("Cook County", Some("Minnesota"), "US")];
        assert_eq!(best_location("cook", &c), BestPick::Ambiguous);
    }

    #[test]
    fn test_best_fallback_first_non_administrative() {
        let c = vec![
            place("Rhone Department", None, "FR"),
            place("Lyonnais", None, "FR"),
            place("Lyons", None, "BE"),
        ];
        assert_eq!(best_location("lyon", &c), BestPick::Winner(1));
    }
}
