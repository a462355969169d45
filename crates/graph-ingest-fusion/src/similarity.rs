/// Decides whether two canonical-name keys refer to the same entity.
///
/// The spec leaves the fuzzy-dedup threshold and similarity function
/// unspecified (§9 Open Questions); this workspace resolves that by making
/// similarity pluggable with an exact-match default, per the decision
/// recorded in `DESIGN.md`.
pub trait NameSimilarity: Send + Sync {
    fn matches(&self, a: &str, b: &str) -> bool;
}

/// The default: two canonical-name keys must be byte-equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactCanonicalName;

impl NameSimilarity for ExactCanonicalName {
    fn matches(&self, a: &str, b: &str) -> bool {
        a == b
    }
}

/// Fuzzy matching via Jaro-Winkler distance. The documented default threshold
/// is `0.92`, chosen to tolerate small typos/abbreviations while avoiding
/// false merges between distinct short names (e.g. "Ann" vs "Anna").
#[derive(Debug, Clone, Copy)]
pub struct JaroWinklerSimilarity {
    pub threshold: f64,
}

impl Default for JaroWinklerSimilarity {
    fn default() -> Self {
        Self { threshold: 0.92 }
    }
}

impl NameSimilarity for JaroWinklerSimilarity {
    fn matches(&self, a: &str, b: &str) -> bool {
        strsim::jaro_winkler(a, b) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_requires_equality() {
        let sim = ExactCanonicalName;
        assert!(sim.matches("tech corp", "tech corp"));
        assert!(!sim.matches("tech corp", "tech corp inc"));
    }

    #[test]
    fn jaro_winkler_tolerates_small_typos() {
        let sim = JaroWinklerSimilarity::default();
        assert!(sim.matches("jonathan smith", "jonathon smith"));
        assert!(!sim.matches("alice", "bob"));
    }
}
