//! String similarity metrics for the correspondence join.
//!
//! All metrics return a score in [0, 1] where 1 means identical. Callers
//! normalise case before comparing.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A pluggable string similarity function.
pub trait StringSimilarity: Send + Sync {
    /// Similarity of `a` and `b` in [0, 1].
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Selectable similarity metric.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SimilarityMetric {
    /// `1 - levenshtein(a, b) / max(|a|, |b|)`.
    #[default]
    Levenshtein,
    /// Jaro-Winkler with prefix scale 0.1 over at most 4 prefix characters.
    JaroWinkler,
    /// Plain Jaro similarity.
    Jaro,
}

impl SimilarityMetric {
    /// The metric implementation.
    pub fn metric(self) -> Box<dyn StringSimilarity> {
        match self {
            SimilarityMetric::Levenshtein => Box::new(NormalizedLevenshtein),
            SimilarityMetric::JaroWinkler => Box::new(JaroWinkler::default()),
            SimilarityMetric::Jaro => Box::new(Jaro),
        }
    }
}

/// Normalised edit distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLevenshtein;

impl StringSimilarity for NormalizedLevenshtein {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let longest = a.len().max(b.len());
        if longest == 0 {
            return 1.0;
        }
        1.0 - levenshtein(&a, &b) as f64 / longest as f64
    }
}

/// Jaro similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jaro;

impl StringSimilarity for Jaro {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        jaro(&a, &b)
    }
}

/// Jaro-Winkler similarity.
#[derive(Debug, Clone, Copy)]
pub struct JaroWinkler {
    /// Weight given to each shared prefix character.
    pub prefix_scale: f64,
    /// Maximum prefix length that earns the bonus.
    pub max_prefix: usize,
    /// The prefix bonus applies from this Jaro score upwards.
    pub boost_threshold: f64,
}

impl Default for JaroWinkler {
    fn default() -> Self {
        Self {
            prefix_scale: 0.1,
            max_prefix: 4,
            boost_threshold: 0.7,
        }
    }
}

impl StringSimilarity for JaroWinkler {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let j = jaro(&a, &b);
        if j < self.boost_threshold {
            return j;
        }
        let prefix = a
            .iter()
            .zip(b.iter())
            .take(self.max_prefix)
            .take_while(|(x, y)| x == y)
            .count();
        j + prefix as f64 * self.prefix_scale * (1.0 - j)
    }
}

/// Two-row dynamic programming edit distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

fn jaro(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let window = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ca) in a.iter().enumerate() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(b.len());
        for j in start..end {
            if !b_matched[j] && b[j] == *ca {
                a_matched[i] = true;
                b_matched[j] = true;
                matches += 1;
                break;
            }
        }
    }

    if matches == 0 {
        return 0.0;
    }

    // Half-transpositions: matched characters that appear in a different order.
    let mut half_transpositions = 0usize;
    let mut k = 0usize;
    for (i, ca) in a.iter().enumerate() {
        if !a_matched[i] {
            continue;
        }
        while !b_matched[k] {
            k += 1;
        }
        if *ca != b[k] {
            half_transpositions += 1;
        }
        k += 1;
    }

    let m = matches as f64;
    let t = half_transpositions as f64 / 2.0;
    (m / a.len() as f64 + m / b.len() as f64 + (m - t) / m) / 3.0
}
