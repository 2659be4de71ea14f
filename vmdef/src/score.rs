/// Similarity between a user query and one candidate, in `0.0..=100.0`.
pub trait Scorer {
    fn score(&self, query: &str, candidate: &str) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&str, &str) -> f64,
{
    fn score(&self, query: &str, candidate: &str) -> f64 {
        self(query, candidate)
    }
}

/// Token-order-insensitive similarity.
///
/// Both strings are lowercased, split on anything that is not alphanumeric,
/// their tokens sorted and re-joined, then compared with an indel ratio
/// (`2 * lcs / (len_a + len_b)`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortRatio;

impl Scorer for TokenSortRatio {
    fn score(&self, query: &str, candidate: &str) -> f64 {
        let query = sorted_tokens(query);
        let candidate = sorted_tokens(candidate);
        if query.is_empty() || candidate.is_empty() {
            return 0.0;
        }
        ratio(&query, &candidate)
    }
}

fn sorted_tokens(s: &str) -> Vec<char> {
    let lowered = s.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ").chars().collect()
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    100.0 * (2 * lcs_len(a, b)) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
