//! Gestalt pattern-matching similarity (Ratcliff/Obershelp).
//!
//! `ratio = 2·M / T` where `T` is the combined character count and `M` the
//! number of characters in matching blocks, found by taking the longest
//! common substring and recursing on the unmatched text to either side.
//! Comparison is by Unicode scalar value and case-sensitive.

/// Similarity of `a` and `b` in `[0.0, 1.0]`. Two empty strings score 1.0.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = matching_chars(&a, &b);
    2.0 * matches as f64 / total as f64
}

/// The candidate with the highest ratio against `word`, if it reaches `cutoff`.
///
/// The ratio is not symmetric: each candidate is the first sequence and
/// `word` the second. Equal scores go to the greater candidate string.
pub fn closest<'a, I>(word: &str, candidates: I, cutoff: f64) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, f64, &'a str)> = None;
    for (i, candidate) in candidates.into_iter().enumerate() {
        let score = ratio(candidate, word);
        if score < cutoff {
            continue;
        }
        let better = best.map_or(true, |(_, s, text)| {
            score > s || (score == s && candidate > text)
        });
        if better {
            best = Some((i, score, candidate));
        }
    }
    best.map(|(i, score, _)| (i, score))
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            stack.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest common run in `a[alo..ahi]` × `b[blo..bhi]`, earliest in `a` then `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // cur[j - blo + 1]: length of the run ending at a[i], b[j]
    let mut prev = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut cur = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        prev = cur;
    }
    (best_i, best_j, best_k)
}
