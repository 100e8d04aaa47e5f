//! String matching helpers for candidate scoring.

/// Words that mark a place name as a sub-national administrative division
/// rather than a city.
const ADMINISTRATIVE_WORDS: &[&str] = &[
    "county",
    "province",
    "district",
    "region",
    "prefecture",
    "municipality",
    "department",
    "governorate",
    "oblast",
    "parish",
    "canton",
    "territory",
    "state",
];

/// Lowercase and drop all whitespace: "New  York" → "newyork".
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a place name looks like "Cook County" or "Region of Murcia".
pub fn is_administrative(name: &str) -> bool {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| ADMINISTRATIVE_WORDS.contains(&word))
}

/// Ratcliff/Obershelp similarity: `2·M / T`, where `M` counts characters in
/// recursively found longest common blocks and `T` is the combined length.
///
/// Two empty strings are identical (1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_block(a, b);
    if k == 0 {
        return 0;
    }
    k + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + k..], &b[j + k..])
}

/// Longest common contiguous block as `(start_a, start_b, len)`.
/// Ties go to the block that ends first in `a`, then first in `b`.
fn longest_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        for j in 0..b.len() {
            curr[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            let k = curr[j + 1];
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}
