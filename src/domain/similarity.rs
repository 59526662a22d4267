//! Fuzzy string scores on a 0-100 scale.
//!
//! `ratio` is the indel similarity `2 * LCS / (|a| + |b|)`; `partial_ratio`
//! slides the shorter string over the longer one; `token_sort_ratio`
//! compares the alphabetically sorted word lists.

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
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

fn ratio_chars(a: &[char], b: &[char]) -> u8 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let score = 200.0 * lcs_len(a, b) as f64 / total as f64;
    score.round() as u8
}

pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if shorter.is_empty() {
        return if longer.is_empty() { 100 } else { 0 };
    }

    let mut best = 0;
    for window in longer.windows(shorter.len()) {
        best = best.max(ratio_chars(&shorter, window));
        if best == 100 {
            break;
        }
    }
    best
}

/// Lowercase, turn everything that is not alphanumeric into spaces, trim.
fn full_process(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn sorted_tokens(s: &str) -> String {
    let processed = full_process(s);
    let mut tokens: Vec<&str> = processed.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);
    if a.is_empty() || b.is_empty() {
        return if a == b { 100 } else { 0 };
    }
    ratio(&a, &b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyScores {
    pub ratio: u8,
    pub partial: u8,
    pub token_sort: u8,
}

impl FuzzyScores {
    pub fn compute(a: &str, b: &str) -> Self {
        Self {
            ratio: ratio(a, b),
            partial: partial_ratio(a, b),
            token_sort: token_sort_ratio(a, b),
        }
    }

    pub fn best(&self) -> u8 {
        self.ratio.max(self.partial).max(self.token_sort)
    }
}

impl std::fmt::Display for FuzzyScores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scores: {}, {}, {}", self.ratio, self.partial, self.token_sort)
    }
}
