//! Character-level text helpers shared by extraction and reasoning.
//!
//! Lengths and positions are measured in Unicode scalar values, not bytes.

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF | 0xF900..=0xFAFF)
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || is_cjk(c)
}

/// Ratio of distinct characters to total characters.
pub fn distinct_ratio(text: &str) -> f64 {
    let total = char_len(text);
    if total == 0 {
        return 0.0;
    }
    let distinct: std::collections::HashSet<char> = text.chars().collect();
    distinct.len() as f64 / total as f64
}

fn needs_word_boundary(needle: &str) -> bool {
    needle.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '.')
}

/// Char offsets of every occurrence of `needle` in `haystack`. Both are
/// expected in the same case. Pure-ASCII needles only match on word
/// boundaries so that "AI" is not found inside "said".
pub fn find_occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let bounded = needs_word_boundary(needle);
    let mut positions = Vec::new();

    for (byte_idx, _) in haystack.match_indices(needle) {
        if bounded {
            let before = haystack[..byte_idx].chars().next_back();
            let after = haystack[byte_idx + needle.len()..].chars().next();
            let touches_word = |c: Option<char>| c.map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
            if touches_word(before) || touches_word(after) {
                continue;
            }
        }
        positions.push(haystack[..byte_idx].chars().count());
    }

    positions
}

/// True when the byte range `[start, end)` of `text` is not glued to ASCII
/// alphanumerics on either side. Unicode `\b` treats CJK as word characters,
/// so "ROI是" has no boundary after "ROI"; this check does.
pub fn ascii_bounded(text: &str, start: usize, end: usize) -> bool {
    let glued = |c: Option<char>| c.map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
    let first = text[start..end].chars().next();
    let last = text[start..end].chars().next_back();
    let before_ok = !(glued(first) && glued(text[..start].chars().next_back()));
    let after_ok = !(glued(last) && glued(text[end..].chars().next()));
    before_ok && after_ok
}

pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    find_occurrences(haystack, needle).len()
}

/// Case-insensitive containment honouring the same boundary rule.
pub fn contains_term(haystack_lower: &str, term: &str) -> bool {
    !find_occurrences(haystack_lower, &term.to_lowercase()).is_empty()
}

/// Splits text into sentences on CJK and ASCII terminators and line breaks.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let terminal = match c {
            '。' | '！' | '？' | '；' | '!' | '?' | ';' | '\n' => true,
            '.' => chars.peek().map(|n| n.is_whitespace()).unwrap_or(true),
            _ => false,
        };
        if terminal {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// Truncates to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`, in `[0, 1]`.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = char_len(a).max(char_len(b));
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}
