//! Language tables used by the heuristic extraction stages.
//!
//! Kept as plain data so they can be versioned and unit-tested on their own.

pub const LEXICON_VERSION: &str = "2024.2";

/// Short names that survive the length and single-character filters.
pub const SHORT_WHITELIST: &[&str] = &[
    "AI", "UI", "UX", "AR", "VR", "5G", "IoT", "ROI", "CTR", "SEO", "SEM", "KPI", "API", "SQL",
    "云", "网",
];

/// Universal terms injected by gap-filling when present verbatim.
pub const UNIVERSAL_TERMS: &[&str] = &["optimization", "analysis", "system", "management"];

/// CJK terms that mark a mined span as important regardless of frequency.
pub const IMPORTANT_TERMS: &[&str] = &[
    "系统", "管理", "分析", "优化", "模型", "平台", "技术", "策略", "架构", "算法", "数据",
];

pub const IMPORTANT_SUFFIXES: &[&str] = &[
    "系统", "管理", "分析", "优化", "模型", "平台", "技术", "策略", "架构", "算法",
];

/// Function words and relation verbs that split CJK runs during span mining.
/// Longer entries must come first.
pub const SPAN_DELIMITERS: &[&str] = &[
    "通过", "进行", "提升", "提高", "导致", "影响", "包括", "包含", "需要", "用于", "基于", "使用",
    "利用", "实现", "支持", "促进", "降低", "增加", "以及", "或者", "并且", "而且", "因为", "所以",
    "的", "是", "在", "和", "与", "及", "了", "对", "将", "把", "被", "从", "为", "以", "等", "也",
    "都", "而", "并", "或", "让", "使", "于", "中", "上", "下",
];

pub const STOPWORDS_EN: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "have", "has",
    "had", "not", "but", "can", "will", "into", "its", "our", "their", "they", "them", "than",
    "then", "also", "such", "more", "most", "very", "which", "what", "when", "where", "who",
    "how", "all", "any", "each", "other", "some", "these", "those", "been", "being", "about",
    "over", "under", "between", "through", "using", "used", "use", "via", "per", "may", "might",
    "should", "would", "could", "does", "did", "is", "it", "of", "to", "in", "on", "as", "at",
    "by", "or", "be", "we", "you", "one", "two", "new", "many", "much", "only", "just",
];

pub const STOPWORDS_CJK: &[&str] = &[
    "我们", "你们", "他们", "这个", "那个", "这些", "那些", "一个", "一些", "可以", "能够", "已经",
    "因为", "所以", "但是", "而且", "如果", "以及", "或者", "进行", "通过", "就是", "还是", "没有",
    "不是", "什么", "怎么", "非常", "比较", "其中", "之间", "以上", "以下", "方面", "问题", "情况",
    "时候", "目前", "现在", "核心", "重要", "主要",
];

/// Characters a meaningful CJK name does not start with.
pub const FUNCTION_PREFIXES: &[char] = &[
    '的', '了', '和', '与', '及', '或', '把', '被', '对', '将', '从', '而', '并', '也', '都', '就',
];

/// Characters a meaningful CJK name does not end with.
pub const FUNCTION_SUFFIXES: &[char] = &[
    '的', '了', '着', '过', '和', '与', '及', '或', '把', '被', '吗', '呢', '吧', '啊', '是', '在',
];

/// Filler particles that never occur inside a meaningful CJK name.
pub const FILLER_PARTICLES: &[char] = &['的', '了', '着', '吗', '呢', '吧', '啊'];

/// Context keywords by relation type, checked in order.
pub const RELATION_KEYWORDS: &[(&str, &[&str])] = &[
    ("causes", &["导致", "引起", "造成", "cause", "causes", "leads to", "results in"]),
    ("optimizes", &["优化", "提升", "提高", "改善", "optimize", "optimizes", "improve", "improves", "boost"]),
    ("contains", &["包含", "包括", "contains", "includes"]),
    ("based_on", &["基于", "依托", "based on"]),
    ("influences", &["影响", "influence", "influences", "affects"]),
    ("requires", &["需要", "依赖", "requires", "needs", "depends on"]),
    ("used_for", &["用于", "应用", "used for", "applied to"]),
];

pub fn is_whitelisted(name: &str) -> bool {
    SHORT_WHITELIST.iter().any(|w| w.eq_ignore_ascii_case(name))
}

pub fn is_stopword(name: &str) -> bool {
    let lowered = name.to_lowercase();
    STOPWORDS_EN.contains(&lowered.as_str()) || STOPWORDS_CJK.contains(&name)
}

pub fn is_important_span(span: &str) -> bool {
    IMPORTANT_TERMS.contains(&span) || IMPORTANT_SUFFIXES.iter().any(|s| span.ends_with(s))
}

/// First relation type whose keywords occur in `context_lower`.
pub fn keyword_relation(context_lower: &str) -> Option<&'static str> {
    RELATION_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| context_lower.contains(w)))
        .map(|(relation_type, _)| *relation_type)
}

pub fn has_relation_keyword(context_lower: &str) -> bool {
    keyword_relation(context_lower).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiters_longest_first() {
        let first_single = SPAN_DELIMITERS
            .iter()
            .position(|d| d.chars().count() == 1)
            .unwrap();
        assert!(SPAN_DELIMITERS[first_single..]
            .iter()
            .all(|d| d.chars().count() == 1));
    }

    #[test]
    fn test_whitelist_is_case_insensitive() {
        assert!(is_whitelisted("roi"));
        assert!(is_whitelisted("IoT"));
        assert!(!is_whitelisted("XYZ"));
    }

    #[test]
    fn test_keyword_relation_order() {
        assert_eq!(keyword_relation("数据导致并影响结果"), Some("causes"));
        assert_eq!(keyword_relation("nothing here"), None);
    }
}
