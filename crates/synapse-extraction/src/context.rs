use synapse_core::domain::ActiveDomain;
use synapse_core::text::{char_len, find_occurrences};

/// Everything one extraction call needs, passed explicitly to each stage.
pub struct ExtractionContext<'a> {
    pub text: &'a str,
    pub lowered: String,
    /// Length in chars.
    pub length: usize,
    pub domain: &'a ActiveDomain,
    pub document: Option<&'a str>,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(text: &'a str, domain: &'a ActiveDomain, document: Option<&'a str>) -> Self {
        Self {
            text,
            lowered: text.to_lowercase(),
            length: char_len(text),
            domain,
            document,
        }
    }

    /// Char offsets of case-insensitive occurrences of `name`.
    pub fn occurrences(&self, name: &str) -> Vec<usize> {
        find_occurrences(&self.lowered, &name.to_lowercase())
    }

    pub fn mentions(&self, name: &str) -> bool {
        !self.occurrences(name).is_empty()
    }
}
