//! Full-text word values.

use core::cmp::Ordering;

use crate::string::Utf16String;

/// Comparator selection for word values.
///
/// Sort keys over word columns cannot always use plain term order; the
/// full-text driver asks for document-frequency or scale order instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordCompare {
    /// Term, language, then category.
    Term,
    /// Document frequency.
    Df,
    /// Score scale.
    Scale,
}

/// A word produced by full-text search, with its ranking attributes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WordData {
    /// The term itself.
    pub term: Utf16String,
    /// Language tag of the term.
    pub language: Utf16String,
    /// Word category assigned by the analyzer.
    pub category: i32,
    /// Score scale.
    pub scale: f64,
    /// Document frequency.
    pub df: u32,
}

impl WordData {
    /// Creates a word carrying only a term.
    pub fn with_term(term: Utf16String) -> Self {
        Self {
            term,
            ..Self::default()
        }
    }

    /// Compares two words under the selected comparator.
    pub fn compare_by(&self, other: &WordData, variant: WordCompare) -> Ordering {
        match variant {
            WordCompare::Term => self
                .term
                .cmp(&other.term)
                .then_with(|| self.language.cmp(&other.language))
                .then_with(|| self.category.cmp(&other.category)),
            WordCompare::Df => self.df.cmp(&other.df),
            WordCompare::Scale => self
                .scale
                .partial_cmp(&other.scale)
                .unwrap_or(Ordering::Equal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(term: &str, df: u32, scale: f64) -> WordData {
        WordData {
            term: Utf16String::from(term),
            df,
            scale,
            ..WordData::default()
        }
    }

    #[test]
    fn comparator_variants_disagree() {
        let a = word("alpha", 10, 0.5);
        let b = word("beta", 2, 0.9);
        assert_eq!(a.compare_by(&b, WordCompare::Term), Ordering::Less);
        assert_eq!(a.compare_by(&b, WordCompare::Df), Ordering::Greater);
        assert_eq!(a.compare_by(&b, WordCompare::Scale), Ordering::Less);
    }
}
