//! Picks the most likely accented form for a tagged word, per spec.md
//! §4.5: exact tag match first, then nearest by [`tag_distance`], broken by
//! corpus frequency priors, falling back to suffix-based guessing from the
//! endings table for words the lexicon never recognized.
#![allow(dead_code)]
use std::cmp::Reverse;

use mcr_data::{EndingsTable, LemmaPriors};
use mcr_morpheus::Analysis;
use mcr_tag::{tag_distance, AccentedForm, Tag, BREVE_MARKER, MACRON_MARKER};

/// Result of selecting among a word's candidate analyses: `candidates[0]`
/// is the chosen accented form, the rest are kept for the scansion
/// re-ranker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub candidates: Vec<AccentedForm>,
}

impl Selection {
    pub fn chosen(&self) -> &AccentedForm {
        &self.candidates[0]
    }
}

pub struct Selector<'a> {
    endings: &'a EndingsTable,
    priors: &'a LemmaPriors,
}

impl<'a> Selector<'a> {
    pub fn new(endings: &'a EndingsTable, priors: &'a LemmaPriors) -> Self {
        Selector { endings, priors }
    }

    /// `surface_lower` is the lowercased word surface; `tag` is the
    /// canonical tag assigned by the tagger (already narrowed from the
    /// tagger's raw 12-character tag); `analyses` are the lexicon's
    /// entries for `surface_lower`.
    pub fn select(&self, surface_lower: &str, tag: &Tag, analyses: &[Analysis]) -> Selection {
        let real: Vec<&Analysis> = analyses.iter().filter(|a| !a.is_unknown()).collect();
        if real.is_empty() {
            return Selection {
                candidates: vec![self.fallback(surface_lower, tag)],
            };
        }

        let exact: Vec<&Analysis> = real
            .iter()
            .copied()
            .filter(|a| a.tag.as_ref() == Some(tag))
            .collect();
        let pool = if exact.is_empty() { real } else { exact };

        let mut ranked: Vec<(&Analysis, u32)> = pool
            .into_iter()
            .map(|a| {
                let distance = a
                    .tag
                    .as_ref()
                    .and_then(|t| tag_distance(t.as_str(), tag.as_str()).ok())
                    .unwrap_or(u32::MAX);
                (a, distance)
            })
            .collect();

        ranked.sort_by_cached_key(|(a, distance)| {
            let lemma = a.lemma.as_deref().unwrap_or("");
            let word_lemma_freq = self.priors.word_lemma_freq(surface_lower, lemma);
            let lemma_freq = self.priors.lemma_frequency(lemma);
            let corpus_rank = self
                .priors
                .corpus_lemma_rank(surface_lower, lemma)
                .unwrap_or(usize::MAX);
            let accented = a
                .accented
                .as_ref()
                .map(AccentedForm::as_str)
                .unwrap_or("")
                .to_owned();
            (
                *distance,
                Reverse(word_lemma_freq),
                Reverse(lemma_freq),
                corpus_rank,
                accented,
            )
        });

        let mut candidates = Vec::with_capacity(ranked.len());
        for (a, _) in ranked {
            if let Some(accented) = &a.accented {
                if !candidates.contains(accented) {
                    candidates.push(accented.clone());
                }
            }
        }
        if candidates.is_empty() {
            candidates.push(AccentedForm::new(surface_lower));
        }
        Selection { candidates }
    }

    /// Suffix-based guess for a word the lexicon has no real analyses for:
    /// the longest endings-table suffix (ignoring in-band markers) that is
    /// a proper suffix of `surface_lower`, or the bare surface if none
    /// matches.
    fn fallback(&self, surface_lower: &str, tag: &Tag) -> AccentedForm {
        for marked_suffix in self.endings.endings_for(tag.as_str()) {
            let plain: String = marked_suffix
                .chars()
                .filter(|c| *c != MACRON_MARKER && *c != BREVE_MARKER)
                .collect();
            if !plain.is_empty()
                && plain.len() < surface_lower.len()
                && surface_lower.ends_with(&plain)
            {
                let prefix = &surface_lower[..surface_lower.len() - plain.len()];
                return AccentedForm::new(format!("{prefix}{marked_suffix}"));
            }
        }
        AccentedForm::new(surface_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tag(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    #[test]
    fn exact_match_is_preferred_over_distance_ranked() {
        let endings = EndingsTable::new_for_test(HashMap::new());
        let priors = LemmaPriors::default();
        let selector = Selector::new(&endings, &priors);

        let exact = Analysis {
            lemma: Some("canere".into()),
            tag: Some(tag("v1spia---")),
            accented: Some(AccentedForm::new("can_o")),
        };
        let near = Analysis {
            lemma: Some("canere".into()),
            tag: Some(tag("v3spia---")),
            accented: Some(AccentedForm::new("canit")),
        };
        let selection = selector.select("cano", &tag("v1spia---"), &[near, exact.clone()]);
        assert_eq!(selection.chosen(), exact.accented.as_ref().unwrap());
    }

    #[test]
    fn ties_break_on_word_lemma_freq_then_lemma_freq_then_corpus_rank() {
        let endings = EndingsTable::new_for_test(HashMap::new());
        let mut word_lemma_freq = HashMap::new();
        word_lemma_freq.insert(("cano".to_owned(), "canus".to_owned()), 5u64);
        word_lemma_freq.insert(("cano".to_owned(), "canere".to_owned()), 1u64);
        let mut lemma_frequency = HashMap::new();
        lemma_frequency.insert("canus".to_owned(), 5u64);
        lemma_frequency.insert("canere".to_owned(), 100u64);
        let priors = LemmaPriors::new_for_test(lemma_frequency, word_lemma_freq, HashMap::new());
        let selector = Selector::new(&endings, &priors);

        let a = Analysis {
            lemma: Some("canere".into()),
            tag: Some(tag("v3spia---")),
            accented: Some(AccentedForm::new("canit_a")),
        };
        let b = Analysis {
            lemma: Some("canus".into()),
            tag: Some(tag("n-sn-----")),
            accented: Some(AccentedForm::new("can_us")),
        };
        // Neither matches exactly and neither is closer by tag distance than
        // the other relative to an unrelated assigned tag; word_lemma_freq
        // should decide in favor of "canus" (5 > 1).
        let t = tag("r--------");
        let selection = selector.select("cano", &t, &[a, b.clone()]);
        assert_eq!(selection.chosen(), b.accented.as_ref().unwrap());
    }

    #[test]
    fn dedups_candidates_preserving_order() {
        let endings = EndingsTable::new_for_test(HashMap::new());
        let priors = LemmaPriors::default();
        let selector = Selector::new(&endings, &priors);

        let a = Analysis {
            lemma: Some("canere".into()),
            tag: Some(tag("v1spia---")),
            accented: Some(AccentedForm::new("can_o")),
        };
        let dup = Analysis {
            lemma: Some("canere2".into()),
            tag: Some(tag("v1spia---")),
            accented: Some(AccentedForm::new("can_o")),
        };
        let selection = selector.select("cano", &tag("v1spia---"), &[a, dup]);
        assert_eq!(selection.candidates.len(), 1);
    }

    #[test]
    fn unknown_word_falls_back_to_longest_matching_suffix() {
        let mut map = HashMap::new();
        map.insert(
            "v1spia---".to_owned(),
            vec!["_o".to_owned(), "o".to_owned()],
        );
        let endings = EndingsTable::new_for_test(map);
        let priors = LemmaPriors::default();
        let selector = Selector::new(&endings, &priors);

        let selection = selector.select("cano", &tag("v1spia---"), &[]);
        assert_eq!(selection.chosen().as_str(), "can_o");
    }

    #[test]
    fn unknown_word_with_no_matching_suffix_is_unmarked() {
        let endings = EndingsTable::new_for_test(HashMap::new());
        let priors = LemmaPriors::default();
        let selector = Selector::new(&endings, &priors);

        let selection = selector.select("xyzzy", &tag("v1spia---"), &[]);
        assert_eq!(selection.chosen().as_str(), "xyzzy");
        assert!(selection.chosen().is_unmarked());
    }

    #[test]
    fn only_unknown_analyses_trigger_fallback() {
        let endings = EndingsTable::new_for_test(HashMap::new());
        let priors = LemmaPriors::default();
        let selector = Selector::new(&endings, &priors);

        let selection = selector.select("cano", &tag("v1spia---"), &[Analysis::unknown()]);
        assert_eq!(selection.chosen().as_str(), "cano");
    }
}
