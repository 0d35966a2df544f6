//! Static, read-only, process-wide tables derived offline from treebank
//! data: the endings table (tag -> macronized suffixes) and the lemma
//! priors (frequency tables used to break selector ties). Loading these
//! tables is the only thing this crate does; building them from treebank
//! XML is the data-preparation pipeline's job, out of scope here.
#![allow(dead_code)]
use std::{
    collections::HashMap,
    path::Path,
};

use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display("failed to read data file {path:?}"))]
    ReadError {
        path: std::path::PathBuf,
        source: csv::Error,
    },
    #[snafu(display("malformed row in {path:?}: {row:?}"))]
    MalformedRow {
        path: std::path::PathBuf,
        row: csv::StringRecord,
    },
}

/// Tag -> macronized suffixes, longest-first, as laid out in the source
/// file (see spec.md §8 invariant 3).
#[derive(Debug, Clone, Default)]
pub struct EndingsTable(HashMap<String, Vec<String>>);

impl EndingsTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_path(path)
            .context(ReadError { path })?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for rec in rdr.records() {
            let rec = rec.context(ReadError { path })?;
            let tag = rec
                .get(0)
                .with_context(|| MalformedRowError {
                    path: path.to_owned(),
                    row: rec.clone(),
                })?
                .to_owned();
            let suffix = rec
                .get(1)
                .with_context(|| MalformedRowError {
                    path: path.to_owned(),
                    row: rec.clone(),
                })?
                .to_owned();
            map.entry(tag).or_default().push(suffix);
        }
        debug!(tags = map.len(), "loaded endings table");
        Ok(EndingsTable(map))
    }

    pub fn new_for_test(map: HashMap<String, Vec<String>>) -> Self {
        EndingsTable(map)
    }

    /// The longest-first suffix list for a tag, or an empty slice if the
    /// tag was never observed.
    pub fn endings_for(&self, tag: &str) -> &[String] {
        self.0.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// `lemma_frequency`, `word_lemma_freq`, and `wordform_to_corpus_lemmas`
/// from spec.md §3, all derived from the same (wordform, lemma, count) rows.
#[derive(Debug, Clone, Default)]
pub struct LemmaPriors {
    lemma_frequency: HashMap<String, u64>,
    word_lemma_freq: HashMap<(String, String), u64>,
    wordform_to_corpus_lemmas: HashMap<String, Vec<String>>,
}

impl LemmaPriors {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_path(path)
            .context(ReadError { path })?;

        let mut this = LemmaPriors::default();
        for rec in rdr.records() {
            let rec = rec.context(ReadError { path })?;
            let malformed = || MalformedRowError {
                path: path.to_owned(),
                row: rec.clone(),
            };
            let wordform = rec.get(0).with_context(malformed)?.to_owned();
            let lemma = rec.get(1).with_context(malformed)?.to_owned();
            let count: u64 = rec
                .get(2)
                .with_context(malformed)?
                .parse()
                .ok()
                .with_context(malformed)?;

            *this.lemma_frequency.entry(lemma.clone()).or_default() += count;
            *this
                .word_lemma_freq
                .entry((wordform.clone(), lemma.clone()))
                .or_default() += count;
            let lemmas = this.wordform_to_corpus_lemmas.entry(wordform).or_default();
            if !lemmas.contains(&lemma) {
                lemmas.push(lemma);
            }
        }
        debug!(
            lemmas = this.lemma_frequency.len(),
            "loaded lemma priors"
        );
        Ok(this)
    }

    pub fn new_for_test(
        lemma_frequency: HashMap<String, u64>,
        word_lemma_freq: HashMap<(String, String), u64>,
        wordform_to_corpus_lemmas: HashMap<String, Vec<String>>,
    ) -> Self {
        LemmaPriors {
            lemma_frequency,
            word_lemma_freq,
            wordform_to_corpus_lemmas,
        }
    }

    pub fn lemma_frequency(&self, lemma: &str) -> u64 {
        self.lemma_frequency.get(lemma).copied().unwrap_or(0)
    }

    pub fn word_lemma_freq(&self, wordform: &str, lemma: &str) -> u64 {
        self.word_lemma_freq
            .get(&(wordform.to_owned(), lemma.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Position of `lemma` within the corpus-order lemma list for
    /// `wordform`, lower is earlier; `None` if never observed together.
    pub fn corpus_lemma_rank(&self, wordform: &str, lemma: &str) -> Option<usize> {
        self.wordform_to_corpus_lemmas
            .get(wordform)
            .and_then(|lemmas| lemmas.iter().position(|l| l == lemma))
    }
}
