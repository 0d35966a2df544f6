//! The core façade: owns every pipeline stage's adapter/store handle and
//! runs a full macronization pass over a string. Grounded in spec.md §9's
//! redesign note (no module-level mutable globals; a single value owns
//! everything the pipeline needs) — contrast with the teacher's own
//! `lazy_static! CONFIG` in `src/config.rs`, which this façade deliberately
//! does not reproduce.
#![allow(dead_code)]
use std::{sync::Arc, time::Duration};

use mcr_align::AlignConfig;
use mcr_data::{EndingsTable, LemmaPriors};
use mcr_lexicon::LexiconStore;
use mcr_morpheus::{Analysis, MorpheusAdapter, MorpheusConfig};
use mcr_scan::Automaton;
use mcr_select::Selector;
use mcr_tag::AccentedForm;
use mcr_tagger::{TaggerAdapter, TaggerConfig};
use mcr_tokenise::{detokenize_checked, tokenize_with_lexicon, LexiconLookup, Token};
use snafu::{ResultExt, Snafu};
use tracing::{instrument, warn};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display("configuration error"))]
    Config { source: mcr_config::Error },
    #[snafu(display("endings/lemma-priors data error"))]
    Data { source: mcr_data::Error },
    #[snafu(display("lexicon store error"))]
    Lexicon { source: mcr_lexicon::Error },
    #[snafu(display("morphological analyzer error"))]
    Morpheus { source: mcr_morpheus::Error },
    #[snafu(display("sequence tagger error"))]
    Tagger { source: mcr_tagger::Error },
    #[snafu(display("detokenization error"))]
    Tokenise { source: mcr_tokenise::Error },
}

const ADAPTER_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns everything a macronization pass touches: the lexicon store handle,
/// the two external-tool adapters, and `Arc`-shared references to the
/// process-wide-immutable endings table and lemma priors, built once and
/// reused across pipeline runs.
pub struct Macronizer {
    lexicon: LexiconStore,
    morpheus: MorpheusAdapter,
    tagger: TaggerAdapter,
    endings: Arc<EndingsTable>,
    priors: Arc<LemmaPriors>,
    align_config: AlignConfig,
}

impl Macronizer {
    #[instrument(skip(config))]
    pub fn new(config: &mcr_config::Config) -> Result<Self> {
        let endings = EndingsTable::load(&config.endings_path).context(DataError)?;
        let priors = LemmaPriors::load(&config.lemma_priors_path).context(DataError)?;

        let mut lexicon = LexiconStore::open(&config.lexicon_db_path).context(LexiconError)?;
        lexicon
            .import_macrons(&config.macrons_path)
            .context(LexiconError)?;

        let morpheus = MorpheusAdapter::new(MorpheusConfig {
            binary_path: config.morpheus_dir.join("bin/cruncher"),
            morphlib_dir: config.morpheus_dir.join("stemlib"),
            timeout: ADAPTER_TIMEOUT,
        });
        let tagger = TaggerAdapter::new(TaggerConfig {
            binary_path: config.rftagger_dir.join("rft-annotate"),
            model_path: config.rftagger_dir.join("morphology.model"),
            timeout: ADAPTER_TIMEOUT,
        });

        Ok(Macronizer {
            lexicon,
            morpheus,
            tagger,
            endings: Arc::new(endings),
            priors: Arc::new(priors),
            align_config: AlignConfig {
                do_macronize: true,
                perform_uv: true,
                perform_ij: true,
                also_maius: true,
            },
        })
    }

    /// Runs the full pipeline (tokenize → lexicon resolve → tag → select →
    /// align → detokenize) over `text`, always choosing each word's
    /// top-ranked candidate. See [`Self::macronize_scanned`] for the
    /// scansion-aware variant.
    #[instrument(skip(self, text))]
    pub fn macronize(&mut self, text: &str) -> Result<String> {
        let mut tokens = self.resolve_tokens(text)?;
        for token in &mut tokens {
            align_token(token, &self.align_config);
        }
        detokenize_checked(&tokens, text).context(TokeniseError)
    }

    /// As [`Self::macronize`], but re-ranks each sentence's word candidates
    /// against `automaton` before aligning, falling back to the top-ranked
    /// candidate for a sentence with no accepting scansion.
    #[instrument(skip(self, text, automaton))]
    pub fn macronize_scanned(&mut self, text: &str, automaton: &Automaton) -> Result<String> {
        let mut tokens = self.resolve_tokens(text)?;
        for sentence in sentence_ranges(&tokens) {
            let candidates: Vec<Vec<AccentedForm>> = sentence
                .iter()
                .map(|&i| tokens[i].as_word().unwrap().candidates.clone())
                .collect();
            if let Some(chosen) = mcr_scan::rerank(automaton, &candidates) {
                for (&i, form) in sentence.iter().zip(chosen) {
                    if let Some(w) = tokens[i].as_word_mut() {
                        w.candidates = vec![form];
                    }
                }
            }
        }
        for token in &mut tokens {
            align_token(token, &self.align_config);
        }
        detokenize_checked(&tokens, text).context(TokeniseError)
    }

    /// Tokenizes, backfills the lexicon, tags, and selects candidates for
    /// every word, without aligning or detokenizing yet.
    fn resolve_tokens(&mut self, text: &str) -> Result<Vec<Token>> {
        let mut probe = LexiconProbe {
            lexicon: &mut self.lexicon,
        };
        let mut tokens = tokenize_with_lexicon(text, &mut probe);

        let word_surfaces: Vec<String> = tokens
            .iter()
            .filter_map(Token::as_word)
            .map(|w| w.surface_lower())
            .collect();
        self.lexicon
            .load_words(&word_surfaces, &self.morpheus)
            .context(LexiconError)?;

        let tagger_input: Vec<String> = tokens
            .iter()
            .filter_map(Token::as_word)
            .map(|w| w.surface.clone())
            .collect();
        let raw_tags = self.tagger.tag(&tagger_input).context(TaggerError)?;

        let selector = Selector::new(&self.endings, &self.priors);
        let mut tag_idx = 0;
        for token in &mut tokens {
            let Some(word) = token.as_word_mut() else {
                continue;
            };
            let raw_tag = raw_tags[tag_idx].clone();
            tag_idx += 1;
            let tag = raw_tag.to_tag();
            let surface_lower = word.surface_lower();
            let analyses: Vec<Analysis> = self.lexicon.lookup(&surface_lower).context(LexiconError)?;
            let selection = selector.select(&surface_lower, &tag, &analyses);
            word.tag = Some(raw_tag);
            word.candidates = selection.candidates;
        }
        Ok(tokens)
    }
}

fn align_token(token: &mut Token, config: &AlignConfig) {
    let Some(word) = token.as_word_mut() else {
        return;
    };
    let Some(chosen) = word.candidates.first().cloned() else {
        return;
    };
    let aligned = mcr_align::macronize(&word.surface, &chosen, config);
    word.macronized = Some(AccentedForm::new(aligned).to_glyphs());
}

/// Groups the indices of word tokens into runs that end at a
/// `is_sentence_end` word, for feeding to the scansion re-ranker one
/// sentence at a time.
fn sentence_ranges(tokens: &[Token]) -> Vec<Vec<usize>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let Some(word) = token.as_word() else {
            continue;
        };
        current.push(i);
        if word.is_sentence_end {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Adapts [`LexiconStore`] to [`LexiconLookup`] for the tokenizer's
/// enclitic-split probe; lookup failures are logged and treated as "no
/// entry" rather than aborting tokenization, since the lexicon itself will
/// surface the same failure (and abort the pipeline) at the backfill step.
struct LexiconProbe<'a> {
    lexicon: &'a mut LexiconStore,
}

impl LexiconLookup for LexiconProbe<'_> {
    fn has_entry(&mut self, wordform: &str) -> bool {
        match self.lexicon.lookup(wordform) {
            Ok(analyses) => !analyses.is_empty(),
            Err(err) => {
                warn!(wordform, %err, "lexicon probe failed during tokenization");
                false
            }
        }
    }

    fn analyses(&mut self, wordform: &str) -> Vec<Analysis> {
        match self.lexicon.lookup(wordform) {
            Ok(analyses) => analyses,
            Err(err) => {
                warn!(wordform, %err, "lexicon probe failed during tokenization");
                Vec::new()
            }
        }
    }
}
