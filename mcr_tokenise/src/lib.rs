//! Splits input text into an ordered token sequence and reassembles it
//! after the pipeline has macronized each word.
//!
//! [`Token`] is the tagged enum from the data model's redesign note: a flat
//! `Vec<Token>` alternating [`WordToken`]/[`NonWordToken`] values, with
//! enclitic splits represented by [`WordToken::is_enclitic`] rather than a
//! separate connector token. Concatenating every token's surface (in
//! order) always reproduces the input verbatim, split or not, so
//! [`detokenize`] never needs special-case merge logic for the split.
#![allow(dead_code)]
use mcr_morpheus::Analysis;
use mcr_tag::RawTag;
use snafu::Snafu;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display(
        "detokenized output length ({got}) does not match source length ({expected})"
    ))]
    ConcatenationMismatch { got: usize, expected: usize },
}

const SENTENCE_END: [char; 3] = ['.', '?', '!'];
const ENCLITICS: [&str; 3] = ["que", "ne", "ve"];

#[derive(Clone, Debug, PartialEq)]
pub struct WordToken {
    pub surface: String,
    pub is_sentence_end: bool,
    pub is_enclitic: bool,
    pub tag: Option<RawTag>,
    pub candidates: Vec<mcr_tag::AccentedForm>,
    pub macronized: Option<String>,
}

impl WordToken {
    fn new(surface: String) -> Self {
        WordToken {
            surface,
            is_sentence_end: false,
            is_enclitic: false,
            tag: None,
            candidates: Vec::new(),
            macronized: None,
        }
    }

    pub fn surface_lower(&self) -> String {
        self.surface.to_lowercase()
    }

    fn output(&self) -> &str {
        self.macronized.as_deref().unwrap_or(&self.surface)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NonWordToken {
    pub surface: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Word(WordToken),
    NonWord(NonWordToken),
}

impl Token {
    pub fn surface(&self) -> &str {
        match self {
            Token::Word(w) => &w.surface,
            Token::NonWord(n) => &n.surface,
        }
    }

    fn output(&self) -> &str {
        match self {
            Token::Word(w) => w.output(),
            Token::NonWord(n) => &n.surface,
        }
    }

    pub fn as_word(&self) -> Option<&WordToken> {
        match self {
            Token::Word(w) => Some(w),
            Token::NonWord(_) => None,
        }
    }

    pub fn as_word_mut(&mut self) -> Option<&mut WordToken> {
        match self {
            Token::Word(w) => Some(w),
            Token::NonWord(_) => None,
        }
    }
}

fn is_word_char(chars: &[char], i: usize) -> bool {
    let c = chars[i];
    if c.is_alphabetic() {
        return true;
    }
    if c == '\'' || c == '-' {
        let prev_is_letter = i > 0 && chars[i - 1].is_alphabetic();
        let next_is_letter = i + 1 < chars.len() && chars[i + 1].is_alphabetic();
        return prev_is_letter && next_is_letter;
    }
    false
}

/// Splits `text` into word/non-word runs and marks sentence-ending words,
/// without performing enclitic splitting (see [`tokenize_with_lexicon`]).
pub fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    let mut run_start = 0;
    let mut run_is_word = is_word_char(&chars, 0);
    for i in 1..chars.len() {
        let this_is_word = is_word_char(&chars, i);
        if this_is_word != run_is_word {
            push_run(&mut tokens, &chars[run_start..i], run_is_word);
            run_start = i;
            run_is_word = this_is_word;
        }
    }
    push_run(&mut tokens, &chars[run_start..], run_is_word);

    mark_sentence_ends(&mut tokens);
    tokens
}

fn push_run(tokens: &mut Vec<Token>, chars: &[char], is_word: bool) {
    let surface: String = chars.iter().collect();
    if is_word {
        tokens.push(Token::Word(WordToken::new(surface)));
    } else {
        tokens.push(Token::NonWord(NonWordToken { surface }));
    }
}

fn mark_sentence_ends(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        if tokens[i].as_word().is_none() {
            continue;
        }
        let mut ends_sentence = false;
        for following in &tokens[i + 1..] {
            match following {
                Token::Word(_) => break,
                Token::NonWord(n) => {
                    if n.surface.chars().any(|c| SENTENCE_END.contains(&c)) {
                        ends_sentence = true;
                        break;
                    }
                }
            }
        }
        if let Token::Word(w) = &mut tokens[i] {
            w.is_sentence_end = ends_sentence;
        }
    }
}

/// Looks up a wordform's lexicon entries, used only to decide whether an
/// enclitic split should happen.
pub trait LexiconLookup {
    fn has_entry(&mut self, wordform: &str) -> bool;
    fn analyses(&mut self, wordform: &str) -> Vec<Analysis>;
}

/// Same as [`tokenize`], additionally splitting off `-que`/`-ne`/`-ve`
/// enclitics per spec.md §4.1: the stripped prefix must itself be a known
/// lexicon entry, and the full form must not already carry an analysis
/// whose lemma itself ends in the enclitic (meaning the analyzer treats the
/// enclitic as lexicalized, not detachable).
pub fn tokenize_with_lexicon(text: &str, lookup: &mut dyn LexiconLookup) -> Vec<Token> {
    let mut tokens = tokenize(text);
    let mut i = 0;
    while i < tokens.len() {
        if let Some(split) = tokens[i]
            .as_word()
            .and_then(|w| try_split_enclitic(w, lookup))
        {
            let (prefix, suffix) = split;
            let mut prefix_token = WordToken::new(prefix);
            let mut suffix_token = WordToken::new(suffix);
            suffix_token.is_enclitic = true;
            if let Some(w) = tokens[i].as_word() {
                prefix_token.is_sentence_end = false;
                suffix_token.is_sentence_end = w.is_sentence_end;
            }
            tokens.splice(i..=i, [Token::Word(prefix_token), Token::Word(suffix_token)]);
            i += 2;
        } else {
            i += 1;
        }
    }
    tokens
}

fn try_split_enclitic(word: &WordToken, lookup: &mut dyn LexiconLookup) -> Option<(String, String)> {
    let lower = word.surface_lower();
    let lower_chars: Vec<char> = lower.chars().collect();

    for enclitic in ENCLITICS {
        let enclitic_len = enclitic.chars().count();
        if lower_chars.len() <= enclitic_len {
            continue;
        }
        let split_at = lower_chars.len() - enclitic_len;
        let suffix_candidate: String = lower_chars[split_at..].iter().collect();
        if suffix_candidate != enclitic {
            continue;
        }
        let prefix_candidate: String = lower_chars[..split_at].iter().collect();
        if !lookup.has_entry(&prefix_candidate) {
            continue;
        }
        let already_lexicalized = lookup.analyses(&lower).iter().any(|a| {
            a.lemma
                .as_deref()
                .map(|l| l.to_lowercase().ends_with(enclitic))
                .unwrap_or(false)
        });
        if already_lexicalized {
            continue;
        }

        let surface_chars: Vec<char> = word.surface.chars().collect();
        let surface_prefix: String = surface_chars[..split_at].iter().collect();
        let surface_suffix: String = surface_chars[split_at..].iter().collect();
        return Some((surface_prefix, surface_suffix));
    }
    None
}

/// Reassembles the macronized (or original) surfaces of every token back
/// into a single string, in order.
pub fn detokenize(tokens: &[Token]) -> String {
    tokens.iter().map(Token::output).collect()
}

/// As [`detokenize`], but verifies (using the un-macronized surfaces) that
/// the token stream still partitions `source` exactly, surfacing a
/// programmer-error `Error` rather than silently returning a mismatched
/// reassembly.
pub fn detokenize_checked(tokens: &[Token], source: &str) -> Result<String> {
    let surfaces_len: usize = tokens.iter().map(|t| t.surface().chars().count()).sum();
    let source_len = source.chars().count();
    if surfaces_len != source_len {
        return ConcatenationMismatchError {
            got: surfaces_len,
            expected: source_len,
        }
        .fail();
    }
    Ok(detokenize(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().filter_map(|t| t.as_word()).map(|w| w.surface.as_str()).collect()
    }

    #[test]
    fn splits_words_and_nonwords() {
        let tokens = tokenize("cano arma");
        assert_eq!(
            tokens.iter().map(Token::surface).collect::<Vec<_>>(),
            vec!["cano", " ", "arma"]
        );
    }

    #[test]
    fn keeps_internal_apostrophe_and_hyphen_word_internal() {
        let tokens = tokenize("res-publica o'clock");
        assert_eq!(words(&tokens), vec!["res-publica", "o'clock"]);
    }

    #[test]
    fn hyphen_at_boundary_is_not_word_internal() {
        let tokens = tokenize("-cano");
        assert_eq!(tokens[0].surface(), "-");
        assert_eq!(tokens[1].surface(), "cano");
    }

    #[test]
    fn marks_sentence_end_across_intervening_punctuation() {
        let tokens = tokenize("cano. arma");
        let cano = tokens[0].as_word().unwrap();
        assert!(cano.is_sentence_end);
        let arma = tokens[2].as_word().unwrap();
        assert!(!arma.is_sentence_end);
    }

    #[test]
    fn concatenation_invariant_holds() {
        let text = "Arma virumque cano, Troiae qui primus ab oris.";
        let tokens = tokenize(text);
        assert_eq!(detokenize(&tokens), text);
    }

    struct FakeLexicon {
        known: std::collections::HashSet<String>,
        lexicalized: std::collections::HashSet<String>,
    }

    impl LexiconLookup for FakeLexicon {
        fn has_entry(&mut self, wordform: &str) -> bool {
            self.known.contains(wordform)
        }

        fn analyses(&mut self, wordform: &str) -> Vec<Analysis> {
            if self.lexicalized.contains(wordform) {
                vec![Analysis {
                    lemma: Some(wordform.to_owned()),
                    tag: None,
                    accented: None,
                }]
            } else {
                vec![]
            }
        }
    }

    #[test]
    fn splits_enclitic_when_prefix_is_known() {
        let mut lex = FakeLexicon {
            known: ["arma".to_owned()].into_iter().collect(),
            lexicalized: std::collections::HashSet::new(),
        };
        let tokens = tokenize_with_lexicon("armaque", &mut lex);
        assert_eq!(words(&tokens), vec!["arma", "que"]);
        assert!(tokens[1].as_word().unwrap().is_enclitic);
        assert_eq!(detokenize(&tokens), "armaque");
    }

    #[test]
    fn does_not_split_when_prefix_unknown() {
        let mut lex = FakeLexicon {
            known: std::collections::HashSet::new(),
            lexicalized: std::collections::HashSet::new(),
        };
        let tokens = tokenize_with_lexicon("armaque", &mut lex);
        assert_eq!(words(&tokens), vec!["armaque"]);
    }

    #[test]
    fn does_not_split_when_full_form_is_already_lexicalized() {
        let mut lex = FakeLexicon {
            known: ["arma".to_owned()].into_iter().collect(),
            lexicalized: ["armaque".to_owned()].into_iter().collect(),
        };
        let tokens = tokenize_with_lexicon("armaque", &mut lex);
        assert_eq!(words(&tokens), vec!["armaque"]);
    }
}
