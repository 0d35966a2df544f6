//! Optional metrical re-ranker (spec.md §4.7): runs a Viterbi-style DP over
//! a sentence's candidate accented forms against a finite-state scansion
//! automaton, picking the cheapest path that both respects the candidate
//! ranking from the selector and is accepted as a complete verse.
#![allow(dead_code)]
use std::collections::HashMap;

use mcr_tag::{AccentedForm, BREVE_MARKER, MACRON_MARKER};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quantity {
    Long,
    Short,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SymbolChoice {
    Fixed(Quantity),
    Ambiguous,
}

/// A candidate accented form broken into one [`SymbolChoice`] per vowel, in
/// order, with the char index of each vowel in the source string so a
/// resolved path can be spliced back into concrete markers.
struct CandidateExpansion {
    source: AccentedForm,
    symbols: Vec<SymbolChoice>,
    vowel_indices: Vec<usize>,
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

fn expand(form: &AccentedForm) -> CandidateExpansion {
    let chars: Vec<char> = form.as_str().chars().collect();
    let mut symbols = Vec::new();
    let mut vowel_indices = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if is_vowel(c) {
            vowel_indices.push(i);
            let mut has_macron = false;
            let mut has_breve = false;
            let mut j = i + 1;
            while j < chars.len() && (chars[j] == MACRON_MARKER || chars[j] == BREVE_MARKER) {
                has_macron |= chars[j] == MACRON_MARKER;
                has_breve |= chars[j] == BREVE_MARKER;
                j += 1;
            }
            symbols.push(if has_macron && has_breve {
                SymbolChoice::Ambiguous
            } else if has_macron {
                SymbolChoice::Fixed(Quantity::Long)
            } else {
                SymbolChoice::Fixed(Quantity::Short)
            });
            i = j;
        } else {
            i += 1;
        }
    }
    CandidateExpansion {
        source: form.clone(),
        symbols,
        vowel_indices,
    }
}

/// Splices `resolved` (one [`Quantity`] per vowel, in order) back onto
/// `expansion`'s source string, replacing each vowel's marker run with a
/// single macron marker (long) or no marker at all (short).
fn rebuild(expansion: &CandidateExpansion, resolved: &[Quantity]) -> AccentedForm {
    let chars: Vec<char> = expansion.source.as_str().chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut vowel_cursor = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if vowel_cursor < expansion.vowel_indices.len() && expansion.vowel_indices[vowel_cursor] == i
        {
            out.push(c);
            let mut j = i + 1;
            while j < chars.len() && (chars[j] == MACRON_MARKER || chars[j] == BREVE_MARKER) {
                j += 1;
            }
            if resolved[vowel_cursor] == Quantity::Long {
                out.push(MACRON_MARKER);
            }
            vowel_cursor += 1;
            i = j;
        } else {
            out.push(c);
            i += 1;
        }
    }
    AccentedForm::new(out)
}

/// `A = (Σ, δ, q0, F, cost)` with `Σ = {L, S}`: states are plain `usize`
/// indices, transitions carry a non-negative cost, and `F` is the set of
/// states that accept a complete verse.
#[derive(Debug, Default)]
pub struct Automaton {
    start: usize,
    accepting: std::collections::HashSet<usize>,
    transitions: HashMap<(usize, Quantity), (usize, u32)>,
}

impl Automaton {
    pub fn new(start: usize) -> Self {
        Automaton {
            start,
            accepting: Default::default(),
            transitions: Default::default(),
        }
    }

    pub fn add_transition(&mut self, from: usize, symbol: Quantity, to: usize, cost: u32) -> &mut Self {
        self.transitions.insert((from, symbol), (to, cost));
        self
    }

    pub fn accept(&mut self, state: usize) -> &mut Self {
        self.accepting.insert(state);
        self
    }
}

/// Minimal cost (and resolved quantities) to run `symbols` from `start`,
/// keyed by the automaton state reached — branching at every ambiguous
/// symbol and keeping only the cheapest path into each state.
fn run_candidate(
    automaton: &Automaton,
    start: usize,
    symbols: &[SymbolChoice],
) -> HashMap<usize, (u32, Vec<Quantity>)> {
    let mut layer = HashMap::new();
    layer.insert(start, (0u32, Vec::new()));
    for choice in symbols {
        let mut next: HashMap<usize, (u32, Vec<Quantity>)> = HashMap::new();
        for (state, (cost, resolved)) in &layer {
            let options: &[Quantity] = match choice {
                SymbolChoice::Fixed(q) => std::slice::from_ref(q),
                SymbolChoice::Ambiguous => &[Quantity::Long, Quantity::Short],
            };
            for &q in options {
                if let Some(&(to, tcost)) = automaton.transitions.get(&(*state, q)) {
                    let total = cost + tcost;
                    let better = next.get(&to).map(|(c, _)| total < *c).unwrap_or(true);
                    if better {
                        let mut path = resolved.clone();
                        path.push(q);
                        next.insert(to, (total, path));
                    }
                }
            }
        }
        if next.is_empty() {
            return next;
        }
        layer = next;
    }
    layer
}

struct BackEntry {
    cost: u32,
    candidate_idx: usize,
    resolved: Vec<Quantity>,
    prev_state: usize,
}

/// Re-ranks a sentence's per-word candidate lists (each already ranked by
/// the selector, index 0 = its top pick) against `automaton`. Returns the
/// chosen accented form for each word on an accepting path, or `None` if no
/// accepting path exists — in which case the caller should leave the
/// selector's own top picks unchanged.
pub fn rerank(automaton: &Automaton, words: &[Vec<AccentedForm>]) -> Option<Vec<AccentedForm>> {
    let expansions: Vec<Vec<CandidateExpansion>> = words
        .iter()
        .map(|cands| cands.iter().map(expand).collect())
        .collect();

    let mut layers: Vec<HashMap<usize, BackEntry>> = Vec::with_capacity(words.len());
    let mut current: HashMap<usize, u32> = HashMap::new();
    current.insert(automaton.start, 0);

    for cands in &expansions {
        let mut next_best: HashMap<usize, BackEntry> = HashMap::new();
        for (&state, &cost) in &current {
            for (candidate_idx, expansion) in cands.iter().enumerate() {
                let local = run_candidate(automaton, state, &expansion.symbols);
                for (end_state, (added, resolved)) in local {
                    let total = cost + candidate_idx as u32 + added;
                    let better = next_best
                        .get(&end_state)
                        .map(|e| total < e.cost)
                        .unwrap_or(true);
                    if better {
                        next_best.insert(
                            end_state,
                            BackEntry {
                                cost: total,
                                candidate_idx,
                                resolved,
                                prev_state: state,
                            },
                        );
                    }
                }
            }
        }
        if next_best.is_empty() {
            return None;
        }
        current = next_best.iter().map(|(&s, e)| (s, e.cost)).collect();
        layers.push(next_best);
    }

    let last_layer = layers.last()?;
    let (&end_state, _) = last_layer
        .iter()
        .filter(|(s, _)| automaton.accepting.contains(s))
        .min_by_key(|(_, e)| e.cost)?;

    let mut chosen: Vec<Option<AccentedForm>> = vec![None; words.len()];
    let mut state = end_state;
    for word_idx in (0..words.len()).rev() {
        let entry = &layers[word_idx][&state];
        let expansion = &expansions[word_idx][entry.candidate_idx];
        chosen[word_idx] = Some(rebuild(expansion, &entry.resolved));
        state = entry.prev_state;
    }
    Some(chosen.into_iter().map(|c| c.unwrap()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(s: &str) -> AccentedForm {
        AccentedForm::new(s)
    }

    /// Accepts exactly the two-syllable pattern "long short".
    fn long_short_automaton() -> Automaton {
        let mut a = Automaton::new(0);
        a.add_transition(0, Quantity::Long, 1, 0);
        a.add_transition(1, Quantity::Short, 2, 0);
        a.accept(2);
        a
    }

    #[test]
    fn accepts_fixed_quantities_matching_the_automaton() {
        let automaton = long_short_automaton();
        let words = vec![vec![acc("ca_nit")]];
        let chosen = rerank(&automaton, &words).unwrap();
        assert_eq!(chosen[0], acc("ca_nit"));
    }

    #[test]
    fn resolves_ambiguous_vowel_to_fit_the_automaton() {
        let automaton = long_short_automaton();
        // "ca_nit" would be long-short if the first vowel is long, but here
        // the first vowel is ambiguous; only short-long would violate the
        // automaton, so it must be resolved to long.
        let words = vec![vec![acc("ca_^nit")]];
        let chosen = rerank(&automaton, &words).unwrap();
        assert_eq!(chosen[0], acc("ca_nit"));
    }

    #[test]
    fn returns_none_when_no_accepting_path_exists() {
        let automaton = long_short_automaton();
        let words = vec![vec![acc("canit")]]; // short-short, rejected
        assert!(rerank(&automaton, &words).is_none());
    }

    #[test]
    fn prefers_lower_ranked_candidate_when_it_fits() {
        let automaton = long_short_automaton();
        // First candidate (rank 0) is short-short and does not fit; second
        // candidate (rank 1) is long-short and does, so it must be chosen
        // even though it costs +1 in base rank.
        let words = vec![vec![acc("canit"), acc("ca_nit")]];
        let chosen = rerank(&automaton, &words).unwrap();
        assert_eq!(chosen[0], acc("ca_nit"));
    }

    #[test]
    fn scans_across_multiple_words() {
        // "long short" then "long short" again, via a 4-state chain.
        let mut automaton = Automaton::new(0);
        automaton.add_transition(0, Quantity::Long, 1, 0);
        automaton.add_transition(1, Quantity::Short, 2, 0);
        automaton.add_transition(2, Quantity::Long, 3, 0);
        automaton.add_transition(3, Quantity::Short, 4, 0);
        automaton.accept(4);

        let words = vec![vec![acc("ca_nit")], vec![acc("ro_sa")]];
        let chosen = rerank(&automaton, &words).unwrap();
        assert_eq!(chosen, vec![acc("ca_nit"), acc("ro_sa")]);
    }
}
