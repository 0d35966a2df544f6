//! Transfers vowel-length markers from a chosen accented form onto the
//! original surface, case-preserving, per spec.md §4.6. Grounded in the
//! exact edge cases pinned by `macronizer_test.py::TestTokenMacronize`
//! (trailing/leading macron handling, `u/v` and `i/j` orthographic
//! variants, the `also_maius` rule and its short-`j` prefix exceptions).
#![allow(dead_code)]
use mcr_tag::{AccentedForm, BREVE_MARKER, MACRON_MARKER};

/// Word-initial prefixes where a vowel immediately followed by `j` is
/// genuinely short (the `j` closes a short first syllable rather than
/// lengthening it), so `also_maius` must not add a macron there.
const SHORT_J_PREFIXES: [&str; 3] = ["rej", "sej", "quoj"];

#[derive(Clone, Copy, Debug, Default)]
pub struct AlignConfig {
    pub do_macronize: bool,
    pub perform_uv: bool,
    pub perform_ij: bool,
    pub also_maius: bool,
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Rewrites every non-excepted `Vj`/`VJ` in `accented` to `V_j`/`V_J`.
fn apply_also_maius(accented: &str) -> String {
    let chars: Vec<char> = accented.chars().collect();
    let lower: Vec<char> = accented.to_ascii_lowercase().chars().collect();
    let mut out = String::with_capacity(accented.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        let next_is_j = chars.get(i + 1).is_some_and(|&n| n == 'j' || n == 'J');
        if is_vowel(lower[i]) && next_is_j {
            let prefix: String = lower[..=i + 1].iter().collect();
            if !SHORT_J_PREFIXES.contains(&prefix.as_str()) {
                out.push(MACRON_MARKER);
            }
        }
    }
    out
}

fn skeleton(s: &str, perform_uv: bool, perform_ij: bool) -> String {
    s.chars()
        .filter(|c| c.is_alphabetic())
        .map(|c| {
            let mut c = c.to_ascii_lowercase();
            if perform_uv && c == 'v' {
                c = 'u';
            }
            if perform_ij && c == 'j' {
                c = 'i';
            }
            c
        })
        .collect()
}

/// A letter from the accented form paired with the run of in-band markers
/// (`_`/`^`) immediately following it.
struct AccLetter {
    letter: char,
    markers: String,
}

fn parse_acc_letters(accented: &str) -> (String, Vec<AccLetter>) {
    let chars: Vec<char> = accented.chars().collect();
    let mut i = 0;
    let mut leading = String::new();
    while i < chars.len() && (chars[i] == MACRON_MARKER || chars[i] == BREVE_MARKER) {
        leading.push(chars[i]);
        i += 1;
    }
    let mut letters = Vec::new();
    while i < chars.len() {
        let letter = chars[i];
        i += 1;
        let mut markers = String::new();
        while i < chars.len() && (chars[i] == MACRON_MARKER || chars[i] == BREVE_MARKER) {
            markers.push(chars[i]);
            i += 1;
        }
        letters.push(AccLetter { letter, markers });
    }
    (leading, letters)
}

fn render_markers(markers: &str, do_macronize: bool) -> &'static str {
    if !do_macronize {
        return "";
    }
    let has_macron = markers.contains(MACRON_MARKER);
    let has_breve = markers.contains(BREVE_MARKER);
    if has_macron && !has_breve {
        "_"
    } else {
        ""
    }
}

/// Aligns `surface` against `accented`, transferring vowel length onto it.
/// Returns `surface` unchanged if the two don't share a letter skeleton.
pub fn macronize(surface: &str, accented: &AccentedForm, config: &AlignConfig) -> String {
    let raw = if config.also_maius && config.perform_ij {
        apply_also_maius(accented.as_str())
    } else {
        accented.as_str().to_owned()
    };

    let surface_skeleton = skeleton(surface, config.perform_uv, config.perform_ij);
    let acc_skeleton = skeleton(&raw, config.perform_uv, config.perform_ij);
    if surface_skeleton != acc_skeleton {
        return surface.to_owned();
    }

    let (leading, acc_letters) = parse_acc_letters(&raw);
    let mut out = String::with_capacity(surface.len() + 4);
    let mut acc_idx = 0;
    for s_char in surface.chars() {
        if !s_char.is_alphabetic() {
            out.push(s_char);
            continue;
        }
        let item = &acc_letters[acc_idx];
        if acc_idx == 0 {
            out.push_str(render_markers(&leading, config.do_macronize));
        }
        acc_idx += 1;

        let acc_lower = item.letter.to_ascii_lowercase();
        let out_char = if config.perform_uv && acc_lower == 'v' {
            if s_char.is_uppercase() {
                'V'
            } else {
                'v'
            }
        } else if config.perform_ij && acc_lower == 'j' {
            if s_char.is_uppercase() {
                'J'
            } else {
                'j'
            }
        } else {
            s_char
        };
        out.push(out_char);
        out.push_str(render_markers(&item.markers, config.do_macronize));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(s: &str) -> AccentedForm {
        AccentedForm::new(s)
    }

    #[test]
    fn does_not_crash_on_unknown_word_with_empty_accented_form() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: true,
            perform_ij: false,
        };
        assert_eq!(macronize("ignotus", &acc(""), &config), "ignotus");
    }

    #[test]
    fn skeleton_check_bails_out_on_mismatched_words() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: false,
            perform_ij: false,
        };
        assert_eq!(macronize("amica", &acc("ami_cus"), &config), "amica");
    }

    #[test]
    fn skeleton_check_allows_ij_orthographic_variants() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: false,
            perform_ij: true,
        };
        assert_eq!(macronize("Iulius", &acc("ju_lius"), &config), "Ju_lius");
    }

    #[test]
    fn skeleton_check_allows_uv_orthographic_variants() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: true,
            perform_ij: false,
        };
        assert_eq!(macronize("uoluit", &acc("vo_lvit"), &config), "vo_lvit");
    }

    #[test]
    fn handles_trailing_macron_correctly() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: false,
            perform_ij: false,
        };
        assert_eq!(macronize("porta", &acc("porta_"), &config), "porta_");
    }

    #[test]
    fn handles_leading_macron_correctly() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: false,
            perform_ij: false,
        };
        assert_eq!(macronize("test", &acc("_test"), &config), "_test");
    }

    #[test]
    fn handles_and_cleans_up_multiple_trailing_macrons() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: false,
            perform_ij: false,
        };
        assert_eq!(macronize("causa", &acc("ca_usa__"), &config), "ca_usa_");
    }

    #[test]
    fn domacronize_false_still_performs_uv_orthography_changes() {
        let config = AlignConfig {
            do_macronize: false,
            also_maius: false,
            perform_uv: true,
            perform_ij: false,
        };
        assert_eq!(macronize("uoluit", &acc("vo_lvit"), &config), "volvit");
    }

    #[test]
    fn domacronize_false_still_performs_ij_orthography_changes() {
        let config = AlignConfig {
            do_macronize: false,
            also_maius: false,
            perform_uv: false,
            perform_ij: true,
        };
        assert_eq!(macronize("eius", &acc("e_jus"), &config), "ejus");
    }

    #[test]
    fn alsomaius_flag_adds_macron_before_consonantal_j() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: true,
            perform_uv: false,
            perform_ij: true,
        };
        assert_eq!(macronize("eius", &acc("ejus"), &config), "e_jus");
    }

    #[test]
    fn alsomaius_flag_does_not_add_macron_for_known_short_prefixes() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: true,
            perform_uv: false,
            perform_ij: true,
        };
        assert_eq!(macronize("reiecit", &acc("rejecit"), &config), "rejecit");
    }

    #[test]
    fn non_letter_characters_pass_through_verbatim() {
        let config = AlignConfig {
            do_macronize: true,
            also_maius: false,
            perform_uv: false,
            perform_ij: false,
        };
        assert_eq!(
            macronize("cano,", &acc("can_o"), &config),
            "can_o,"
        );
    }
}
