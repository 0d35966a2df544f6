//! Adapter for the external morphological analyzer ("the cruncher").
//!
//! Given a batch of wordforms, writes them one per line to a temporary
//! input file, invokes the external binary with `MORPHLIB` pointing at its
//! data directory, and parses its stdout into `(wordform, Vec<Analysis>)`
//! pairs. The output grammar and feature-to-tag-slot mapping are grounded in
//! `postags_test.py`: see [`parse_analysis_block`] for the slot table and
//! the gerund/gerundive and gender-expansion special cases.
#![allow(dead_code)]
use std::{
    collections::HashMap,
    io::{Read, Write},
    path::PathBuf,
    process::{Command, Output, Stdio},
    time::{Duration, Instant},
};

use mcr_tag::{AccentedForm, PartOfSpeech, Slot, Tag, TagBuilder};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display("cruncher not found at {path:?}"))]
    BinaryNotFound { path: PathBuf },
    #[snafu(display("failed to write analyzer input file {path:?}"))]
    WriteInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to spawn analyzer {path:?}"))]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("analyzer exited with status {status}: {stderr}"))]
    NonZeroExit { status: i32, stderr: String },
    #[snafu(display("analyzer timed out after {timeout:?}"))]
    Timeout { timeout: Duration },
}

/// One morphological analysis of a wordform: its lemma, canonical tag, and
/// the (possibly vowel-length-marked) accented surface form. An analysis
/// with all three fields `None` marks a wordform the analyzer could not
/// recognize at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Analysis {
    pub lemma: Option<String>,
    pub tag: Option<Tag>,
    pub accented: Option<AccentedForm>,
}

impl Analysis {
    pub fn unknown() -> Self {
        Analysis {
            lemma: None,
            tag: None,
            accented: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.lemma.is_none() && self.tag.is_none() && self.accented.is_none()
    }
}

/// Where the external analyzer binary lives and how to invoke it.
#[derive(Clone, Debug)]
pub struct MorpheusConfig {
    pub binary_path: PathBuf,
    pub morphlib_dir: PathBuf,
    pub timeout: Duration,
}

/// Invokes the external analyzer and parses its output.
#[derive(Clone, Debug)]
pub struct MorpheusAdapter {
    config: MorpheusConfig,
}

impl MorpheusAdapter {
    pub fn new(config: MorpheusConfig) -> Self {
        MorpheusAdapter { config }
    }

    /// Analyzes every wordform in `wordforms`, returning one entry per
    /// input form (an empty `Vec` if the analyzer produced nothing for it).
    #[instrument(skip(self, wordforms))]
    pub fn analyze(&self, wordforms: &[String]) -> Result<HashMap<String, Vec<Analysis>>> {
        ensure!(
            self.config.binary_path.is_file(),
            BinaryNotFoundError {
                path: self.config.binary_path.clone(),
            }
        );

        let mut input = tempfile::NamedTempFile::new().context(WriteInputError {
            path: PathBuf::from("<tempfile>"),
        })?;
        for w in wordforms {
            writeln!(input, "{w}").context(WriteInputError {
                path: input.path().to_owned(),
            })?;
        }
        input.flush().context(WriteInputError {
            path: input.path().to_owned(),
        })?;

        let output = run_with_timeout(
            Command::new(&self.config.binary_path)
                .arg("-L")
                .arg("-d")
                .arg(input.path())
                .env("MORPHLIB", &self.config.morphlib_dir),
            self.config.timeout,
        )
        .context(SpawnError {
            path: self.config.binary_path.clone(),
        })?
        .context(TimeoutError {
            timeout: self.config.timeout,
        })?;

        ensure!(
            output.status.success(),
            NonZeroExitError {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_full_output(&stdout);
        debug!(words = parsed.len(), "parsed analyzer output");
        Ok(parsed)
    }
}

/// Spawns `command` with stdout/stderr piped and polls for exit, killing and
/// returning `Ok(None)` if `timeout` elapses first. `std::process::Output`
/// has no built-in deadline, so this drains the pipes on background threads
/// (to avoid deadlocking on a full pipe buffer) while the calling thread
/// polls `Child::try_wait` at a short interval.
fn run_with_timeout(command: &mut Command, timeout: Duration) -> std::io::Result<Option<Output>> {
    let mut child = command.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;

    let mut stdout_pipe = child.stdout.take().expect("stdout was piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        buf
    });
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if Instant::now() >= deadline {
            break None;
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    match status {
        Some(status) => {
            let stdout = stdout_reader.join().unwrap_or_default();
            let stderr = stderr_reader.join().unwrap_or_default();
            Ok(Some(Output { status, stdout, stderr }))
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Ok(None)
        }
    }
}

/// Splits the analyzer's full stdout into per-wordform analysis blocks.
///
/// A plain, non-`<NL>`-bearing line starts a new wordform; everything up to
/// the next such line is that wordform's raw analyses blob, handed to
/// [`parse_analysis_block`].
fn parse_full_output(stdout: &str) -> HashMap<String, Vec<Analysis>> {
    let mut out: HashMap<String, Vec<Analysis>> = HashMap::new();
    let mut current: Option<String> = None;
    let mut buf = String::new();

    let flush = |out: &mut HashMap<String, Vec<Analysis>>, word: Option<String>, buf: &str| {
        if let Some(word) = word {
            let analyses = parse_analysis_block(buf);
            out.entry(word).or_default().extend(analyses);
        }
    };

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.contains("<NL") {
            flush(&mut out, current.take(), &buf);
            buf.clear();
            current = Some(trimmed.to_owned());
            out.entry(trimmed.to_owned()).or_default();
        } else {
            buf.push_str(line);
            buf.push('\n');
        }
    }
    flush(&mut out, current.take(), &buf);
    out
}

/// Parses one wordform's raw analyses blob (the text between its header
/// line and the next), yielding zero or more [`Analysis`] per `<NL>` block.
fn parse_analysis_block(raw: &str) -> Vec<Analysis> {
    raw.replace("</NL>", "")
        .split("<NL>")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .flat_map(parse_analysis_line)
        .collect()
}

fn pos_for_prefix(prefix: &str) -> (PartOfSpeech, Option<char>) {
    use PartOfSpeech::*;
    match prefix {
        "V" => (Verb, None),
        "P" => (Verb, Some('p')), // participle: verbal, mood forced below
        "N" => (Noun, None),
        "ADJ" => (Adjective, None),
        "PRON" => (Pronoun, None),
        "ADV" => (Adverb, None),
        "CONJ" => (Conjunction, None),
        "PREP" => (Preposition, None),
        "INTERJ" => (Interjection, None),
        "NUM" => (Numeral, None),
        _ => (Unknown, None),
    }
}

/// `feat1 feat2 ...` code -> (slot, positional value). Unlisted codes
/// (including the literal word "participle", which the `P` prefix already
/// accounts for) are ignored without error, mirroring the original
/// analyzer's tolerant parser.
fn feat_map(code: &str) -> Option<(Slot, char)> {
    use Slot::*;
    Some(match code {
        "1st" => (Person, '1'),
        "2nd" => (Person, '2'),
        "3rd" => (Person, '3'),
        "sg" => (Number, 's'),
        "pl" => (Number, 'p'),
        "pres" => (Tense, 'p'),
        "impf" => (Tense, 'i'),
        "fut" => (Tense, 'f'),
        "perf" => (Tense, 'r'),
        "plup" => (Tense, 'l'),
        "futp" => (Tense, 't'),
        "ind" => (Mood, 'i'),
        "subj" => (Mood, 's'),
        "imperat" => (Mood, 'm'),
        "inf" => (Mood, 'n'),
        "gerundive" => (Mood, 'd'),
        "gerund" => (Mood, 'g'),
        "supine" => (Mood, 'u'),
        "act" => (Voice, 'a'),
        "pass" => (Voice, 'p'),
        "masc" => (Gender, 'm'),
        "fem" => (Gender, 'f'),
        "neut" => (Gender, 'n'),
        "nom" => (Case, 'n'),
        "voc" => (Case, 'v'),
        "acc" => (Case, 'a'),
        "gen" => (Case, 'g'),
        "dat" => (Case, 'd'),
        "abl" => (Case, 'b'),
        "loc" => (Case, 'l'),
        "pos" => (Degree, 'p'),
        "comp" => (Degree, 'c'),
        "sup" => (Degree, 's'),
        _ => return None,
    })
}

/// Parses a single analysis string (`POS accented,lemma feat1 feat2 ...`,
/// the field order confirmed against `postags_test.py`'s fixtures rather
/// than the literal prose order) into one or more [`Analysis`] values.
fn parse_analysis_line(line: &str) -> Vec<Analysis> {
    let mut tokens = line.split_whitespace();
    let Some(prefix) = tokens.next() else {
        return Vec::new();
    };
    let Some(fields) = tokens.next() else {
        return Vec::new();
    };
    let Some((accented, lemma)) = fields.split_once(',') else {
        return Vec::new();
    };

    let (pos, forced_mood) = pos_for_prefix(prefix);
    let mut base = TagBuilder::new();
    base.set(Slot::PartOfSpeech, pos.code());
    if let Some(mood) = forced_mood {
        base.set(Slot::Mood, mood);
    }

    let mut choice_sets: Vec<Vec<(Slot, char)>> = Vec::new();
    for tok in tokens {
        if tok.contains('/') {
            let choices: Vec<(Slot, char)> = tok.split('/').filter_map(feat_map).collect();
            if !choices.is_empty() {
                choice_sets.push(choices);
            }
        } else if let Some((slot, value)) = feat_map(tok) {
            base.set(slot, value);
        }
    }

    let mut builders = vec![base];
    for choices in choice_sets {
        let mut expanded = Vec::with_capacity(builders.len() * choices.len());
        for b in &builders {
            for &(slot, value) in &choices {
                let mut clone = b.clone();
                clone.set(slot, value);
                expanded.push(clone);
            }
        }
        builders = expanded;
    }

    let mut finalized = Vec::with_capacity(builders.len());
    for b in builders {
        let is_gerundive_to_expand = b.is_set(Slot::Mood)
            && b.get(Slot::Mood) == 'd'
            && b.is_set(Slot::Gender)
            && b.get(Slot::Gender) == 'n'
            && b.is_set(Slot::Number)
            && b.get(Slot::Number) == 's'
            && b.is_set(Slot::Case)
            && b.get(Slot::Case) != 'n';
        let extra_gerund = if is_gerundive_to_expand {
            let mut g = b.clone();
            g.set_with(Slot::Mood, 'g', true);
            Some(g)
        } else {
            None
        };

        if !b.is_set(Slot::Gender) && b.is_set(Slot::Case) {
            for gender in ['m', 'f', 'n'] {
                let mut gendered = b.clone();
                gendered.set(Slot::Gender, gender);
                finalized.push(gendered);
            }
        } else {
            finalized.push(b);
        }
        if let Some(g) = extra_gerund {
            finalized.push(g);
        }
    }

    finalized
        .into_iter()
        .map(|b| Analysis {
            lemma: Some(lemma.to_owned()),
            tag: Some(b.build()),
            accented: Some(AccentedForm::new(accented.to_owned())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_off_by_one_for_last_code() {
        let parses = parse_analysis_line("V amantur,amare pres ind pass 3rd pl");
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0].lemma.as_deref(), Some("amare"));
        assert_eq!(parses[0].accented.as_ref().unwrap().as_str(), "amantur");
        let tag = parses[0].tag.as_ref().unwrap();
        assert_eq!(tag.part_of_speech(), 'v');
        assert_eq!(tag.as_str().chars().nth(Slot::Tense.index()).unwrap(), 'p');
        assert_eq!(tag.as_str().chars().nth(Slot::Mood.index()).unwrap(), 'i');
        assert_eq!(tag.as_str().chars().nth(Slot::Voice.index()).unwrap(), 'p');
        assert_eq!(tag.as_str().chars().nth(Slot::Person.index()).unwrap(), '3');
        assert_eq!(tag.as_str().chars().nth(Slot::Number.index()).unwrap(), 'p');
    }

    #[test]
    fn participle_with_multiple_genders() {
        let parses = parse_analysis_line("P amans,amare pres act masc/fem/neut sg nom participle");
        assert_eq!(parses.len(), 3);
        let genders: std::collections::HashSet<char> =
            parses.iter().map(|p| p.tag.as_ref().unwrap().as_str().chars().nth(Slot::Gender.index()).unwrap()).collect();
        assert_eq!(genders, ['m', 'f', 'n'].into_iter().collect());
        for p in &parses {
            let tag = p.tag.as_ref().unwrap();
            assert_eq!(tag.part_of_speech(), 'v');
            assert_eq!(tag.as_str().chars().nth(Slot::Mood.index()).unwrap(), 'p');
            assert_eq!(tag.as_str().chars().nth(Slot::Tense.index()).unwrap(), 'p');
        }
    }

    #[test]
    fn genderless_noun_expands_to_three_genders() {
        let parses = parse_analysis_line("N felix,felicis nom sg adj3");
        assert_eq!(parses.len(), 3);
        let genders: std::collections::HashSet<char> = parses
            .iter()
            .map(|p| p.tag.as_ref().unwrap().as_str().chars().nth(Slot::Gender.index()).unwrap())
            .collect();
        assert_eq!(genders, ['m', 'f', 'n'].into_iter().collect());
    }

    #[test]
    fn genderless_without_case_is_not_expanded() {
        let parses = parse_analysis_line("N civis,civis sg adj3");
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0].tag.as_ref().unwrap().as_str().chars().nth(Slot::Gender.index()).unwrap(), '-');
    }

    #[test]
    fn neuter_gerundive_generates_additional_gerund_parse() {
        let parses =
            parse_analysis_line("<NL>V a^mandum,amo  gerundive neut acc sg                     conj1,are_vb"
                .trim_start_matches("<NL>"));
        assert_eq!(parses.len(), 2);
        let moods: std::collections::HashSet<char> = parses
            .iter()
            .map(|p| p.tag.as_ref().unwrap().as_str().chars().nth(Slot::Mood.index()).unwrap())
            .collect();
        assert_eq!(moods, ['d', 'g'].into_iter().collect());
    }

    #[test]
    fn nominative_gerundive_is_not_expanded() {
        let parses = parse_analysis_line("V amandum,amare gerundive neut nom sg");
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0].tag.as_ref().unwrap().as_str().chars().nth(Slot::Mood.index()).unwrap(), 'd');
    }

    #[test]
    fn standard_parse_is_unchanged() {
        let parses = parse_analysis_line("V amo,amare 1st sg pres ind act");
        assert_eq!(parses.len(), 1);
        assert_eq!(parses[0].lemma.as_deref(), Some("amare"));
        assert_eq!(parses[0].accented.as_ref().unwrap().as_str(), "amo");
    }

    #[test]
    fn multiple_slash_codes_multiply() {
        let parses = parse_analysis_line(
            "P amati,amare perf pass masc/fem/neut nom/voc pl participle",
        );
        assert_eq!(parses.len(), 6);
        let combos: std::collections::HashSet<(char, char)> = parses
            .iter()
            .map(|p| {
                let tag = p.tag.as_ref().unwrap();
                let chars: Vec<char> = tag.as_str().chars().collect();
                (chars[Slot::Gender.index()], chars[Slot::Case.index()])
            })
            .collect();
        assert_eq!(combos.len(), 6);
    }

    #[test]
    fn ignores_unmapped_feature_codes() {
        let parses = parse_analysis_line("V amo,amare 1st sg pres ind act some_unknown_feature");
        assert_eq!(parses.len(), 1);
    }

    #[test]
    fn conflicting_features_first_write_wins() {
        let parses = parse_analysis_line("V est,esse 3rd sg pres ind act 1st");
        assert_eq!(parses.len(), 1);
        let tag = parses[0].tag.as_ref().unwrap();
        assert_eq!(tag.as_str().chars().nth(Slot::Person.index()).unwrap(), '3');
    }

    #[test]
    fn slash_and_final_loop_interact() {
        let parses = parse_analysis_line("V amandi,amare gerundive masc/neut gen sg");
        assert_eq!(parses.len(), 3);
        let has_masc_gerundive = parses.iter().any(|p| {
            let t = p.tag.as_ref().unwrap().as_str();
            t.chars().nth(Slot::Gender.index()).unwrap() == 'm'
                && t.chars().nth(Slot::Mood.index()).unwrap() == 'd'
        });
        let has_neut_gerund = parses.iter().any(|p| {
            let t = p.tag.as_ref().unwrap().as_str();
            t.chars().nth(Slot::Gender.index()).unwrap() == 'n'
                && t.chars().nth(Slot::Mood.index()).unwrap() == 'g'
        });
        assert!(has_masc_gerundive);
        assert!(has_neut_gerund);
    }

    #[test]
    fn run_with_timeout_kills_and_reports_expiry_on_a_slow_command() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let result = run_with_timeout(&mut command, Duration::from_millis(50));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn run_with_timeout_returns_output_for_a_fast_command() {
        let mut command = Command::new("echo");
        command.arg("hi");
        let result = run_with_timeout(&mut command, Duration::from_secs(5)).unwrap();
        let output = result.expect("command finished before the deadline");
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hi");
    }

    #[test]
    fn full_output_splits_by_wordform_header() {
        let stdout = "sine\n<NL></NL>\namo\n<NL>V amo,amare 1st sg pres ind act</NL>\n";
        let parsed = parse_full_output(stdout);
        assert_eq!(parsed.get("sine").unwrap().len(), 0);
        assert_eq!(parsed.get("amo").unwrap().len(), 1);
    }
}
