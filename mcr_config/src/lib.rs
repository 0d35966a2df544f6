//! Loads the INI-style configuration described in spec.md §6: the two
//! required external-tool directories, plus the lexicon database and
//! `macrons.txt` paths, which are resolved relative to the working
//! directory when given as relative paths.
#![allow(dead_code)]
use std::path::{Path, PathBuf};

use snafu::{OptionExt, ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display("failed to read config file {path:?}"))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to parse config file {path:?} as INI: {reason}"))]
    Parse { path: PathBuf, reason: String },
    #[snafu(display("missing required config key {section}.{key}"))]
    MissingKey { section: String, key: String },
    #[snafu(display("failed to determine the current working directory"))]
    WorkingDir { source: std::io::Error },
}

const DEFAULT_LEXICON_DB: &str = "macronizer.db";
const DEFAULT_MACRONS_FILE: &str = "macrons.txt";
const DEFAULT_ENDINGS_FILE: &str = "endings.tsv";
const DEFAULT_LEMMA_PRIORS_FILE: &str = "lemma_priors.tsv";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub rftagger_dir: PathBuf,
    pub morpheus_dir: PathBuf,
    pub lexicon_db_path: PathBuf,
    pub macrons_path: PathBuf,
    pub endings_path: PathBuf,
    pub lemma_priors_path: PathBuf,
}

impl Config {
    /// Loads configuration from an INI file at `path`, resolving
    /// `lexicon_db_path`/`macrons_path` against `cwd` when given relative.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).context(ReadError { path })?;
        let cwd = std::env::current_dir().context(WorkingDirError)?;
        Self::parse(&contents, path, &cwd)
    }

    fn parse(contents: &str, path: &Path, cwd: &Path) -> Result<Self> {
        let sections = ini::macro_safe_read(contents).map_err(|reason| {
            ParseError {
                path: path.to_owned(),
                reason,
            }
            .build()
        })?;
        let paths = sections.get("paths");

        let get = |key: &str| -> Result<String> {
            paths
                .and_then(|s| s.get(key))
                .and_then(|v| v.as_deref())
                .map(str::to_owned)
                .context(MissingKeyError {
                    section: "paths",
                    key,
                })
        };

        let rftagger_dir = PathBuf::from(get("rftagger_dir")?);
        let morpheus_dir = PathBuf::from(get("morpheus_dir")?);

        let lexicon_db = paths
            .and_then(|s| s.get("lexicon_db"))
            .and_then(|v| v.as_deref())
            .unwrap_or(DEFAULT_LEXICON_DB);
        let macrons_file = paths
            .and_then(|s| s.get("macrons_file"))
            .and_then(|v| v.as_deref())
            .unwrap_or(DEFAULT_MACRONS_FILE);

        let data = sections.get("data");
        let endings_file = data
            .and_then(|s| s.get("endings"))
            .and_then(|v| v.as_deref())
            .unwrap_or(DEFAULT_ENDINGS_FILE);
        let lemma_priors_file = data
            .and_then(|s| s.get("lemma_priors"))
            .and_then(|v| v.as_deref())
            .unwrap_or(DEFAULT_LEMMA_PRIORS_FILE);

        Ok(Config {
            rftagger_dir,
            morpheus_dir,
            lexicon_db_path: resolve(cwd, lexicon_db),
            macrons_path: resolve(cwd, macrons_file),
            endings_path: resolve(cwd, endings_file),
            lemma_priors_path: resolve(cwd, lemma_priors_file),
        })
    }
}

fn resolve(cwd: &Path, maybe_relative: &str) -> PathBuf {
    let p = Path::new(maybe_relative);
    if p.is_absolute() {
        p.to_owned()
    } else {
        cwd.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_required_keys_and_defaults_db_paths_relative_to_cwd() {
        let cwd = Path::new("/work/dir");
        let ini = "[paths]\nrftagger_dir = /opt/rftagger\nmorpheus_dir = /opt/morpheus\n";
        let config = Config::parse(ini, Path::new("config.ini"), cwd).unwrap();
        assert_eq!(config.rftagger_dir, PathBuf::from("/opt/rftagger"));
        assert_eq!(config.morpheus_dir, PathBuf::from("/opt/morpheus"));
        assert_eq!(config.lexicon_db_path, PathBuf::from("/work/dir/macronizer.db"));
        assert_eq!(config.macrons_path, PathBuf::from("/work/dir/macrons.txt"));
        assert_eq!(config.endings_path, PathBuf::from("/work/dir/endings.tsv"));
        assert_eq!(
            config.lemma_priors_path,
            PathBuf::from("/work/dir/lemma_priors.tsv")
        );
    }

    #[test]
    fn explicit_data_section_paths_are_resolved_against_cwd() {
        let cwd = Path::new("/work/dir");
        let ini = "[paths]\nrftagger_dir = /opt/rftagger\nmorpheus_dir = /opt/morpheus\n\
                   [data]\nendings = tables/endings.tsv\nlemma_priors = /etc/priors.tsv\n";
        let config = Config::parse(ini, Path::new("config.ini"), cwd).unwrap();
        assert_eq!(
            config.endings_path,
            PathBuf::from("/work/dir/tables/endings.tsv")
        );
        assert_eq!(config.lemma_priors_path, PathBuf::from("/etc/priors.tsv"));
    }

    #[test]
    fn explicit_relative_db_paths_are_resolved_against_cwd() {
        let cwd = Path::new("/work/dir");
        let ini = "[paths]\nrftagger_dir = /opt/rftagger\nmorpheus_dir = /opt/morpheus\nlexicon_db = data/lexicon.db\n";
        let config = Config::parse(ini, Path::new("config.ini"), cwd).unwrap();
        assert_eq!(
            config.lexicon_db_path,
            PathBuf::from("/work/dir/data/lexicon.db")
        );
    }

    #[test]
    fn absolute_db_path_is_kept_as_is() {
        let cwd = Path::new("/work/dir");
        let ini = "[paths]\nrftagger_dir = /opt/rftagger\nmorpheus_dir = /opt/morpheus\nmacrons_file = /etc/macrons.txt\n";
        let config = Config::parse(ini, Path::new("config.ini"), cwd).unwrap();
        assert_eq!(config.macrons_path, PathBuf::from("/etc/macrons.txt"));
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let cwd = Path::new("/work/dir");
        let ini = "[paths]\nrftagger_dir = /opt/rftagger\n";
        let err = Config::parse(ini, Path::new("config.ini"), cwd).unwrap_err();
        assert!(matches!(err, Error::MissingKey { .. }));
    }

    #[test]
    fn load_reads_a_real_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("macronizer.ini");
        std::fs::write(
            &config_path,
            "[paths]\nrftagger_dir = /opt/rftagger\nmorpheus_dir = /opt/morpheus\n",
        )
        .unwrap();
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.rftagger_dir, PathBuf::from("/opt/rftagger"));
    }
}
