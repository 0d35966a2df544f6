//! The persistent lexicon: a single SQLite-backed table mapping wordforms
//! to their morphological analyses, backfilled from the external analyzer
//! on first sight of an unrecognized form.
#![allow(dead_code)]
mod schema;

use std::path::Path;

use diesel::{prelude::*, sqlite::SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use mcr_morpheus::{Analysis, MorpheusAdapter};
use mcr_tag::{AccentedForm, Tag};
use schema::morpheus;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};

type Result<T, E = Error> = std::result::Result<T, E>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Marks the row recording that `macrons.txt` has already been imported.
const SEEDED_MARKER: &str = "\0seeded";

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display("failed to open lexicon database at {path:?}"))]
    Connect {
        path: std::path::PathBuf,
        source: diesel::ConnectionError,
    },
    #[snafu(display("failed to run lexicon migrations"))]
    Migrate {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[snafu(display("lexicon query failed"))]
    Query { source: diesel::result::Error },
    #[snafu(display("failed to read macron seed file {path:?}"))]
    SeedRead {
        path: std::path::PathBuf,
        source: csv::Error,
    },
    #[snafu(display("malformed row in macron seed file {path:?}: {row:?}"))]
    SeedMalformed {
        path: std::path::PathBuf,
        row: csv::StringRecord,
    },
    #[snafu(display("morpheus adapter failed during lexicon backfill"))]
    Analyzer { source: mcr_morpheus::Error },
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = morpheus)]
struct MorphemeRow {
    id: i32,
    wordform: String,
    morphtag: Option<String>,
    lemma: Option<String>,
    accented: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = morpheus)]
struct NewMorphemeRow<'a> {
    wordform: &'a str,
    morphtag: Option<&'a str>,
    lemma: Option<&'a str>,
    accented: Option<&'a str>,
}

impl MorphemeRow {
    fn is_unknown(&self) -> bool {
        self.morphtag.is_none() && self.lemma.is_none() && self.accented.is_none()
    }

    fn into_analysis(self) -> Analysis {
        Analysis {
            lemma: self.lemma,
            tag: self
                .morphtag
                .map(|s| Tag::new(s).expect("lexicon never stores a malformed tag")),
            accented: self.accented.map(AccentedForm::new),
        }
    }
}

/// The lexicon store: a single SQLite connection plus the embedded-schema
/// invariant that unknown and non-unknown rows for a wordform never coexist.
pub struct LexiconStore {
    conn: SqliteConnection,
}

impl LexiconStore {
    #[instrument]
    pub fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let path_ref = path.as_ref();
        let mut conn = SqliteConnection::establish(&path_ref.to_string_lossy()).context(
            ConnectError {
                path: path_ref.to_owned(),
            },
        )?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|source| Error::Migrate { source })?;
        Ok(LexiconStore { conn })
    }

    /// Ensures every wordform in `wordforms` has at least one row, invoking
    /// the analyzer adapter for any that are entirely missing.
    #[instrument(skip(self, adapter))]
    pub fn load_words(&mut self, wordforms: &[String], adapter: &MorpheusAdapter) -> Result<()> {
        let missing: Vec<String> = wordforms
            .iter()
            .filter(|w| !self.has_any_row(w).unwrap_or(false))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let analyzed = adapter.analyze(&missing).context(AnalyzerError)?;
        for wordform in &missing {
            let analyses = analyzed.get(wordform).cloned().unwrap_or_default();
            self.insert_analyses(wordform, &analyses)?;
        }
        Ok(())
    }

    /// All analyses on file for the lowercased wordform.
    #[instrument(skip(self))]
    pub fn lookup(&mut self, wordform: &str) -> Result<Vec<Analysis>> {
        let rows: Vec<MorphemeRow> = morpheus::table
            .filter(morpheus::wordform.eq(wordform.to_lowercase()))
            .select(MorphemeRow::as_select())
            .load(&mut self.conn)
            .context(QueryError)?;
        Ok(rows
            .into_iter()
            .filter(|r| !r.is_unknown())
            .map(MorphemeRow::into_analysis)
            .collect())
    }

    fn has_any_row(&mut self, wordform: &str) -> Result<bool> {
        let count: i64 = morpheus::table
            .filter(morpheus::wordform.eq(wordform.to_lowercase()))
            .count()
            .get_result(&mut self.conn)
            .context(QueryError)?;
        Ok(count > 0)
    }

    /// Inserts `analyses` for `wordform`, preserving the invariant that an
    /// unknown row and real analyses never coexist: a real analysis removes
    /// any existing unknown row first, and an unknown row is only inserted
    /// if none exists yet.
    fn insert_analyses(&mut self, wordform: &str, analyses: &[Analysis]) -> Result<()> {
        let wordform = wordform.to_lowercase();
        let real: Vec<&Analysis> = analyses.iter().filter(|a| !a.is_unknown()).collect();

        if real.is_empty() {
            if !self.has_any_row(&wordform)? {
                diesel::insert_into(morpheus::table)
                    .values(NewMorphemeRow {
                        wordform: &wordform,
                        morphtag: None,
                        lemma: None,
                        accented: None,
                    })
                    .execute(&mut self.conn)
                    .context(QueryError)?;
            }
            return Ok(());
        }

        diesel::delete(
            morpheus::table
                .filter(morpheus::wordform.eq(&wordform))
                .filter(morpheus::morphtag.is_null()),
        )
        .execute(&mut self.conn)
        .context(QueryError)?;

        for analysis in real {
            let tag_str = analysis.tag.as_ref().map(Tag::as_str);
            let accented_str = analysis.accented.as_ref().map(AccentedForm::as_str);
            diesel::insert_into(morpheus::table)
                .values(NewMorphemeRow {
                    wordform: &wordform,
                    morphtag: tag_str,
                    lemma: analysis.lemma.as_deref(),
                    accented: accented_str,
                })
                .execute(&mut self.conn)
                .context(QueryError)?;
        }
        debug!(wordform = %wordform, rows = analyses.len(), "inserted analyses");
        Ok(())
    }

    /// Imports the static `macrons.txt` seed, a no-op if already imported.
    pub fn import_macrons(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.has_any_row(SEEDED_MARKER)? {
            debug!("macron seed already imported, skipping");
            return Ok(());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .from_path(path)
            .context(SeedReadError {
                path: path.to_owned(),
            })?;

        for rec in rdr.records() {
            let rec = rec.context(SeedReadError {
                path: path.to_owned(),
            })?;
            let malformed = || SeedMalformedError {
                path: path.to_owned(),
                row: rec.clone(),
            };
            let wordform = rec.get(0).with_context(malformed)?;
            let tag = rec.get(1).with_context(malformed)?;
            let lemma = rec.get(2).with_context(malformed)?;
            let accented = rec.get(3).with_context(malformed)?;

            diesel::insert_into(morpheus::table)
                .values(NewMorphemeRow {
                    wordform: &wordform.to_lowercase(),
                    morphtag: Some(tag),
                    lemma: Some(lemma),
                    accented: Some(accented),
                })
                .execute(&mut self.conn)
                .context(QueryError)?;
        }

        diesel::insert_into(morpheus::table)
            .values(NewMorphemeRow {
                wordform: SEEDED_MARKER,
                morphtag: None,
                lemma: None,
                accented: None,
            })
            .execute(&mut self.conn)
            .context(QueryError)?;
        Ok(())
    }
}
