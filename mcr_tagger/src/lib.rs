//! Adapter for the external sequence tagger ("rft-annotate"): assigns one
//! fine-grained positional tag to each surface in an ordered word sequence.
#![allow(dead_code)]
use std::{
    io::{Read, Write},
    path::PathBuf,
    process::{Command, Output, Stdio},
    time::{Duration, Instant},
};

use mcr_tag::RawTag;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Error)))]
pub enum Error {
    #[snafu(display("rft-annotate not found at {path:?}"))]
    BinaryNotFound { path: PathBuf },
    #[snafu(display("failed to write tagger input file {path:?}"))]
    WriteInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to spawn rft-annotate {path:?}"))]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("rft-annotate exited with status {status}: {stderr}"))]
    NonZeroExit { status: i32, stderr: String },
    #[snafu(display("rft-annotate timed out after {timeout:?}"))]
    Timeout { timeout: Duration },
    #[snafu(display("failed to read tagger output file {path:?}"))]
    ReadOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "tagger returned {got} tag lines for {expected} input surfaces"
    ))]
    LineCountMismatch { got: usize, expected: usize },
    #[snafu(display("malformed tagger output line: {line:?}"))]
    MalformedLine { line: String },
    #[snafu(display("tagger emitted an invalid raw tag {tag:?}"))]
    InvalidTag {
        tag: String,
        source: mcr_tag::Error,
    },
}

#[derive(Clone, Debug)]
pub struct TaggerConfig {
    pub binary_path: PathBuf,
    pub model_path: PathBuf,
    pub timeout: Duration,
}

/// Invokes the external tagger and reads back one raw tag per input surface.
#[derive(Clone, Debug)]
pub struct TaggerAdapter {
    config: TaggerConfig,
}

impl TaggerAdapter {
    pub fn new(config: TaggerConfig) -> Self {
        TaggerAdapter { config }
    }

    /// Tags `surfaces` in order. The returned vector has exactly as many
    /// entries as `surfaces`, in the same order; enclitic-split prefixes
    /// and suffixes are presented (and returned) as their own entries.
    #[instrument(skip(self, surfaces))]
    pub fn tag(&self, surfaces: &[String]) -> Result<Vec<RawTag>> {
        ensure!(
            self.config.binary_path.is_file(),
            BinaryNotFoundError {
                path: self.config.binary_path.clone(),
            }
        );

        let mut infile = tempfile::NamedTempFile::new().context(WriteInputError {
            path: PathBuf::from("<tempfile>"),
        })?;
        for s in surfaces {
            writeln!(infile, "{s}").context(WriteInputError {
                path: infile.path().to_owned(),
            })?;
        }
        infile.flush().context(WriteInputError {
            path: infile.path().to_owned(),
        })?;

        let outfile = tempfile::NamedTempFile::new().context(WriteInputError {
            path: PathBuf::from("<tempfile>"),
        })?;

        let output = run_with_timeout(
            Command::new(&self.config.binary_path)
                .arg(&self.config.model_path)
                .arg(infile.path())
                .arg(outfile.path()),
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

        let contents = std::fs::read_to_string(outfile.path()).context(ReadOutputError {
            path: outfile.path().to_owned(),
        })?;
        let tags = parse_tagger_output(&contents)?;

        ensure!(
            tags.len() == surfaces.len(),
            LineCountMismatchError {
                got: tags.len(),
                expected: surfaces.len(),
            }
        );
        debug!(surfaces = surfaces.len(), "tagged word sequence");
        Ok(tags)
    }
}

/// Spawns `command` with stdout/stderr piped and polls for exit, killing and
/// returning `Ok(None)` if `timeout` elapses first. See the equivalent
/// helper in `mcr_morpheus` for the rationale (no native deadline on
/// `std::process::Output`, pipes drained on background threads so a full
/// buffer can't deadlock the poll loop).
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

fn parse_tagger_output(contents: &str) -> Result<Vec<RawTag>> {
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let (_surface, tag) = line.split_once('\t').context(MalformedLineError {
                line: line.to_owned(),
            })?;
            RawTag::new(tag).context(InvalidTagError {
                tag: tag.to_owned(),
            })
        })
        .collect()
}
