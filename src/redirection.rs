use std::fs::File;
use std::io;
use std::path::PathBuf;

use crate::error::StageError;
use crate::pipeline::Stage;

/// Marker that sends a stage's output to the file named before it.
///
/// The syntax is `FILE < command args...`. Despite the glyph this is an
/// *output* redirection; the marker is only recognised as the second token.
pub const OUTPUT_MARKER: &str = "<";

/// Represents an output redirection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub file: PathBuf,
}

/// A stage's effective argument vector plus its optional redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStage {
    pub args: Vec<String>,
    pub redirect_stdout: Option<Redirection>,
}

/// Derives the effective command line of `stage`.
///
/// If the second token is [`OUTPUT_MARKER`], the first token becomes the
/// redirection target and both are dropped from the argument vector.
pub fn resolve(stage: &Stage) -> Result<ResolvedStage, StageError> {
    if stage.is_empty() {
        return Err(StageError::Empty);
    }
    let tokens = stage.tokens();

    match tokens {
        [file, marker, rest @ ..] if marker == OUTPUT_MARKER => {
            if rest.is_empty() {
                return Err(StageError::MissingCommand(file.clone()));
            }
            Ok(ResolvedStage {
                args: rest.to_vec(),
                redirect_stdout: Some(Redirection {
                    file: PathBuf::from(file),
                }),
            })
        }
        _ => Ok(ResolvedStage {
            args: tokens.to_vec(),
            redirect_stdout: None,
        }),
    }
}

/// Creates or truncates the redirection target for writing.
pub fn open_target(redirection: &Redirection) -> Result<File, io::Error> {
    File::create(&redirection.file)
}
