use std::io::Write;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, error};

use crate::error::ExecError;
use crate::executor::{self, PipelineReport};
use crate::pipeline::{Pipeline, StageOrder};
use crate::tokenize::tokenize;

/// Produces one line of input per call; `None` means end of input.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Interactive line source with history.
pub struct Editor {
    inner: DefaultEditor,
}

impl Editor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: DefaultEditor::new()?,
        })
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.inner.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.inner.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the current line only.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct Shell {
    order: StageOrder,
}

impl Shell {
    pub fn new(order: StageOrder) -> Self {
        Self { order }
    }

    /// Runs one input line. Blank lines yield `Ok(None)`.
    pub fn execute_line<W: Write>(
        &self,
        line: &str,
        out: &mut W,
    ) -> Result<Option<PipelineReport>, ExecError> {
        let Some(pipeline) = Pipeline::build(tokenize(line), self.order) else {
            return Ok(None);
        };
        executor::run(&pipeline, out).map(Some)
    }

    /// Reads and executes lines until `source` is exhausted. Returns the
    /// number of pipelines that ran to completion.
    pub fn run<S: LineSource, W: Write>(
        &self,
        source: &mut S,
        prompt: &str,
        out: &mut W,
    ) -> Result<usize> {
        let mut completed = 0;
        while let Some(line) = source.read_line(prompt)? {
            match self.execute_line(&line, out) {
                Ok(Some(report)) => {
                    completed += 1;
                    log_report(&report);
                }
                Ok(None) => {}
                Err(e) => error!("pipeline aborted: {}", e),
            }
        }
        Ok(completed)
    }
}

fn log_report(report: &PipelineReport) {
    let failed = report
        .stages
        .iter()
        .filter(|s| s.status.is_some_and(|status| !status.success()))
        .count();
    debug!(
        spawned = report.spawned(),
        reaped = report.reaped(),
        failed,
        forwarded = report.forwarded,
        statuses = ?report.statuses(),
        "pipeline finished"
    );
    for stage in &report.stages {
        if let Some(issue) = &stage.issue {
            debug!(stage = stage.index, command = ?stage.command, "{}", issue);
        }
    }
}
