//! Spawns one process per pipeline stage and wires them together.
//!
//! Every descriptor is an [`OwnedFd`] (or a [`File`] for redirection
//! targets). The parent keeps a descriptor only until the stage it belongs
//! to has been forked; after that the value is dropped, which closes it.
//! Pipes are created close-on-exec so a child keeps nothing but its own
//! standard input and output across `exec`.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::error::{ExecError, StageError};
use crate::forward::forward;
use crate::pipeline::Pipeline;
use crate::redirection;
use crate::resolve::Invocation;

/// Child could not bind its standard input or output.
pub const EXIT_BIND_FAILED: i32 = 125;
/// Program exists but could not be executed.
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
/// Program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Spawning(usize),
    AllSpawned,
    Draining,
    Reaped,
    Done,
}

/// How a reaped stage terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Exited(i32),
    Signaled(Signal),
}

impl StageStatus {
    pub fn success(&self) -> bool {
        matches!(self, StageStatus::Exited(0))
    }
}

/// Something that went wrong with a single stage.
#[derive(Debug, Error)]
pub enum StageIssue {
    /// The stage was not launched; its input passes on to the next stage.
    #[error("skipped: {0}")]
    Skipped(#[source] StageError),
    /// The redirection target could not be opened; output went down the pipe.
    #[error("cannot open {}: {error}", file.display())]
    OpenFailed {
        file: PathBuf,
        #[source]
        error: io::Error,
    },
    /// `fork` failed; the next stage sees end-of-stream.
    #[error("fork failed: {0}")]
    SpawnFailed(#[source] Errno),
}

#[derive(Debug)]
pub struct StageRecord {
    pub index: usize,
    pub command: Option<String>,
    pub pid: Option<Pid>,
    pub status: Option<StageStatus>,
    pub issue: Option<StageIssue>,
}

/// Outcome of one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageRecord>,
    /// Bytes copied from the last stage to the interpreter's output.
    pub forwarded: u64,
}

impl PipelineReport {
    pub fn spawned(&self) -> usize {
        self.stages.iter().filter(|s| s.pid.is_some()).count()
    }

    pub fn reaped(&self) -> usize {
        self.stages.iter().filter(|s| s.status.is_some()).count()
    }

    pub fn statuses(&self) -> Vec<Option<StageStatus>> {
        self.stages.iter().map(|s| s.status).collect()
    }
}

enum StageInput {
    Inherit,
    Pipe(OwnedFd),
}

impl StageInput {
    fn raw_fd(&self) -> Option<RawFd> {
        match self {
            StageInput::Inherit => None,
            StageInput::Pipe(fd) => Some(fd.as_raw_fd()),
        }
    }
}

enum StageOutput {
    Pipe(OwnedFd),
    File(File),
}

impl StageOutput {
    fn raw_fd(&self) -> RawFd {
        match self {
            StageOutput::Pipe(fd) => fd.as_raw_fd(),
            StageOutput::File(file) => file.as_raw_fd(),
        }
    }
}

/// Runs `pipeline`, streaming the last stage's output into `out`.
///
/// All spawned children are reaped before this returns, whether or not the
/// run was aborted.
pub fn run<W: Write>(pipeline: &Pipeline, out: &mut W) -> Result<PipelineReport, ExecError> {
    let mut execution = Execution::new(pipeline.len());
    let result = execution
        .spawn_all(pipeline)
        .and_then(|tail| execution.drain(tail, out));
    execution.reap();
    result.map(|()| execution.finish())
}

struct Execution {
    phase: Phase,
    children: Vec<(usize, Pid)>,
    report: PipelineReport,
}

impl Execution {
    fn new(stages: usize) -> Self {
        Self {
            phase: Phase::Idle,
            children: Vec::with_capacity(stages),
            report: PipelineReport {
                stages: Vec::with_capacity(stages),
                forwarded: 0,
            },
        }
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "pipeline phase");
        self.phase = phase;
    }

    /// Launches every stage and returns the read end that carries the
    /// last launched stage's output, if any stage read from a pipe.
    fn spawn_all(&mut self, pipeline: &Pipeline) -> Result<Option<OwnedFd>, ExecError> {
        let mut input = StageInput::Inherit;

        for (index, stage) in pipeline.stages().iter().enumerate() {
            self.enter(Phase::Spawning(index));
            let mut record = StageRecord {
                index,
                command: stage.tokens().first().cloned(),
                pid: None,
                status: None,
                issue: None,
            };

            let prepared = redirection::resolve(stage)
                .and_then(|resolved| Ok((Invocation::prepare(&resolved.args)?, resolved)));
            let (invocation, resolved) = match prepared {
                Ok(p) => p,
                Err(e) => {
                    warn!(stage = index, "skipping stage: {}", e);
                    record.issue = Some(StageIssue::Skipped(e));
                    self.report.stages.push(record);
                    continue;
                }
            };
            record.command = Some(invocation.name.clone());

            let (next_read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
            let output = match resolved.redirect_stdout {
                Some(ref target) => match redirection::open_target(target) {
                    Ok(file) => {
                        // Nothing flows to the next stage.
                        drop(write);
                        StageOutput::File(file)
                    }
                    Err(error) => {
                        warn!(stage = index, file = %target.file.display(), "cannot open output file, piping instead: {}", error);
                        record.issue = Some(StageIssue::OpenFailed {
                            file: target.file.clone(),
                            error,
                        });
                        StageOutput::Pipe(write)
                    }
                },
                None => StageOutput::Pipe(write),
            };

            match spawn(&invocation, &input, &output) {
                Ok(pid) => {
                    debug!(stage = index, pid = pid.as_raw(), command = %invocation.name, "spawned");
                    record.pid = Some(pid);
                    self.children.push((index, pid));
                }
                Err(errno) => {
                    warn!(stage = index, command = %invocation.name, "fork failed: {}", errno);
                    record.issue = Some(StageIssue::SpawnFailed(errno));
                }
            }
            self.report.stages.push(record);

            // Parent copies of the handed-off ends close here.
            drop(output);
            input = StageInput::Pipe(next_read);
        }

        self.enter(Phase::AllSpawned);
        Ok(match input {
            StageInput::Inherit => None,
            StageInput::Pipe(fd) => Some(fd),
        })
    }

    fn drain<W: Write>(&mut self, tail: Option<OwnedFd>, out: &mut W) -> Result<(), ExecError> {
        self.enter(Phase::Draining);
        if let Some(fd) = tail {
            self.report.forwarded = forward(fd, out).map_err(ExecError::Forward)?;
        }
        Ok(())
    }

    fn reap(&mut self) {
        for (index, pid) in std::mem::take(&mut self.children) {
            match wait_for(pid) {
                Ok(status) => {
                    debug!(stage = index, pid = pid.as_raw(), ?status, "reaped");
                    self.report.stages[index].status = Some(status);
                }
                Err(errno) => warn!(stage = index, pid = pid.as_raw(), "wait failed: {}", errno),
            }
        }
        self.enter(Phase::Reaped);
    }

    fn finish(mut self) -> PipelineReport {
        self.enter(Phase::Done);
        self.report
    }
}

fn spawn(invocation: &Invocation, input: &StageInput, output: &StageOutput) -> nix::Result<Pid> {
    let stdin = input.raw_fd();
    let stdout = output.raw_fd();

    // SAFETY: the child never returns into the caller. It only rebinds its
    // stdio and then execs or `_exit`s, using data prepared before the fork.
    match unsafe { unistd::fork() }? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => exec_child(invocation, stdin, stdout),
    }
}

fn exec_child(invocation: &Invocation, stdin: Option<RawFd>, stdout: RawFd) -> ! {
    // The interpreter ignores SIGPIPE; the new image should not inherit that.
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    let bound = match stdin {
        Some(fd) => bind(fd, libc::STDIN_FILENO),
        None => Ok(()),
    }
    .and_then(|()| bind(stdout, libc::STDOUT_FILENO));
    if bound.is_err() {
        unsafe { libc::_exit(EXIT_BIND_FAILED) }
    }

    let Err(errno) = unistd::execvp(&invocation.program, invocation.argv.as_slice());
    let (msg, code) = if errno == Errno::ENOENT {
        (&invocation.not_found_msg, EXIT_NOT_FOUND)
    } else {
        (&invocation.exec_failed_msg, EXIT_CANNOT_EXECUTE)
    };
    let _ = unistd::write(io::stderr(), msg);
    // Exiting closes the write end, so readers downstream see end-of-stream.
    unsafe { libc::_exit(code) }
}

/// Makes `target` refer to `fd` and survive exec.
fn bind(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd == target {
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
    } else {
        unistd::dup2(fd, target)?;
    }
    Ok(())
}

fn wait_for(pid: Pid) -> nix::Result<StageStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(StageStatus::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(StageStatus::Signaled(signal)),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}
