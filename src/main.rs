mod config;
mod error;
mod executor;
mod forward;
mod pipeline;
mod redirection;
mod resolve;
mod shell;
mod tokenize;

use std::io;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Options;
use crate::shell::{Editor, Shell};

fn main() -> Result<()> {
    let options: Options = argh::from_env();
    init_tracing(options.log.as_deref());

    let shell = Shell::new(options.stage_order());
    let mut stdout = io::stdout();

    if let Some(line) = options.command.as_deref() {
        shell.execute_line(line, &mut stdout)?;
        return Ok(());
    }

    let mut editor = Editor::new().context("failed to initialise line editor")?;
    let completed = shell.run(&mut editor, &options.prompt, &mut stdout)?;
    tracing::debug!(completed, "end of input");
    Ok(())
}

fn init_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(d) => EnvFilter::new(d),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("osh=warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
