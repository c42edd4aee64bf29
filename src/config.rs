use argh::FromArgs;

use crate::pipeline::StageOrder;

pub const DEFAULT_PROMPT: &str = "osh> ";

/// A minimal interactive pipeline interpreter.
#[derive(FromArgs, Debug)]
pub struct Options {
    /// prompt printed before each line
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    pub prompt: String,

    /// run `a | b` as `b` feeding `a` (legacy stage order)
    #[argh(switch)]
    pub reverse_pipes: bool,

    /// tracing filter directive, e.g. `osh=debug` (defaults to RUST_LOG)
    #[argh(option)]
    pub log: Option<String>,

    /// execute a single line and exit
    #[argh(option, short = 'c')]
    pub command: Option<String>,
}

impl Options {
    pub fn stage_order(&self) -> StageOrder {
        if self.reverse_pipes {
            StageOrder::Reversed
        } else {
            StageOrder::Natural
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        Options::from_args(&["osh"], args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = parse(&[]);
        assert_eq!(options.prompt, DEFAULT_PROMPT);
        assert_eq!(options.stage_order(), StageOrder::Natural);
        assert!(options.log.is_none());
        assert!(options.command.is_none());
    }

    #[test]
    fn test_flags() {
        let options = parse(&["--reverse-pipes", "--prompt", "$ ", "-c", "echo hi"]);
        assert_eq!(options.stage_order(), StageOrder::Reversed);
        assert_eq!(options.prompt, "$ ");
        assert_eq!(options.command.as_deref(), Some("echo hi"));
    }
}
