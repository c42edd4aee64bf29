/// Token that separates stages.
pub const PIPE: &str = "|";

/// Order in which the stages of a line are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageOrder {
    /// `a | b` runs `a` and feeds its output to `b`.
    #[default]
    Natural,
    /// Legacy ordering: `a | b` runs `b` and feeds its output to `a`.
    Reversed,
}

/// One command and its arguments.
///
/// The tokens are never rewritten; redirection produces a separate
/// effective argument vector (see [`crate::redirection::resolve`]).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stage {
    tokens: Vec<String>,
}

impl Stage {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// A stage produced by adjacent, leading or trailing pipe symbols.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// The ordered chain of stages built from one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Partitions `tokens` on [`PIPE`] and arranges the stages in `order`.
    ///
    /// Returns `None` for an empty token list: there is nothing to execute.
    /// Empty stages are kept so the executor can report and skip them.
    pub fn build(tokens: Vec<String>, order: StageOrder) -> Option<Self> {
        if tokens.is_empty() {
            return None;
        }

        let mut stages = Vec::new();
        let mut current = Vec::new();
        for token in tokens {
            if token == PIPE {
                stages.push(Stage::new(std::mem::take(&mut current)));
            } else {
                current.push(token);
            }
        }
        stages.push(Stage::new(current));

        if order == StageOrder::Reversed {
            stages.reverse();
        }

        Some(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }
}
