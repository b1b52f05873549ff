//! Different-extension duplicate conflicts.
//!
//! Conflicts are collected over the whole batch before dispatch and each is
//! resolved to a binding [`ConflictChoice`], either by policy or by asking
//! the user. A "for all remaining" answer sticks for the rest of the batch.

use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A source whose proxies directory already holds a proxy with another extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConflict {
    pub source: PathBuf,
    /// The valid proxy already present.
    pub existing: PathBuf,
    /// The proxy this run would create.
    pub expected: PathBuf,
}

/// Binding outcome of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictChoice {
    /// Create the new proxy alongside the existing one.
    Duplicate,
    Skip,
}

/// One answer at the conflict prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    Yes,
    Skip,
    YesAll,
    SkipAll,
}

impl PromptAnswer {
    /// Accepts `y`/`yes`, `s`/`skip`, `ya`/`yes-all`, `sa`/`skip-all`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(PromptAnswer::Yes),
            "s" | "skip" => Some(PromptAnswer::Skip),
            "ya" | "yes-all" => Some(PromptAnswer::YesAll),
            "sa" | "skip-all" => Some(PromptAnswer::SkipAll),
            _ => None,
        }
    }

    pub fn choice(&self) -> ConflictChoice {
        match self {
            PromptAnswer::Yes | PromptAnswer::YesAll => ConflictChoice::Duplicate,
            PromptAnswer::Skip | PromptAnswer::SkipAll => ConflictChoice::Skip,
        }
    }

    /// Applies to every remaining conflict.
    pub fn is_sticky(&self) -> bool {
        matches!(self, PromptAnswer::YesAll | PromptAnswer::SkipAll)
    }
}

/// Source of user answers.
pub trait ConflictPrompter: Send {
    /// Returns `None` when input is exhausted.
    fn ask(&mut self, conflict: &PendingConflict) -> Option<PromptAnswer>;
}

/// Line-oriented prompter; re-prompts on invalid input.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn write_prompt(&mut self, conflict: &PendingConflict) -> io::Result<()> {
        let name = |p: &Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        writeln!(self.output)?;
        writeln!(
            self.output,
            "Proxy with a different extension exists for {}",
            name(&conflict.source)
        )?;
        writeln!(self.output, "  Existing: {}", name(&conflict.existing))?;
        writeln!(self.output, "  New:      {}", name(&conflict.expected))?;
        write!(
            self.output,
            "Create duplicate? [y]es / [s]kip / [ya] yes-all / [sa] skip-all: "
        )?;
        self.output.flush()
    }
}

impl LinePrompter<BufReader<Stdin>, Stdout> {
    /// Prompter reading stdin and writing stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead + Send, W: Write + Send> ConflictPrompter for LinePrompter<R, W> {
    fn ask(&mut self, conflict: &PendingConflict) -> Option<PromptAnswer> {
        loop {
            if self.write_prompt(conflict).is_err() {
                return None;
            }
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            if let Some(answer) = PromptAnswer::parse(&line) {
                return Some(answer);
            }
            let _ = writeln!(self.output, "Invalid choice: {}", line.trim());
        }
    }
}

/// Decisions made before dispatch, keyed by source path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictDecisions {
    choices: HashMap<PathBuf, ConflictChoice>,
}

impl ConflictDecisions {
    pub fn get(&self, source: &Path) -> Option<ConflictChoice> {
        self.choices.get(source).copied()
    }

    pub fn insert(&mut self, source: PathBuf, choice: ConflictChoice) {
        self.choices.insert(source, choice);
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

/// Resolves conflicts by policy, a sticky answer or the prompter.
pub struct ConflictResolver {
    auto_skip: bool,
    sticky: Option<ConflictChoice>,
    prompter: Option<Box<dyn ConflictPrompter>>,
}

impl ConflictResolver {
    /// Resolver that never prompts.
    pub fn policy(auto_skip: bool) -> Self {
        Self {
            auto_skip,
            sticky: None,
            prompter: None,
        }
    }

    pub fn interactive(auto_skip: bool, prompter: Box<dyn ConflictPrompter>) -> Self {
        Self {
            auto_skip,
            sticky: None,
            prompter: Some(prompter),
        }
    }

    pub fn can_prompt(&self) -> bool {
        self.prompter.is_some()
    }

    /// Outcome when nobody can be asked. An earlier yes-all / skip-all
    /// answer still applies.
    pub fn policy_default(&self) -> ConflictChoice {
        if self.auto_skip {
            ConflictChoice::Skip
        } else {
            self.sticky.unwrap_or(ConflictChoice::Duplicate)
        }
    }

    /// Resolves one conflict.
    pub fn decide(&mut self, conflict: &PendingConflict) -> ConflictChoice {
        if self.auto_skip {
            return ConflictChoice::Skip;
        }
        if let Some(choice) = self.sticky {
            return choice;
        }
        let Some(prompter) = self.prompter.as_mut() else {
            return self.policy_default();
        };

        match prompter.ask(conflict) {
            Some(answer) => {
                if answer.is_sticky() {
                    self.sticky = Some(answer.choice());
                }
                answer.choice()
            }
            None => {
                debug!("conflict input exhausted, skipping remaining conflicts");
                self.sticky = Some(ConflictChoice::Skip);
                ConflictChoice::Skip
            }
        }
    }

    /// Resolves every conflict in order.
    pub fn resolve_all(&mut self, conflicts: &[PendingConflict]) -> ConflictDecisions {
        let mut decisions = ConflictDecisions::default();
        for conflict in conflicts {
            let choice = self.decide(conflict);
            info!(
                source = %conflict.source.display(),
                existing = %conflict.existing.display(),
                ?choice,
                "resolved duplicate proxy conflict"
            );
            decisions.insert(conflict.source.clone(), choice);
        }
        decisions
    }
}
