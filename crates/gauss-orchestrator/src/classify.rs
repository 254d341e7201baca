//! Classification of remote command output.
//!
//! The openGauss tools report success mostly through free text on stdout. The
//! markers each kind of command is judged by live in one declarative
//! [`MarkerTable`]; callers only see the [`OutputClassifier`] interface.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::exec::RemoteCommandResult;

/// The kinds of remote command the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandKind {
    /// `gs_initdb` of a member data directory.
    InitializeMember,
    /// Start of the primary of a multi-member cluster.
    StartPrimary,
    /// Start of a standalone node.
    StartSingle,
    /// Full rebuild of a replica from the primary.
    StartReplicaBuild,
    /// Stop of a member.
    StopMember,
    /// Configuration file edits.
    GenericConfig,
    /// A `gsql` statement.
    Sql,
    /// Read-only inspection whose output is interpreted by the caller.
    Probe,
}

impl CommandKind {
    /// Returns the name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitializeMember => "initialize-member",
            Self::StartPrimary => "start-primary",
            Self::StartSingle => "start-single",
            Self::StartReplicaBuild => "start-replica-build",
            Self::StopMember => "stop-member",
            Self::GenericConfig => "generic-config",
            Self::Sql => "sql",
            Self::Probe => "probe",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The command did what it was asked to.
    Success,
    /// The command failed.
    Failure(String),
}

impl Verdict {
    /// Returns true on success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Maps command output to a verdict.
pub trait OutputClassifier: Send + Sync {
    /// Classifies the output of a command of `kind`.
    fn classify(&self, kind: CommandKind, result: &RemoteCommandResult) -> Verdict;
}

/// A text marker searched in joined stdout.
#[derive(Debug, Clone)]
pub enum Marker {
    /// Plain substring.
    Contains(&'static str),
    /// Regular expression.
    Pattern(Regex),
}

impl Marker {
    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(needle) => text.contains(needle),
            Self::Pattern(re) => re.is_match(text),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Contains(needle) => format!("{:?}", needle),
            Self::Pattern(re) => format!("/{}/", re.as_str()),
        }
    }
}

/// How the exit status takes part in classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// The exit status is not consulted.
    Ignore,
    /// A reported non-zero status fails; a missing status passes.
    NonZeroFails,
    /// The status must be reported and zero.
    RequireZero,
}

/// Classification rule of one command kind.
///
/// Evaluation order: exit policy, then failure markers, then success markers.
/// An empty success list accepts any output.
#[derive(Debug, Clone)]
pub struct MarkerRule {
    /// Any of these markers means success.
    pub success_any: Vec<Marker>,
    /// Any of these markers means failure, whatever else is present.
    pub failure_any: Vec<Marker>,
    /// Exit status handling.
    pub exit: ExitPolicy,
}

impl MarkerRule {
    /// A rule that accepts any output.
    pub fn accept_all() -> Self {
        Self {
            success_any: Vec::new(),
            failure_any: Vec::new(),
            exit: ExitPolicy::Ignore,
        }
    }

    fn evaluate(&self, result: &RemoteCommandResult) -> Verdict {
        match (self.exit, result.exit_status) {
            (ExitPolicy::NonZeroFails, Some(code)) | (ExitPolicy::RequireZero, Some(code))
                if code != 0 =>
            {
                return Verdict::Failure(format!("exit status {}", code));
            }
            (ExitPolicy::RequireZero, None) => {
                return Verdict::Failure("no exit status reported".to_string());
            }
            _ => {}
        }

        let text = result.stdout_text();
        if let Some(marker) = self.failure_any.iter().find(|m| m.matches(&text)) {
            return Verdict::Failure(format!("output contains failure marker {}", marker.describe()));
        }
        if !self.success_any.is_empty() && !self.success_any.iter().any(|m| m.matches(&text)) {
            let expected: Vec<String> = self.success_any.iter().map(Marker::describe).collect();
            return Verdict::Failure(format!(
                "output contains none of {}",
                expected.join(", ")
            ));
        }
        Verdict::Success
    }
}

/// Declarative command-kind to marker-rule table.
#[derive(Debug, Clone)]
pub struct MarkerTable {
    rules: HashMap<CommandKind, MarkerRule>,
}

impl MarkerTable {
    /// The markers the openGauss tools are known to print.
    pub fn standard() -> Self {
        let started = || MarkerRule {
            success_any: vec![
                Marker::Contains("server started"),
                Marker::Contains("another server"),
            ],
            failure_any: Vec::new(),
            exit: ExitPolicy::Ignore,
        };

        let mut rules = HashMap::new();
        rules.insert(
            CommandKind::InitializeMember,
            MarkerRule {
                success_any: vec![Marker::Contains("Success")],
                failure_any: Regex::new("error|Error")
                    .ok()
                    .map(Marker::Pattern)
                    .into_iter()
                    .collect(),
                exit: ExitPolicy::Ignore,
            },
        );
        rules.insert(CommandKind::StartPrimary, started());
        rules.insert(CommandKind::StartSingle, started());
        rules.insert(CommandKind::StartReplicaBuild, started());
        rules.insert(
            CommandKind::StopMember,
            MarkerRule {
                success_any: vec![Marker::Contains("server stopped")],
                failure_any: Vec::new(),
                exit: ExitPolicy::Ignore,
            },
        );
        rules.insert(
            CommandKind::GenericConfig,
            MarkerRule {
                success_any: Vec::new(),
                failure_any: Vec::new(),
                exit: ExitPolicy::NonZeroFails,
            },
        );
        rules.insert(
            CommandKind::Sql,
            MarkerRule {
                success_any: Vec::new(),
                failure_any: vec![Marker::Contains("ERROR")],
                exit: ExitPolicy::RequireZero,
            },
        );
        rules.insert(CommandKind::Probe, MarkerRule::accept_all());

        Self { rules }
    }

    /// Replaces or adds the rule of `kind`.
    pub fn with_rule(mut self, kind: CommandKind, rule: MarkerRule) -> Self {
        self.rules.insert(kind, rule);
        self
    }

    /// Returns the rule of `kind`.
    pub fn rule(&self, kind: CommandKind) -> Option<&MarkerRule> {
        self.rules.get(&kind)
    }
}

impl Default for MarkerTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl OutputClassifier for MarkerTable {
    fn classify(&self, kind: CommandKind, result: &RemoteCommandResult) -> Verdict {
        match self.rules.get(&kind) {
            Some(rule) => rule.evaluate(result),
            None => Verdict::Failure(format!("no classification rule for {}", kind)),
        }
    }
}
