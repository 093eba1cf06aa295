//! Per-target results of a commit.

use crate::{engine::NotDriverDriven, error::CommitError};

/// Why a target was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
	/// The agent reading this target does not run on a driver.
	NotDriverDriven(NotDriverDriven),

	/// The engine kind parsed, but its line is not written as `kind: <value>` verbatim.
	KindLineNotFound { line: String },
}

impl std::fmt::Display for SkipReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SkipReason::NotDriverDriven(reason) => reason.fmt(f),
			SkipReason::KindLineNotFound { line } => write!(f, "line {line:?} not found"),
		}
	}
}

#[derive(Debug)]
pub enum PatchOutcome {
	Applied,
	Skipped(SkipReason),
	Failed(CommitError),
}

impl PatchOutcome {
	pub fn is_applied(&self) -> bool {
		matches!(self, PatchOutcome::Applied)
	}

	pub fn is_skipped(&self) -> bool {
		matches!(self, PatchOutcome::Skipped(_))
	}

	pub fn is_failed(&self) -> bool {
		matches!(self, PatchOutcome::Failed(_))
	}
}

#[derive(Debug)]
pub struct TargetOutcome {
	/// Config file path or ConfigMap name.
	pub target: String,
	pub outcome: PatchOutcome,
}

/// Outcomes of one commit, in the order targets were evaluated.
///
/// A cluster batch stops at its first failure, so a report holds at most one
/// [`PatchOutcome::Failed`] entry and it is always the last one.
#[derive(Debug, Default)]
pub struct CommitReport {
	outcomes: Vec<TargetOutcome>,
}

impl CommitReport {
	pub fn push(&mut self, target: impl Into<String>, outcome: PatchOutcome) {
		self.outcomes.push(TargetOutcome {
			target: target.into(),
			outcome,
		});
	}

	pub fn outcomes(&self) -> &[TargetOutcome] {
		&self.outcomes
	}

	pub fn applied(&self) -> impl Iterator<Item = &str> {
		self.targets_where(PatchOutcome::is_applied)
	}

	pub fn skipped(&self) -> impl Iterator<Item = &str> {
		self.targets_where(PatchOutcome::is_skipped)
	}

	fn targets_where(&self, pred: fn(&PatchOutcome) -> bool) -> impl Iterator<Item = &str> {
		self.outcomes
			.iter()
			.filter(move |o| pred(&o.outcome))
			.map(|o| o.target.as_str())
	}

	/// Surface the first failed target as the commit error.
	pub fn into_result(self) -> Result<Self, CommitError> {
		let mut outcomes = Vec::with_capacity(self.outcomes.len());
		for entry in self.outcomes {
			if let PatchOutcome::Failed(err) = entry.outcome {
				return Err(err);
			}
			outcomes.push(entry);
		}
		Ok(Self { outcomes })
	}
}
