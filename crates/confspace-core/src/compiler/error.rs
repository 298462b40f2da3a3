use super::fixed_atoms::StaticsAlreadyAssigned;
use super::mols_params::ParamsMiss;
use super::pairs::PairOrderError;
use crate::core::compiled::CompiledConfSpace;
use crate::core::design::position::PlacementError;
use thiserror::Error;

/// A fatal compile failure.
///
/// Every variant carries enough identifiers for the design-space author to
/// locate the problem. The compile aborts on the first fatal error; no
/// partial artifact is ever produced alongside one.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Parameterization under forcefield '{forcefield}' failed for {context}: {message}")]
    Parameterize {
        forcefield: String,
        /// "molecule 'X'" or "molecule 'X', position 'P' fragment 'F'".
        context: String,
        message: String,
    },

    /// Claimants are named as "position:fragment". Parameters are a
    /// function of topology, so one fragment stands in for all of its
    /// conformations in the claim.
    #[error(
        "Atom {atom} is perturbed by two design positions: claimed by {first}, then by {second}"
    )]
    ClaimedAtom {
        /// The offending atom's display name.
        atom: String,
        /// The first claimant, as "position:fragment".
        first: String,
        /// The conflicting claimant, as "position:fragment".
        second: String,
    },

    #[error("Atom {atom} has a non-finite coordinate")]
    NonFiniteCoordinate { atom: String },

    #[error("Fragment placement failed: {0}")]
    Placement(#[from] PlacementError),

    #[error("Internal compiler error: {0}")]
    Internal(String),
}

// Cache and index misses are pipeline-ordering defects; they land in the
// report through the internal-error class rather than crashing the caller.

impl From<ParamsMiss> for CompileError {
    fn from(miss: ParamsMiss) -> Self {
        CompileError::Internal(miss.to_string())
    }
}

impl From<PairOrderError> for CompileError {
    fn from(order: PairOrderError) -> Self {
        CompileError::Internal(order.to_string())
    }
}

impl From<StaticsAlreadyAssigned> for CompileError {
    fn from(err: StaticsAlreadyAssigned) -> Self {
        CompileError::Internal(err.to_string())
    }
}

/// A non-fatal diagnostic accumulated alongside a compile.
///
/// No pipeline stage currently emits warnings; the list exists so that
/// diagnostics such as missing forcefield parameters have somewhere to land
/// without changing the report shape.
#[derive(Debug, Clone)]
pub struct CompileWarning {
    pub message: String,
}

/// The outcome of one compile invocation.
///
/// Success is exactly `error == None && compiled == Some`.
#[derive(Debug)]
pub struct Report {
    pub warnings: Vec<CompileWarning>,
    pub error: Option<CompileError>,
    pub compiled: Option<CompiledConfSpace>,
}

impl Report {
    pub fn succeeded(compiled: CompiledConfSpace, warnings: Vec<CompileWarning>) -> Self {
        Self {
            warnings,
            error: None,
            compiled: Some(compiled),
        }
    }

    pub fn failed(error: CompileError, warnings: Vec<CompileWarning>) -> Self {
        Self {
            warnings,
            error: Some(error),
            compiled: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.compiled.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_report_carries_no_artifact() {
        let report = Report::failed(CompileError::Internal("boom".to_string()), vec![]);
        assert!(!report.is_success());
        assert!(report.compiled.is_none());
        assert!(report.error.is_some());
    }

    #[test]
    fn claimed_atom_message_names_both_claimants() {
        let err = CompileError::ClaimedAtom {
            atom: "m/A7/CB".to_string(),
            first: "A7:LEU".to_string(),
            second: "A9:TRP".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("A7:LEU"));
        assert!(message.contains("A9:TRP"));
        assert!(message.contains("m/A7/CB"));
    }
}
