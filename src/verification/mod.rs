/*!
 * Human-in-the-loop review of a finished translation.
 *
 * - `scanner`: finds defective blocks in overlapping windows
 * - `grouper`: clusters nearby issues for joint re-translation
 * - `gate`: per-job decision queue between reviewer and workflow
 * - `coordinator`: drives scan, re-translation, approval and reconciliation
 * - `issue`: issues, problem taxonomy and reviewer decisions
 */

pub use self::coordinator::{VerificationCoordinator, VerificationOptions, VerificationReport};
pub use self::gate::{ApprovalGate, ApprovalRound};
pub use self::grouper::group_issues;
pub use self::issue::{Decision, DecisionKind, Issue, IssueStatus, ProblemType};
pub use self::scanner::{IssueStream, ScanOptions, VerificationScanner};

pub mod coordinator;
pub mod gate;
pub mod grouper;
pub mod issue;
pub mod scanner;
