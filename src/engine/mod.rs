//! engine
//!
//! Transaction coordination and remote synchronization.
//!
//! # Architecture
//!
//! The engine owns the repository handle. Nothing else mutates the working
//! tree; the store expresses every operation as a unit of work and hands it
//! to the [`TransactionCoordinator`]:
//!
//! ```text
//! lock -> stash -> [pull] -> unit of work -> [commit] -> [push + notify] -> unlock
//! ```
//!
//! - [`coordinator`]: the single transactional entry point
//! - [`sync`]: fetch, reconcile and push versions against the remote
//! - [`merge`]: pluggable resolution of diverged versions
//! - [`notify`]: fan-out of "the store changed" events
//! - [`scheduler`]: background pulls on a timer or signal
//! - [`ledger`]: bounded log of finished transactions
//!
//! # Invariants
//!
//! - At most one transaction runs per working tree at a time, across threads
//!   and processes
//! - Versions are the local branches minus the integration branch and
//!   transient branches
//! - Pull and push are best-effort: their failures are logged, never raised

pub mod context;
pub mod coordinator;
pub mod ledger;
pub mod merge;
pub mod notify;
pub mod scheduler;
pub mod sync;

pub use context::{is_reserved_branch, TransactionContext, WorkTree};
pub use coordinator::{TransactionCoordinator, TransactionError};
pub use ledger::{Outcome, TransactionLedger, TransactionRecord};
pub use merge::{ConflictResolution, RemoteWins, Resolution};
pub use notify::{ChangeListener, ChangeNotifier};
pub use scheduler::{PullScheduler, RemoteChangeSignal, SchedulerHandle};
pub use sync::{PullOutcome, PushOutcome, SyncEngine, SyncSettings, SyncStatus};
