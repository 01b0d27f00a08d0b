mod collect;
mod guard;

pub use collect::{CollectListing, CollectOperations, CollectSummary, TransitionOutcome};
pub use guard::{TransitionGuard, TransitionPermit};
