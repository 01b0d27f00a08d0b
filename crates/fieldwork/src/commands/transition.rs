use fieldwork_core::{CollectId, CollectStatus, NewCollect};
use fieldwork_operations::operations::{CollectOperations, TransitionOutcome};

use crate::error::Result;
use crate::output::{PlainTextTransitionFormatter, TransitionFormatter};

fn print_outcome(outcome: &TransitionOutcome) {
    print!("{}", PlainTextTransitionFormatter.format_outcome(outcome));
}

pub(crate) fn start(ops: &CollectOperations, commune: String, suffix: String) -> Result<()> {
    let outcome = ops.start(NewCollect { commune, suffix })?;
    print_outcome(&outcome);
    Ok(())
}

pub(crate) fn end(ops: &CollectOperations, collect: CollectId) -> Result<()> {
    print_outcome(&ops.end(collect)?);
    Ok(())
}

pub(crate) fn finalize(ops: &CollectOperations, collect: CollectId) -> Result<()> {
    print_outcome(&ops.finalize(collect)?);
    Ok(())
}

pub(crate) fn reopen(ops: &CollectOperations, collect: CollectId) -> Result<()> {
    print_outcome(&ops.reopen(collect)?);
    Ok(())
}

pub(crate) fn upgrade(ops: &CollectOperations, collect: CollectId) -> Result<()> {
    print_outcome(&ops.upgrade(collect)?);
    Ok(())
}

pub(crate) fn downgrade(ops: &CollectOperations, collect: CollectId) -> Result<()> {
    print_outcome(&ops.downgrade(collect)?);
    Ok(())
}

pub(crate) fn transform(
    ops: &CollectOperations,
    collect: CollectId,
    status: CollectStatus,
) -> Result<()> {
    let outcomes = ops.transform_to(collect, status)?;
    if outcomes.is_empty() {
        println!("Collect {collect} is already {status}.");
    }
    for outcome in &outcomes {
        print_outcome(outcome);
    }
    Ok(())
}
