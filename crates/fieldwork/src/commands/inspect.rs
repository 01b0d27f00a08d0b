use fieldwork_core::CollectId;
use fieldwork_operations::operations::CollectOperations;

use crate::error::Result;
use crate::output::{CollectFormatter, PlainTextCollectFormatter};

pub(crate) fn status(ops: &CollectOperations, collect: CollectId) -> Result<()> {
    let summary = ops.status(collect)?;
    print!("{}", PlainTextCollectFormatter.format_summary(&summary));
    Ok(())
}

pub(crate) fn list(ops: &CollectOperations) -> Result<()> {
    let listing = ops.list()?;
    print!("{}", PlainTextCollectFormatter.format_listing(&listing));
    Ok(())
}
