mod collect;
mod transition;

pub(crate) use collect::{CollectFormatter, PlainTextCollectFormatter};
pub(crate) use transition::{PlainTextTransitionFormatter, TransitionFormatter};
