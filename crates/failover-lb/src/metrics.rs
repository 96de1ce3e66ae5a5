use once_cell::sync::Lazy;
use prometheus::{IntCounter, Registry};

use crate::algorithms::Selection;

pub static SELECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| IntCounter::new("partition_selections_total", "Resources handed out by partition selectors").unwrap());
pub static RECENT_SELECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| IntCounter::new("partition_recent_selections_total", "Selections served in recency mode").unwrap());
pub static EMPTY_SELECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| IntCounter::new("partition_empty_selections_total", "Selections that found no resource with a positive score").unwrap());
pub static REPLACEMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| IntCounter::new("partition_replacements_total", "Partition slots replaced with a fresh resource").unwrap());
pub static REPLACEMENT_EXHAUSTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| IntCounter::new("partition_replacement_exhausted_total", "Replacements abandoned for lack of a spare resource").unwrap());

pub fn register(reg: &Registry) {
    reg.register(Box::new(SELECTIONS_TOTAL.clone())).ok();
    reg.register(Box::new(RECENT_SELECTIONS_TOTAL.clone())).ok();
    reg.register(Box::new(EMPTY_SELECTIONS_TOTAL.clone())).ok();
    reg.register(Box::new(REPLACEMENTS_TOTAL.clone())).ok();
    reg.register(Box::new(REPLACEMENT_EXHAUSTED_TOTAL.clone())).ok();
}

pub(crate) fn record_selection(selection: &Selection) {
    match selection {
        Selection::Recent(_) => {
            SELECTIONS_TOTAL.inc();
            RECENT_SELECTIONS_TOTAL.inc();
        }
        Selection::Weighted(_) => SELECTIONS_TOTAL.inc(),
        Selection::Exhausted => EMPTY_SELECTIONS_TOTAL.inc(),
    }
}
