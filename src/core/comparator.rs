use chrono::NaiveDate;

use crate::models::BestResult;

/// Whether `candidate` should replace `current_best`: true when nothing is
/// known yet or the candidate is strictly earlier on the calendar.
pub fn is_better(candidate: NaiveDate, current_best: Option<NaiveDate>) -> bool {
    match current_best {
        Some(best) => candidate < best,
        None => true,
    }
}

/// Earlier of two optional results; ties keep the first.
pub fn earliest(a: Option<BestResult>, b: Option<BestResult>) -> Option<BestResult> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if is_better(b.date, Some(a.date)) { b } else { a }),
        (a, b) => a.or(b),
    }
}
