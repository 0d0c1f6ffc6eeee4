//! Fan-out helpers for per-participant rounds
//!
//! Every helper returns only after all items are processed, so a call is a
//! round barrier. Results keep the input order, which makes the reported
//! error deterministic when several participants fail in one round.

use crate::Result;

#[cfg(feature = "multi-thread")]
use rayon::prelude::*;

/// Run `op` on every item and return the first error in item order
pub(crate) fn try_for_each_mut<T, F>(items: &mut [T], op: F) -> Result<()>
where
    T: Send,
    F: Fn(&mut T) -> Result<()> + Sync + Send,
{
    #[cfg(feature = "multi-thread")]
    let results: Vec<Result<()>> = items.par_iter_mut().map(op).collect();
    #[cfg(not(feature = "multi-thread"))]
    let results: Vec<Result<()>> = items.iter_mut().map(op).collect();

    results.into_iter().collect()
}

/// Map every item, failing with the first error in item order
pub(crate) fn try_map<T, U, F>(items: &[T], op: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Result<U> + Sync + Send,
{
    #[cfg(feature = "multi-thread")]
    let results: Vec<Result<U>> = items.par_iter().map(op).collect();
    #[cfg(not(feature = "multi-thread"))]
    let results: Vec<Result<U>> = items.iter().map(op).collect();

    results.into_iter().collect()
}

pub(crate) fn map<T, U, F>(items: &[T], op: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    #[cfg(feature = "multi-thread")]
    let mapped: Vec<U> = items.par_iter().map(op).collect();
    #[cfg(not(feature = "multi-thread"))]
    let mapped: Vec<U> = items.iter().map(op).collect();

    mapped
}

pub(crate) fn filter_map<T, U, F>(items: &[T], op: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Option<U> + Sync + Send,
{
    #[cfg(feature = "multi-thread")]
    let found: Vec<U> = items.par_iter().filter_map(op).collect();
    #[cfg(not(feature = "multi-thread"))]
    let found: Vec<U> = items.iter().filter_map(op).collect();

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_first_error_in_order() {
        let mut items: Vec<usize> = (1..=8).collect();
        let result = try_for_each_mut(&mut items, |item| {
            *item *= 10;
            if *item % 30 == 0 {
                Err(Error::Internal(item.to_string()))
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(Error::Internal("30".into())));
        // the barrier still lets every item finish
        assert_eq!(items[7], 80);
    }

    #[test]
    fn test_map_and_filter_keep_order() {
        let items: Vec<usize> = (0..100).collect();
        let doubled = try_map(&items, |v| Ok(v * 2)).unwrap();
        assert_eq!(doubled[42], 84);

        let squared = map(&items, |v| v * v);
        assert_eq!(squared[..4], [0, 1, 4, 9]);

        let odd = filter_map(&items, |v| (v % 2 == 1).then_some(*v));
        assert_eq!(odd.len(), 50);
        assert_eq!(odd[0], 1);
        assert_eq!(odd[49], 99);
    }
}
