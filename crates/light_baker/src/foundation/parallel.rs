//! Flat data-parallel loops over texels and probes
//!
//! Passes split their elements into at most `num_tasks` contiguous ranges and hand
//! them to the rayon pool. A task count of zero means "one per worker thread".

use rayon::prelude::*;

fn min_range_len(count: usize, num_tasks: usize) -> usize {
    let num_tasks = if num_tasks == 0 { rayon::current_num_threads() } else { num_tasks };
    count.div_ceil(num_tasks.max(1)).max(1)
}

/// Compute one value per element index in parallel, preserving order
pub fn parallel_map<T, F>(count: usize, num_tasks: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..count)
        .into_par_iter()
        .with_min_len(min_range_len(count, num_tasks))
        .map(f)
        .collect()
}

/// Visit every element of a mutable slice in parallel together with its index
pub fn parallel_for_each<T, F>(items: &mut [T], num_tasks: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    let range_len = min_range_len(items.len(), num_tasks);
    items
        .par_chunks_mut(range_len)
        .enumerate()
        .for_each(|(range_index, range)| {
            let from = range_index * range_len;
            for (offset, item) in range.iter_mut().enumerate() {
                f(from + offset, item);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_map_preserves_order() {
        let values = parallel_map(1000, 7, |index| index * 2);
        assert_eq!(values.len(), 1000);
        assert!(values.iter().enumerate().all(|(index, value)| *value == index * 2));
    }

    #[test]
    fn test_parallel_for_each_visits_every_index() {
        let mut values = vec![0usize; 333];
        parallel_for_each(&mut values, 0, |index, value| *value = index + 1);
        assert!(values.iter().enumerate().all(|(index, value)| *value == index + 1));
    }

    #[test]
    fn test_empty_input() {
        let values: Vec<u32> = parallel_map(0, 4, |_| 1);
        assert!(values.is_empty());
        let mut empty: Vec<u32> = Vec::new();
        parallel_for_each(&mut empty, 4, |_, _| {});
    }
}
