//! Sequential and (optionally) multi-worker branch-and-bound search over any `Space`.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use scoped_threadpool::Pool;

use super::{BranchStrategy, Space, Statistics, Status, Stop};

/// Depth-first branch-and-bound: explores `root`'s subtree, keeping the best-keyed solved node
/// found within `stop`'s budget. `lower_bound()` is used to prune dominated subtrees.
pub fn solve<S, B>(root: &S, branch: &mut B, stop: &Stop) -> (Option<S>, Statistics)
where
    S: Space,
    B: BranchStrategy<S>,
{
    solve_bounded(root, branch, stop, None)
}

/// Like `solve`, but `seed_bound` (when given) acts as an initial incumbent key: only solved
/// nodes strictly better than it are kept, and it participates in `lower_bound` pruning the
/// same way a found incumbent would. This is how `constrain` (§4.5) narrows an LNS neighbor's
/// search without duplicating bound logic in the CBCTT model itself.
pub fn solve_bounded<S, B>(
    root: &S,
    branch: &mut B,
    stop: &Stop,
    seed_bound: Option<(i64, i64)>,
) -> (Option<S>, Statistics)
where
    S: Space,
    B: BranchStrategy<S>,
{
    let start = Instant::now();
    let mut stats = Statistics::default();
    let mut best: Option<((i64, i64), S)> = None;
    let mut stack: Vec<S> = vec![root.clone()];
    let mut iterations = 0u64;

    while let Some(mut node) = stack.pop() {
        iterations += 1;
        if stop.should_stop(iterations) {
            break;
        }

        let bound = best.as_ref().map(|(k, _)| *k).or(seed_bound);
        if let Some(bound) = bound {
            if node.lower_bound() >= bound {
                stats.bounded_branches += 1;
                continue;
            }
        }

        stats.nodes_explored += 1;

        match node.status() {
            Status::Failed => continue,
            Status::Solved => {
                stats.solutions_found += 1;
                let key = node.key();
                let bound = best.as_ref().map(|(k, _)| *k).or(seed_bound);
                let better = bound.map(|bk| key < bk).unwrap_or(true);
                if better {
                    best = Some((key, node));
                }
            }
            Status::Branch => {
                let (var, values) = branch.choose(&node);
                for value in values.into_iter().rev() {
                    let mut child = node.clone();
                    child.assign(var, value);
                    stack.push(child);
                }
            }
        }
    }

    stats.wall_time = start.elapsed();
    (best.map(|(_, space)| space), stats)
}

/// Splits the root's first branching decision across up to `workers` threads, each running an
/// independent sequential search over its slice of the first variable's candidate values. The
/// pool is joined before this function returns, so no worker outlives the call.
pub fn solve_parallel<S, F>(
    root: &S,
    make_branch: F,
    stop: &Stop,
    workers: u32,
) -> (Option<S>, Statistics)
where
    S: Space + Send,
    F: Fn(u64) -> Box<dyn BranchStrategy<S> + Send> + Sync,
{
    if workers <= 1 {
        let mut branch = make_branch(0);
        return solve(root, branch.as_mut(), stop);
    }

    let mut seed_branch = make_branch(0);
    let mut seed = root.clone();
    let status = seed.status();
    if status != Status::Branch {
        return solve(root, seed_branch.as_mut(), stop);
    }
    let (var, values) = seed_branch.choose(&seed);
    if values.is_empty() {
        return (None, Statistics::default());
    }

    let worker_count = (workers as usize).min(values.len());
    let mut slices: Vec<Vec<usize>> = vec![Vec::new(); worker_count];
    for (idx, value) in values.into_iter().enumerate() {
        slices[idx % worker_count].push(value);
    }

    let best: Arc<Mutex<Option<((i64, i64), S)>>> = Arc::new(Mutex::new(None));
    let stats = Arc::new(Mutex::new(Statistics::default()));
    let start = Instant::now();

    let mut pool = Pool::new(worker_count as u32);
    let make_branch_ref = &make_branch;
    pool.scoped(|scope| {
        for (worker_index, slice) in slices.into_iter().enumerate() {
            let root = root.clone();
            let var = var;
            let stop = *stop;
            let best = Arc::clone(&best);
            let stats = Arc::clone(&stats);
            let make_branch = make_branch_ref;
            scope.execute(move || {
                let mut branch = make_branch(worker_index as u64 + 1);
                for value in slice {
                    let mut child = root.clone();
                    child.assign(var, value);
                    let (found, local_stats) = solve(&child, branch.as_mut(), &stop);
                    stats.lock().unwrap().merge(&local_stats);
                    if let Some(found) = found {
                        let key = found.key();
                        let mut guard = best.lock().unwrap();
                        let better = guard.as_ref().map(|(bk, _)| key < *bk).unwrap_or(true);
                        if better {
                            *guard = Some((key, found));
                        }
                    }
                }
            });
        }
    });

    let mut final_stats = Arc::try_unwrap(stats)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();
    final_stats.wall_time = start.elapsed();
    let best = Arc::try_unwrap(best)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or(None);
    (best.map(|(_, space)| space), final_stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{DegreeMaxMin, Domain};

    /// A minimal space: `n` variables each in `0..=max`, feasible iff all equal; the key is
    /// `(assigned_count_remaining, sum_of_values)` so the search has something to optimize.
    #[derive(Clone)]
    struct ToySpace {
        domains: Vec<Domain>,
        size: usize,
    }

    impl ToySpace {
        fn new(n: usize, size: usize) -> Self {
            ToySpace {
                domains: vec![Domain::full(size); n],
                size,
            }
        }
    }

    impl Space for ToySpace {
        fn status(&mut self) -> Status {
            if self.domains.iter().any(|d| d.is_empty()) {
                return Status::Failed;
            }
            if self.domains.iter().all(|d| d.is_assigned()) {
                let values: Vec<usize> = self.domains.iter().map(|d| d.value().unwrap()).collect();
                if values.windows(2).all(|w| w[0] == w[1]) {
                    return Status::Solved;
                }
                return Status::Failed;
            }
            Status::Branch
        }

        fn unassigned(&self) -> Vec<usize> {
            (0..self.domains.len())
                .filter(|&i| !self.domains[i].is_assigned())
                .collect()
        }

        fn domain(&self, var: usize) -> &Domain {
            &self.domains[var]
        }

        fn degree(&self, _var: usize) -> u32 {
            0
        }

        fn assign(&mut self, var: usize, value: usize) {
            self.domains[var].assign(value);
        }

        fn exclude(&mut self, var: usize, value: usize) {
            self.domains[var].remove(value);
        }

        fn key(&self) -> (i64, i64) {
            let sum: i64 = self
                .domains
                .iter()
                .map(|d| d.value().unwrap_or(0) as i64)
                .sum();
            (0, sum)
        }
    }

    #[test]
    fn finds_the_all_equal_solution() {
        let root = ToySpace::new(3, 3);
        let mut branch = DegreeMaxMin;
        let (found, stats) = solve(&root, &mut branch, &Stop::iteration_cap(10_000));
        let found = found.expect("expected a solution");
        let values: Vec<usize> = found.domains.iter().map(|d| d.value().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] == w[1]));
        assert!(stats.solutions_found >= 1);
    }

    #[test]
    fn iteration_cap_eventually_stops_a_large_search() {
        let root = ToySpace::new(6, 6);
        let mut branch = DegreeMaxMin;
        let (_, stats) = solve(&root, &mut branch, &Stop::iteration_cap(5));
        assert!(stats.nodes_explored <= 5);
    }

    #[test]
    fn unused_size_field_is_consistent_with_domains() {
        let root = ToySpace::new(2, 4);
        assert_eq!(root.domains[0].len(), root.size);
    }
}
