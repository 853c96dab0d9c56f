//! A small, model-agnostic finite-domain CP engine: bitset domains, propagate-to-fixpoint
//! status, and an n-ary branch-and-bound search with pluggable branching. Nothing in this
//! module knows about courses, rooms or curricula — see `crate::model` for that.

pub mod domain;
pub mod search;

use std::time::{Duration, Instant};

pub use domain::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Solved,
    Failed,
    Branch,
}

/// The contract a CP search node must satisfy. A conforming implementation of this trait could
/// be swapped in for `crate::model::CbcttSpace` without touching the search engine.
pub trait Space: Clone {
    /// Propagates all posted constraints to a fixpoint and reports the resulting status.
    fn status(&mut self) -> Status;

    /// Indices of variables that do not yet have a singleton domain.
    fn unassigned(&self) -> Vec<usize>;

    fn domain(&self, var: usize) -> &Domain;

    /// A cheap, model-specific "how constrained is this variable" hint used by degree-based
    /// branching. Not required to be exact; only relative ordering matters.
    fn degree(&self, var: usize) -> u32;

    /// Narrows `var`'s domain to `{value}`. Propagation happens on the next `status()` call.
    fn assign(&mut self, var: usize, value: usize);

    /// Removes `value` from `var`'s domain, used to explore the complement of a branch.
    fn exclude(&mut self, var: usize, value: usize);

    /// The lexicographic comparison key for a solved node; lower is better.
    fn key(&self) -> (i64, i64);

    /// A monotone lower bound on `key()` reachable from this (possibly partial) node. Used to
    /// prune branches that cannot beat the current incumbent. The default never prunes.
    fn lower_bound(&self) -> (i64, i64) {
        (i64::MIN, i64::MIN)
    }
}

/// Chooses which variable to branch on next, and in what value order, given a space.
pub trait BranchStrategy<S: Space> {
    fn choose(&mut self, space: &S) -> (usize, Vec<usize>);
}

/// Degree-max variable selection, smallest-value-first: the exploitation strategy.
pub struct DegreeMaxMin;

impl<S: Space> BranchStrategy<S> for DegreeMaxMin {
    fn choose(&mut self, space: &S) -> (usize, Vec<usize>) {
        let var = space
            .unassigned()
            .into_iter()
            .max_by_key(|&v| space.degree(v))
            .expect("choose called with no unassigned variables");
        let mut values: Vec<usize> = space.domain(var).iter().collect();
        values.sort_unstable();
        (var, values)
    }
}

/// Uniformly random variable and value selection, seeded by an integer restart counter so
/// successive sub-searches are reproducibly distinct.
pub struct RandomRestart {
    rng: fastrand::Rng,
}

impl RandomRestart {
    pub fn new(restart: u64) -> Self {
        RandomRestart {
            rng: fastrand::Rng::with_seed(restart),
        }
    }
}

impl<S: Space> BranchStrategy<S> for RandomRestart {
    fn choose(&mut self, space: &S) -> (usize, Vec<usize>) {
        let unassigned = space.unassigned();
        let var = unassigned[self.rng.usize(..unassigned.len())];
        let mut values: Vec<usize> = space.domain(var).iter().collect();
        // Fisher-Yates shuffle using the same seeded generator, so the whole choice is
        // reproducible given the restart counter.
        for i in (1..values.len()).rev() {
            let j = self.rng.usize(..=i);
            values.swap(i, j);
        }
        (var, values)
    }
}

/// Either a wall-clock deadline or a hard iteration cap (the latter used by tests that need
/// determinism independent of machine speed).
#[derive(Debug, Clone, Copy)]
pub enum Stop {
    Deadline(Instant),
    IterationCap(u64),
}

impl Stop {
    pub fn after(duration: Duration) -> Self {
        Stop::Deadline(Instant::now() + duration)
    }

    pub fn iteration_cap(cap: u64) -> Self {
        Stop::IterationCap(cap)
    }

    pub(crate) fn should_stop(&self, iterations: u64) -> bool {
        match self {
            Stop::Deadline(deadline) => Instant::now() >= *deadline,
            Stop::IterationCap(cap) => iterations >= *cap,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub nodes_explored: u64,
    pub solutions_found: u64,
    pub bounded_branches: u64,
    pub wall_time: Duration,
}

impl Statistics {
    pub fn merge(&mut self, other: &Statistics) {
        self.nodes_explored += other.nodes_explored;
        self.solutions_found += other.solutions_found;
        self.bounded_branches += other.bounded_branches;
        self.wall_time += other.wall_time;
    }
}
