//! The CBCTT decision model built on top of the generic CP engine: the `roomslot` variable,
//! its derived quantities, the hard-constraint propagators, and the soft-cost accounting.

use std::collections::HashSet;
use std::sync::Arc;

use crate::costs::{CostBreakdown, CostComponent};
use crate::cp::{Domain, Space, Status};
use crate::instance::{CourseId, Instance, LectureId, RoomId};

/// `roomslot[l] = period(l) * rooms + room(l)`; period/room/day/timeslot are derived by
/// division and modulus rather than propagated as separate variables (see DESIGN.md).
#[derive(Clone)]
pub struct CbcttSpace {
    instance: Arc<Instance>,
    roomslot: Vec<Domain>,
    /// Set by `post_hard_constraints`: once true, distinctness and conflict-exclusion are
    /// enforced as propagators rather than left as soft penalties.
    hard_exclusion: bool,
}

impl CbcttSpace {
    pub fn new(instance: Arc<Instance>) -> Self {
        let rooms = instance.num_rooms();
        let num_values = rooms * instance.periods() as usize;
        let mut roomslot = vec![Domain::full(num_values); instance.num_lectures()];

        for l in 0..instance.num_lectures() {
            let lecture = LectureId::from_index(l);
            let course = instance.lecture_of(lecture).course;
            for period in 0..instance.periods() {
                if !instance.available(course, period) {
                    for room in 0..rooms {
                        roomslot[l].remove(period as usize * rooms + room);
                    }
                }
            }
        }

        CbcttSpace {
            instance,
            roomslot,
            hard_exclusion: false,
        }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn post_hard_constraints(&mut self) {
        self.hard_exclusion = true;
    }

    pub fn hard_exclusion_posted(&self) -> bool {
        self.hard_exclusion
    }

    pub fn num_variables(&self) -> usize {
        self.roomslot.len()
    }

    pub fn variable_domain(&self, l: LectureId) -> &Domain {
        &self.roomslot[l.raw_index()]
    }

    pub fn pin(&mut self, l: LectureId, value: u32) {
        self.roomslot[l.raw_index()].assign(value as usize);
    }

    fn period_of(&self, value: usize) -> u32 {
        (value / self.instance.num_rooms()) as u32
    }

    /// Bound-consistency tightening for `period[l1] < period[l2]`, the intra-course ordering
    /// constraint. Returns whether either domain changed.
    fn tighten_order(&mut self, l1: usize, l2: usize) -> bool {
        let mut changed = false;

        let max_period_2 = self.roomslot[l2].iter().map(|v| self.period_of(v)).max();
        if let Some(max2) = max_period_2 {
            let to_remove: Vec<usize> = self.roomslot[l1]
                .iter()
                .filter(|&v| self.period_of(v) >= max2)
                .collect();
            for v in to_remove {
                self.roomslot[l1].remove(v);
                changed = true;
            }
        }

        let min_period_1 = self.roomslot[l1].iter().map(|v| self.period_of(v)).min();
        if let Some(min1) = min_period_1 {
            let to_remove: Vec<usize> = self.roomslot[l2]
                .iter()
                .filter(|&v| self.period_of(v) <= min1)
                .collect();
            for v in to_remove {
                self.roomslot[l2].remove(v);
                changed = true;
            }
        }

        changed
    }

    fn propagate_ordering(&mut self) -> bool {
        let mut changed = false;
        for idx in 0..self.instance.courses.len() {
            let course = CourseId::from_index(idx);
            let lectures: Vec<usize> = self
                .instance
                .lectures_of(course)
                .map(|l| l.raw_index())
                .collect();
            for i in 0..lectures.len() {
                for j in (i + 1)..lectures.len() {
                    changed |= self.tighten_order(lectures[i], lectures[j]);
                }
            }
        }
        changed
    }

    /// Only active once `post_hard_constraints` has been called: propagates pairwise
    /// distinctness and conflict-exclusion from every currently-assigned lecture.
    fn propagate_hard(&mut self) -> bool {
        if !self.hard_exclusion {
            return false;
        }
        let n = self.roomslot.len();
        let singles: Vec<(usize, usize)> = (0..n)
            .filter_map(|i| self.roomslot[i].value().map(|v| (i, v)))
            .collect();

        let mut changed = false;
        let rooms = self.instance.num_rooms();
        for &(li, v) in &singles {
            let course_i = self.instance.lecture_of(LectureId::from_index(li)).course;
            let period_v = self.period_of(v);
            for lj in 0..n {
                if lj == li || self.roomslot[lj].is_assigned() {
                    continue;
                }
                if self.roomslot[lj].contains(v) {
                    self.roomslot[lj].remove(v);
                    changed = true;
                }
                let course_j = self.instance.lecture_of(LectureId::from_index(lj)).course;
                if course_j != course_i && self.instance.conflict(course_i, course_j) {
                    for room in 0..rooms {
                        let val = period_v as usize * rooms + room;
                        if self.roomslot[lj].contains(val) {
                            self.roomslot[lj].remove(val);
                            changed = true;
                        }
                    }
                }
            }
        }
        changed
    }

    /// Removes, from `l`'s domain, every roomslot value within `period` that a lecture from a
    /// course conflicting with `l`'s course currently occupies in `reference`. Used by the
    /// violation-directed relaxation to force resolution of a specific conflict; unlike
    /// `propagate_hard` this runs independent of `post_hard_constraints`.
    pub fn exclude_conflicting_occupants_in_period(
        &mut self,
        l: LectureId,
        period: u32,
        reference: &SolvedSnapshot,
    ) -> bool {
        let li = l.raw_index();
        let course_i = self.instance.lecture_of(l).course;
        let rooms = self.instance.num_rooms();
        let mut changed = false;
        for lj in 0..reference.roomslot.len() {
            if lj == li {
                continue;
            }
            let course_j = self.instance.lecture_of(LectureId::from_index(lj)).course;
            if course_j == course_i || !self.instance.conflict(course_i, course_j) {
                continue;
            }
            let value_j = reference.roomslot[lj];
            if self.period_of(value_j) != period {
                continue;
            }
            if self.roomslot[li].contains(value_j) {
                self.roomslot[li].remove(value_j);
                changed = true;
            }
        }
        changed
    }

    fn any_domain_empty(&self) -> bool {
        self.roomslot.iter().any(|d| d.is_empty())
    }

    /// Valid only once every `roomslot` variable is singleton (`status() == Status::Solved`).
    pub fn snapshot(&self) -> SolvedSnapshot {
        let values: Vec<usize> = self
            .roomslot
            .iter()
            .map(|d| d.value().expect("snapshot called on an unsolved space"))
            .collect();
        SolvedSnapshot::compute(&self.instance, &values)
    }
}

impl Space for CbcttSpace {
    fn status(&mut self) -> Status {
        loop {
            if self.any_domain_empty() {
                return Status::Failed;
            }
            let mut changed = self.propagate_ordering();
            changed |= self.propagate_hard();
            if self.any_domain_empty() {
                return Status::Failed;
            }
            if !changed {
                break;
            }
        }

        if self.roomslot.iter().all(|d| d.is_assigned()) {
            Status::Solved
        } else {
            Status::Branch
        }
    }

    fn unassigned(&self) -> Vec<usize> {
        (0..self.roomslot.len())
            .filter(|&i| !self.roomslot[i].is_assigned())
            .collect()
    }

    fn domain(&self, var: usize) -> &Domain {
        &self.roomslot[var]
    }

    fn degree(&self, var: usize) -> u32 {
        let course = self
            .instance
            .lecture_of(LectureId::from_index(var))
            .course;
        let mut degree = 0u32;
        for other in self.instance.lectures_of(course) {
            if other.raw_index() != var && !self.roomslot[other.raw_index()].is_assigned() {
                degree += 1;
            }
        }
        for conflicting in self.instance.conflicting_courses(course) {
            for other in self.instance.lectures_of(conflicting) {
                if !self.roomslot[other.raw_index()].is_assigned() {
                    degree += 1;
                }
            }
        }
        degree
    }

    fn assign(&mut self, var: usize, value: usize) {
        self.roomslot[var].assign(value);
    }

    fn exclude(&mut self, var: usize, value: usize) {
        self.roomslot[var].remove(value);
    }

    fn key(&self) -> (i64, i64) {
        let snapshot = self.snapshot();
        let violations = (self.roomslot.len() as i64) - snapshot.duplicates as i64 + snapshot.conflicts;
        (violations, snapshot.costs.z())
    }

    fn lower_bound(&self) -> (i64, i64) {
        // Assigned-so-far lectures can only add to conflicts/cost, never remove from them, so
        // the partial count over assigned variables is a valid lower bound.
        let assigned: Vec<usize> = (0..self.roomslot.len())
            .filter_map(|i| self.roomslot[i].value())
            .collect();
        if assigned.len() != self.roomslot.len() {
            // A cheap, conservative bound: zero violations, zero cost, always admissible.
            return (i64::MIN, i64::MIN);
        }
        self.key()
    }
}

/// A fully-assigned CBCTT state: every derived quantity and cost term from §3, computed once.
#[derive(Debug, Clone)]
pub struct SolvedSnapshot {
    pub roomslot: Vec<usize>,
    pub duplicates: usize,
    pub conflicting_lectures: Vec<i64>,
    pub conflicts: i64,
    pub room_capacity_deviation: Vec<i64>,
    pub room_stability_deviation: Vec<i64>,
    pub minimum_working_days_deviation: Vec<i64>,
    pub curriculum_compactness_deviation: Vec<i64>,
    /// `true` marks a lecture isolated (no same-curriculum neighbor in an adjacent period).
    pub lecture_compactness: Vec<bool>,
    pub costs: CostBreakdown,
}

impl SolvedSnapshot {
    fn compute(instance: &Instance, values: &[usize]) -> SolvedSnapshot {
        let rooms = instance.num_rooms();
        let period_of = |v: usize| (v / rooms) as u32;
        let room_of = |v: usize| v % rooms;

        let distinct: HashSet<usize> = values.iter().copied().collect();
        let duplicates = distinct.len();

        let mut conflicting_lectures = vec![0i64; values.len()];
        for i in 0..values.len() {
            let course_i = instance.lecture_of(LectureId::from_index(i)).course;
            let period_i = period_of(values[i]);
            for j in 0..values.len() {
                if i == j {
                    continue;
                }
                let course_j = instance.lecture_of(LectureId::from_index(j)).course;
                if course_i != course_j
                    && instance.conflict(course_i, course_j)
                    && period_of(values[j]) == period_i
                {
                    conflicting_lectures[i] += 1;
                }
            }
        }
        let conflicts: i64 = conflicting_lectures.iter().sum::<i64>() / 2;

        let mut room_capacity_deviation = vec![0i64; values.len()];
        let mut capacity_cost = 0i64;
        for (l, &v) in values.iter().enumerate() {
            let course = instance.lecture_of(LectureId::from_index(l)).course;
            let room = instance.room(RoomId::from_index(room_of(v)));
            let students = instance.course(course).students as i64;
            let deficit = students - room.capacity as i64;
            let deviation = deficit.max(0);
            room_capacity_deviation[l] = deviation;
            capacity_cost += deviation;
        }

        let mut room_stability_deviation = vec![0i64; instance.courses.len()];
        let mut stability_cost = 0i64;
        for (idx, _course) in instance.courses.iter().enumerate() {
            let course_id = CourseId::from_index(idx);
            let rooms_used: HashSet<usize> = instance
                .lectures_of(course_id)
                .map(|l| room_of(values[l.raw_index()]))
                .collect();
            let deviation = (rooms_used.len() as i64 - 1).max(0);
            room_stability_deviation[idx] = deviation;
            stability_cost += deviation;
        }

        let mut minimum_working_days_deviation = vec![0i64; instance.courses.len()];
        let mut min_days_cost = 0i64;
        for (idx, course) in instance.courses.iter().enumerate() {
            let course_id = CourseId::from_index(idx);
            let days_used: HashSet<u16> = instance
                .lectures_of(course_id)
                .map(|l| instance.day_of(period_of(values[l.raw_index()])))
                .collect();
            let deviation = (course.min_working_days as i64 - days_used.len() as i64).max(0);
            minimum_working_days_deviation[idx] = deviation;
            min_days_cost += deviation;
        }

        let mut curriculum_compactness_deviation = vec![0i64; instance.curricula.len()];
        let mut lecture_compactness = vec![false; values.len()];
        let mut compactness_cost = 0i64;
        for (qidx, curriculum) in instance.curricula.iter().enumerate() {
            let total_lectures: usize = curriculum
                .members
                .iter()
                .map(|&c| instance.course(c).lectures as usize)
                .sum();
            // A curriculum contributing a single lecture overall has nothing to be compact
            // with, so it can never incur a violation (otherwise every singleton curriculum
            // would be penalized regardless of placement).
            if total_lectures <= 1 {
                continue;
            }
            let periods_used: HashSet<u32> = curriculum
                .members
                .iter()
                .flat_map(|&c| instance.lectures_of(c).map(|l| period_of(values[l.raw_index()])))
                .collect();
            let mut deviation = 0i64;
            for &course in &curriculum.members {
                for lecture in instance.lectures_of(course) {
                    let idx = lecture.raw_index();
                    let period = period_of(values[idx]);
                    let timeslot = instance.timeslot_of(period);
                    let periods_per_day = instance.periods_per_day;
                    let before = timeslot > 0 && periods_used.contains(&(period - 1));
                    let after =
                        timeslot + 1 < periods_per_day && periods_used.contains(&(period + 1));
                    let isolated = !before && !after;
                    if isolated {
                        lecture_compactness[idx] = true;
                        deviation += 1;
                    }
                }
            }
            curriculum_compactness_deviation[qidx] = deviation;
            compactness_cost += deviation;
        }

        let mut costs = CostBreakdown::default();
        costs.components[CostComponent::RoomCapacity] = capacity_cost;
        costs.components[CostComponent::RoomStability] = stability_cost;
        costs.components[CostComponent::MinimumWorkingDays] = min_days_cost;
        costs.components[CostComponent::CurriculumCompactness] = compactness_cost;

        SolvedSnapshot {
            roomslot: values.to_vec(),
            duplicates,
            conflicting_lectures,
            conflicts,
            room_capacity_deviation,
            room_stability_deviation,
            minimum_working_days_deviation,
            curriculum_compactness_deviation,
            lecture_compactness,
            costs,
        }
    }

    pub fn feasible(&self, num_lectures: usize) -> bool {
        self.duplicates == num_lectures && self.conflicts == 0
    }

    pub fn period_of(&self, instance: &Instance, l: LectureId) -> u32 {
        (self.roomslot[l.raw_index()] / instance.num_rooms()) as u32
    }

    pub fn room_of(&self, instance: &Instance, l: LectureId) -> RoomId {
        RoomId::from_index(self.roomslot[l.raw_index()] % instance.num_rooms())
    }
}
