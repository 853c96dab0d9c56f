//! Text and JSON solution reporting.

use std::fmt::Write as _;

use serde::Serialize;

use crate::costs::CostComponent;
use crate::instance::{Instance, LectureId};
use crate::model::SolvedSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Debug,
    Experiments,
}

#[derive(Debug, Serialize)]
pub struct JsonSummary {
    pub duplicates: usize,
    pub conflicts: i64,
    pub cost: i64,
    pub room_capacity_cost: i64,
    pub room_stability_cost: i64,
    pub min_working_days_cost: i64,
    pub curriculum_compactness_cost: i64,
}

impl JsonSummary {
    pub fn from_snapshot(snapshot: &SolvedSnapshot) -> Self {
        JsonSummary {
            duplicates: snapshot.duplicates,
            conflicts: snapshot.conflicts,
            cost: snapshot.costs.z(),
            room_capacity_cost: snapshot.costs.components[CostComponent::RoomCapacity],
            room_stability_cost: snapshot.costs.components[CostComponent::RoomStability],
            min_working_days_cost: snapshot.costs.components[CostComponent::MinimumWorkingDays],
            curriculum_compactness_cost: snapshot
                .costs
                .components[CostComponent::CurriculumCompactness],
        }
    }
}

/// One line per lecture: `<course_name> <room_name> <day> <period_within_day>`.
pub fn render_solution(instance: &Instance, snapshot: &SolvedSnapshot) -> String {
    let mut out = String::new();
    for l in 0..instance.num_lectures() {
        let lecture = LectureId::from_index(l);
        let course = instance.course(instance.lecture_of(lecture).course);
        let period = snapshot.period_of(instance, lecture);
        let room = instance.room(snapshot.room_of(instance, lecture));
        let day = instance.day_of(period);
        let timeslot = instance.timeslot_of(period);
        let _ = writeln!(out, "{} {} {} {}", course.name, room.name, day, timeslot);
    }
    out
}

/// Per-component cost breakdown plus the objective, for `-model debug`.
pub fn render_cost_breakdown(snapshot: &SolvedSnapshot) -> String {
    let mut out = String::new();
    for &component in &CostComponent::all() {
        let label: &'static str = component.into();
        let _ = writeln!(
            out,
            "{label}: {}",
            snapshot.costs.components[component]
        );
    }
    let _ = writeln!(out, "z: {}", snapshot.costs.z());
    let _ = writeln!(out, "duplicates: {}", snapshot.duplicates);
    let _ = writeln!(out, "conflicts: {}", snapshot.conflicts);
    out
}

pub fn render_report(
    instance: &Instance,
    snapshot: &SolvedSnapshot,
    mode: OutputMode,
    json_summary: bool,
) -> String {
    let mut out = render_solution(instance, snapshot);
    if mode == OutputMode::Debug {
        out.push('\n');
        out.push_str(&render_cost_breakdown(snapshot));
    }
    if json_summary {
        out.push('\n');
        let summary = JsonSummary::from_snapshot(snapshot);
        out.push_str(&serde_json::to_string(&summary).expect("JsonSummary always serializes"));
        out.push('\n');
    }
    out
}
