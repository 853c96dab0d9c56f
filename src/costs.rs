//! The four ITC-2007 soft-cost components and their fixed weights.

use enum_map::{Enum, EnumMap};
use strum::IntoStaticStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum, IntoStaticStr)]
pub enum CostComponent {
    RoomCapacity,
    RoomStability,
    MinimumWorkingDays,
    CurriculumCompactness,
}

impl CostComponent {
    pub fn weight(self) -> i64 {
        match self {
            CostComponent::RoomCapacity => 1,
            CostComponent::RoomStability => 1,
            CostComponent::MinimumWorkingDays => 5,
            CostComponent::CurriculumCompactness => 2,
        }
    }

    pub fn all() -> [CostComponent; 4] {
        [
            CostComponent::RoomCapacity,
            CostComponent::RoomStability,
            CostComponent::MinimumWorkingDays,
            CostComponent::CurriculumCompactness,
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CostBreakdown {
    pub components: EnumMap<CostComponent, i64>,
}

impl CostBreakdown {
    pub fn z(&self) -> i64 {
        CostComponent::all()
            .iter()
            .map(|&c| c.weight() * self.components[c])
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_applies_the_itc2007_weights() {
        let mut breakdown = CostBreakdown::default();
        breakdown.components[CostComponent::RoomCapacity] = 2;
        breakdown.components[CostComponent::RoomStability] = 1;
        breakdown.components[CostComponent::MinimumWorkingDays] = 1;
        breakdown.components[CostComponent::CurriculumCompactness] = 3;
        // 2*1 + 1*1 + 1*5 + 3*2 = 14
        assert_eq!(breakdown.z(), 14);
    }

    #[test]
    fn label_names_are_stable() {
        let label: &'static str = CostComponent::MinimumWorkingDays.into();
        assert_eq!(label, "MinimumWorkingDays");
    }
}
