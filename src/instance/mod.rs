//! Immutable problem data: courses, rooms, curricula, availability and conflicts.

pub mod parser;

use std::fmt;

use crate::errors::{Error, Result};

macro_rules! index_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn from_index(index: usize) -> Self {
                $name(index as u32)
            }

            pub fn raw_index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_id!(CourseId);
index_id!(RoomId);
index_id!(CurriculumId);
index_id!(LectureId);

#[derive(Debug, Clone)]
pub struct Course {
    pub name: String,
    pub teacher: String,
    pub lectures: u16,
    pub min_working_days: u16,
    pub students: u32,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub name: String,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct Curriculum {
    pub name: String,
    pub members: Vec<CourseId>,
}

/// `(course, rank)`: the rank-th lecture (0-based) of `course`.
#[derive(Debug, Clone, Copy)]
pub struct LectureOf {
    pub course: CourseId,
    pub rank: u16,
}

#[derive(Debug)]
pub struct Instance {
    pub name: String,
    pub courses: Vec<Course>,
    pub rooms: Vec<Room>,
    pub days: u16,
    pub periods_per_day: u16,
    pub curricula: Vec<Curriculum>,

    /// `availability[course][period]`
    availability: Vec<Vec<bool>>,
    /// `conflict[course][course]`, symmetric, reflexive-free.
    conflict: Vec<Vec<bool>>,

    lecture_of: Vec<LectureOf>,
    start_of: Vec<LectureId>,
}

impl Instance {
    pub fn periods(&self) -> u32 {
        self.days as u32 * self.periods_per_day as u32
    }

    pub fn num_lectures(&self) -> usize {
        self.lecture_of.len()
    }

    pub fn num_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn course(&self, id: CourseId) -> &Course {
        &self.courses[id.raw_index()]
    }

    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id.raw_index()]
    }

    pub fn lecture_of(&self, l: LectureId) -> LectureOf {
        self.lecture_of[l.raw_index()]
    }

    pub fn start_of(&self, c: CourseId) -> LectureId {
        self.start_of[c.raw_index()]
    }

    pub fn lectures_of(&self, c: CourseId) -> impl Iterator<Item = LectureId> + '_ {
        let start = self.start_of(c).raw_index();
        let count = self.course(c).lectures as usize;
        (start..start + count).map(LectureId::from_index)
    }

    pub fn available(&self, course: CourseId, period: u32) -> bool {
        self.availability[course.raw_index()][period as usize]
    }

    pub fn conflict(&self, c1: CourseId, c2: CourseId) -> bool {
        self.conflict[c1.raw_index()][c2.raw_index()]
    }

    pub fn conflicting_courses(&self, c: CourseId) -> impl Iterator<Item = CourseId> + '_ {
        self.conflict[c.raw_index()]
            .iter()
            .enumerate()
            .filter(|(_, &conflicts)| conflicts)
            .map(|(idx, _)| CourseId::from_index(idx))
    }

    pub fn day_of(&self, period: u32) -> u16 {
        (period / self.periods_per_day as u32) as u16
    }

    pub fn timeslot_of(&self, period: u32) -> u16 {
        (period % self.periods_per_day as u32) as u16
    }

    /// Builds an instance from already-parsed components, closing `conflict` over shared
    /// curricula/teacher and populating the lecture/course index maps. Used by both text format
    /// readers and by tests that construct instances directly.
    pub fn build(
        name: String,
        courses: Vec<Course>,
        rooms: Vec<Room>,
        days: u16,
        periods_per_day: u16,
        curricula: Vec<Curriculum>,
        unavailable: &[(CourseId, u32)],
    ) -> Result<Instance> {
        let num_courses = courses.len();
        let periods = days as usize * periods_per_day as usize;

        let mut availability = vec![vec![true; periods]; num_courses];
        for &(course, period) in unavailable {
            availability[course.raw_index()][period as usize] = false;
        }

        let mut conflict = vec![vec![false; num_courses]; num_courses];
        for curriculum in &curricula {
            for &a in &curriculum.members {
                for &b in &curriculum.members {
                    if a != b {
                        conflict[a.raw_index()][b.raw_index()] = true;
                    }
                }
            }
        }
        for i in 0..num_courses {
            for j in 0..num_courses {
                if i != j && courses[i].teacher == courses[j].teacher {
                    conflict[i][j] = true;
                }
            }
        }

        let mut lecture_of = Vec::new();
        let mut start_of = Vec::with_capacity(num_courses);
        for (idx, course) in courses.iter().enumerate() {
            start_of.push(LectureId::from_index(lecture_of.len()));
            for rank in 0..course.lectures {
                lecture_of.push(LectureOf {
                    course: CourseId::from_index(idx),
                    rank,
                });
            }
        }

        let instance = Instance {
            name,
            courses,
            rooms,
            days,
            periods_per_day,
            curricula,
            availability,
            conflict,
            lecture_of,
            start_of,
        };

        instance.check_feasibility_precheck()?;
        Ok(instance)
    }

    fn check_feasibility_precheck(&self) -> Result<()> {
        for (idx, course) in self.courses.iter().enumerate() {
            let course_id = CourseId::from_index(idx);
            let available = (0..self.periods())
                .filter(|&p| self.available(course_id, p))
                .count();
            if available < course.lectures as usize {
                return Err(Box::new(Error::InfeasiblePrecheck {
                    course: course.name.clone(),
                    lectures: course.lectures as usize,
                    available,
                }));
            }
        }
        Ok(())
    }
}
