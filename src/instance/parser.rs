//! Readers for the two ITC-2007-style text formats described in the external interfaces.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, Context, Result as AnyResult};

use crate::errors::{Error, Result};

use super::{Course, CourseId, Curriculum, Instance, Room};

fn split_fields(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

fn read_lines(path: &Path) -> AnyResult<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| anyhow!("failed to read instance at {}", path.display()))?;
    Ok(contents.lines().map(String::from).collect())
}

struct LineCursor {
    lines: Vec<String>,
    pos: usize,
}

impl LineCursor {
    fn new(lines: Vec<String>) -> Self {
        LineCursor { lines, pos: 0 }
    }

    fn next_nonblank(&mut self) -> Option<&str> {
        while self.pos < self.lines.len() {
            let line = &self.lines[self.pos];
            self.pos += 1;
            if !line.trim().is_empty() {
                return Some(line.as_str());
            }
        }
        None
    }

    fn skip_to(&mut self, header: &str) {
        while self.pos < self.lines.len() {
            if self.lines[self.pos].trim().eq_ignore_ascii_case(header) {
                self.pos += 1;
                return;
            }
            self.pos += 1;
        }
    }
}

fn header_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (found_key, rest) = line.split_once(':')?;
    if found_key.trim().eq_ignore_ascii_case(key) {
        Some(rest.trim())
    } else {
        None
    }
}

fn parse_usize(path: &str, context: &str, raw: &str) -> Result<usize> {
    raw.trim().parse::<usize>().map_err(|err| {
        Box::new(Error::MalformedInstance {
            path: path.to_string(),
            reason: format!("bad integer for {context}: {err} (got {raw:?})"),
        })
    })
}

/// Shared state while reading either format: the header fields common to both.
struct Header {
    name: String,
    num_courses: usize,
    num_rooms: usize,
    days: u16,
    periods_per_day: u16,
    num_curricula: usize,
    num_unavailability: usize,
    num_room_constraints: usize,
}

fn read_header(path: &str, cursor: &mut LineCursor, has_room_constraints: bool) -> Result<Header> {
    let malformed = |reason: String| {
        Box::new(Error::MalformedInstance {
            path: path.to_string(),
            reason,
        })
    };

    let mut name = None;
    let mut num_courses = None;
    let mut num_rooms = None;
    let mut days = None;
    let mut periods_per_day = None;
    let mut num_curricula = None;
    let mut num_unavailability = None;
    let mut num_room_constraints = 0usize;

    while let Some(line) = cursor.next_nonblank() {
        if line.trim().eq_ignore_ascii_case("COURSES") {
            break;
        }
        if let Some(v) = header_value(line, "Name") {
            name = Some(v.to_string());
        } else if let Some(v) = header_value(line, "Courses") {
            num_courses = Some(parse_usize(path, "Courses", v)?);
        } else if let Some(v) = header_value(line, "Rooms") {
            num_rooms = Some(parse_usize(path, "Rooms", v)?);
        } else if let Some(v) = header_value(line, "Days") {
            days = Some(parse_usize(path, "Days", v)? as u16);
        } else if let Some(v) = header_value(line, "Periods_per_day") {
            periods_per_day = Some(parse_usize(path, "Periods_per_day", v)? as u16);
        } else if let Some(v) = header_value(line, "Curricula") {
            num_curricula = Some(parse_usize(path, "Curricula", v)?);
        } else if header_value(line, "Min_Max_Daily_Lectures").is_some() {
            // Recorded by the original format but not consulted by this core's hard constraints
            // (see SPEC_FULL.md §4.9); parsed only so the header cursor advances past it.
        } else if let Some(v) = header_value(line, "UnavailabilityConstraints") {
            num_unavailability = Some(parse_usize(path, "UnavailabilityConstraints", v)?);
        } else if has_room_constraints {
            if let Some(v) = header_value(line, "RoomConstraints") {
                num_room_constraints = parse_usize(path, "RoomConstraints", v)?;
            }
        }
    }

    Ok(Header {
        name: name.ok_or_else(|| malformed("missing Name header".into()))?,
        num_courses: num_courses.ok_or_else(|| malformed("missing Courses header".into()))?,
        num_rooms: num_rooms.ok_or_else(|| malformed("missing Rooms header".into()))?,
        days: days.ok_or_else(|| malformed("missing Days header".into()))?,
        periods_per_day: periods_per_day
            .ok_or_else(|| malformed("missing Periods_per_day header".into()))?,
        num_curricula: num_curricula.ok_or_else(|| malformed("missing Curricula header".into()))?,
        num_unavailability: num_unavailability
            .ok_or_else(|| malformed("missing UnavailabilityConstraints header".into()))?,
        num_room_constraints,
    })
}

fn read_courses(
    path: &str,
    cursor: &mut LineCursor,
    count: usize,
    has_double_lectures_flag: bool,
) -> Result<Vec<Course>> {
    let malformed = |reason: String| {
        Box::new(Error::MalformedInstance {
            path: path.to_string(),
            reason,
        })
    };

    let mut courses = Vec::with_capacity(count);
    for _ in 0..count {
        let line = cursor
            .next_nonblank()
            .ok_or_else(|| malformed("ran out of COURSES rows".into()))?;
        let fields = split_fields(line);
        let expected = if has_double_lectures_flag { 6 } else { 5 };
        if fields.len() < expected {
            return Err(malformed(format!(
                "COURSES row {line:?} has {} fields, expected {expected}",
                fields.len()
            )));
        }
        courses.push(Course {
            name: fields[0].to_string(),
            teacher: fields[1].to_string(),
            lectures: parse_usize(path, "course lectures", fields[2])? as u16,
            min_working_days: parse_usize(path, "course min_working_days", fields[3])? as u16,
            students: parse_usize(path, "course students", fields[4])? as u32,
        });
    }
    Ok(courses)
}

fn read_rooms(path: &str, cursor: &mut LineCursor, count: usize) -> Result<Vec<Room>> {
    let malformed = |reason: String| {
        Box::new(Error::MalformedInstance {
            path: path.to_string(),
            reason,
        })
    };

    let mut rooms = Vec::with_capacity(count);
    for _ in 0..count {
        let line = cursor
            .next_nonblank()
            .ok_or_else(|| malformed("ran out of ROOMS rows".into()))?;
        let fields = split_fields(line);
        if fields.len() < 2 {
            return Err(malformed(format!("ROOMS row {line:?} is missing fields")));
        }
        rooms.push(Room {
            name: fields[0].to_string(),
            capacity: parse_usize(path, "room capacity", fields[1])? as u32,
        });
    }
    Ok(rooms)
}

fn read_curricula(
    path: &str,
    cursor: &mut LineCursor,
    count: usize,
    course_index: &HashMap<String, CourseId>,
) -> Result<Vec<Curriculum>> {
    let malformed = |reason: String| {
        Box::new(Error::MalformedInstance {
            path: path.to_string(),
            reason,
        })
    };

    let mut curricula = Vec::with_capacity(count);
    for _ in 0..count {
        let line = cursor
            .next_nonblank()
            .ok_or_else(|| malformed("ran out of CURRICULA rows".into()))?;
        let fields = split_fields(line);
        if fields.len() < 2 {
            return Err(malformed(format!("CURRICULA row {line:?} is missing fields")));
        }
        let size = parse_usize(path, "curriculum size", fields[1])?;
        if fields.len() < 2 + size {
            return Err(malformed(format!(
                "CURRICULA row {line:?} declares {size} members but doesn't list that many"
            )));
        }
        let members = fields[2..2 + size]
            .iter()
            .map(|name| {
                course_index
                    .get(*name)
                    .copied()
                    .ok_or_else(|| malformed(format!("unknown course {name:?} in curriculum")))
            })
            .collect::<Result<Vec<_>>>()?;
        curricula.push(Curriculum {
            name: fields[0].to_string(),
            members,
        });
    }
    Ok(curricula)
}

fn read_unavailability(
    path: &str,
    cursor: &mut LineCursor,
    count: usize,
    course_index: &HashMap<String, CourseId>,
    periods_per_day: u16,
) -> Result<Vec<(CourseId, u32)>> {
    let malformed = |reason: String| {
        Box::new(Error::MalformedInstance {
            path: path.to_string(),
            reason,
        })
    };

    let mut unavailable = Vec::with_capacity(count);
    for _ in 0..count {
        let line = cursor
            .next_nonblank()
            .ok_or_else(|| malformed("ran out of UNAVAILABILITY_CONSTRAINTS rows".into()))?;
        let fields = split_fields(line);
        if fields.len() < 3 {
            return Err(malformed(format!(
                "UNAVAILABILITY_CONSTRAINTS row {line:?} is missing fields"
            )));
        }
        let course = course_index
            .get(fields[0])
            .copied()
            .ok_or_else(|| malformed(format!("unknown course {:?} in unavailability", fields[0])))?;
        let day = parse_usize(path, "unavailability day", fields[1])?;
        let period_in_day = parse_usize(path, "unavailability period", fields[2])?;
        let period = day as u32 * periods_per_day as u32 + period_in_day as u32;
        unavailable.push((course, period));
    }
    Ok(unavailable)
}

fn course_index_of(courses: &[Course]) -> HashMap<String, CourseId> {
    courses
        .iter()
        .enumerate()
        .map(|(idx, course)| (course.name.clone(), CourseId::from_index(idx)))
        .collect()
}

fn load_common(path: &Path, has_ectt_extras: bool) -> Result<Instance> {
    let path_str = path.to_string_lossy().to_string();
    let lines = read_lines(path).map_err(|err| {
        Box::new(Error::FailedToReadInstance {
            path: path_str.clone(),
            io_error: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
        })
    })?;

    let mut cursor = LineCursor::new(lines);
    let header = read_header(&path_str, &mut cursor, has_ectt_extras)?;

    let courses = read_courses(&path_str, &mut cursor, header.num_courses, has_ectt_extras)?;
    let course_index = course_index_of(&courses);

    cursor.skip_to("ROOMS");
    let rooms = read_rooms(&path_str, &mut cursor, header.num_rooms)?;

    cursor.skip_to("CURRICULA");
    let curricula = read_curricula(&path_str, &mut cursor, header.num_curricula, &course_index)?;

    cursor.skip_to("UNAVAILABILITY_CONSTRAINTS");
    let unavailable = read_unavailability(
        &path_str,
        &mut cursor,
        header.num_unavailability,
        &course_index,
        header.periods_per_day,
    )?;

    if has_ectt_extras && header.num_room_constraints > 0 {
        // Room constraints are parsed-and-discarded: see SPEC_FULL.md §4.9 for why this core
        // doesn't enforce them as a hard propagator.
        cursor.skip_to("ROOM_CONSTRAINTS");
        for _ in 0..header.num_room_constraints {
            cursor.next_nonblank();
        }
    }

    Instance::build(
        header.name,
        courses,
        rooms,
        header.days,
        header.periods_per_day,
        curricula,
        &unavailable,
    )
}

impl Instance {
    /// Auto-detects `.ectt` vs `.ctt` by filename suffix and parses accordingly.
    pub fn load(path: &Path) -> Result<Instance> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("ectt") => load_common(path, true),
            Some("ctt") => load_common(path, false),
            _ => Err(Box::new(Error::UnknownInstanceFormat {
                path: path.to_string_lossy().to_string(),
            })),
        }
    }
}
