//! Course records and course-list loading.

use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// A remote course to export. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
}

impl Course {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CourseRow {
    id: Option<String>,
    #[serde(alias = "name")]
    course_name: Option<String>,
}

/// Load the ordered course list from a CSV file with an `id` column and a
/// `course_name` (or `name`) column.
pub fn load_courses(path: &Path) -> Result<Vec<Course>> {
    let file = std::fs::File::open(path).map_err(|e| {
        BackupError::CourseList(format!("cannot open {}: {}", path.display(), e))
    })?;
    parse_courses(file)
}

/// Parse a course list from any CSV reader.
pub fn parse_courses<R: Read>(reader: R) -> Result<Vec<Course>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| BackupError::CourseList(format!("unreadable header: {}", e)))?;
    if !headers.iter().any(|h| h == "id") {
        return Err(BackupError::CourseList(
            "course list has no 'id' column".to_string(),
        ));
    }

    let mut courses = Vec::new();
    for (line, row) in rdr.deserialize::<CourseRow>().enumerate() {
        let row = row.map_err(|e| BackupError::CourseList(e.to_string()))?;
        let id = row.id.unwrap_or_default();
        if id.is_empty() {
            // +2: header line and 1-based numbering
            warn!(line = line + 2, "Skipping course row without an id");
            continue;
        }
        courses.push(Course {
            name: row.course_name.unwrap_or_default(),
            id,
        });
    }

    Ok(courses)
}
