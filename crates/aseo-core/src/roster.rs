//! # Roster Reference Data and Bulk Import
//!
//! Courses are read-only reference data used to populate the group selector.
//! Students arrive through a one-shot bulk import of newline-delimited
//! `name,course` text exported from the school's spreadsheet, with its
//! Spanish column headers.

use serde::{Deserialize, Serialize};

use crate::identity::CourseId;

/// A course grouping, e.g. "1ESO A". Imported in bulk, never mutated by the
/// occupancy workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
}

/// A roster row ready for bulk insertion. Duplicates are permitted; the
/// roster carries no uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub course: String,
}

/// Outcome of parsing a bulk-import payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RosterImport {
    pub students: Vec<NewStudent>,
    /// Non-blank lines that were rejected (header, too few fields, or a
    /// blank field).
    pub skipped: usize,
}

/// Column headers of the spreadsheet export, skipped case-insensitively
/// wherever the line appears.
const HEADER_NAME: &str = "nombre";
const HEADER_COURSE: &str = "curso";

/// Parse newline-delimited `name,course` text.
///
/// Per line: whitespace is trimmed from each field; blank lines are ignored
/// outright; a line whose first two fields match the header labels is
/// skipped; lines with fewer than two comma-separated fields or with a blank
/// field are counted as skipped. Fields beyond the second are ignored.
pub fn parse_roster(input: &str) -> RosterImport {
    let mut import = RosterImport::default();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split(',');
        let name = fields.next().map(str::trim).unwrap_or_default();
        let course = match fields.next().map(str::trim) {
            Some(course) => course,
            None => {
                import.skipped += 1;
                continue;
            }
        };

        if name.eq_ignore_ascii_case(HEADER_NAME) && course.eq_ignore_ascii_case(HEADER_COURSE) {
            import.skipped += 1;
            continue;
        }

        if name.is_empty() || course.is_empty() {
            import.skipped += 1;
            continue;
        }

        import.students.push(NewStudent {
            name: name.to_string(),
            course: course.to_string(),
        });
    }

    import
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_rows_and_skips_the_rest() {
        let input = "Ana López,1ESO A\nnombre,curso\nPedro,\n,2ESO B\nLuis,2ESO B";
        let import = parse_roster(input);
        assert_eq!(
            import.students,
            vec![
                NewStudent {
                    name: "Ana López".into(),
                    course: "1ESO A".into()
                },
                NewStudent {
                    name: "Luis".into(),
                    course: "2ESO B".into()
                },
            ]
        );
        // Header plus the two rows with a missing field.
        assert_eq!(import.skipped, 3);
    }

    #[test]
    fn header_is_skipped_case_insensitively() {
        let import = parse_roster("NOMBRE,Curso\nAna,1ESO A");
        assert_eq!(import.students.len(), 1);
        assert_eq!(import.skipped, 1);
    }

    #[test]
    fn blank_lines_are_not_counted_as_skipped() {
        let import = parse_roster("\n\nAna,1ESO A\n\n");
        assert_eq!(import.students.len(), 1);
        assert_eq!(import.skipped, 0);
    }

    #[test]
    fn fields_are_trimmed() {
        let import = parse_roster("  Juan Pérez , 1º ESO A ");
        assert_eq!(
            import.students,
            vec![NewStudent {
                name: "Juan Pérez".into(),
                course: "1º ESO A".into()
            }]
        );
    }

    #[test]
    fn single_field_line_is_skipped() {
        let import = parse_roster("solo-un-campo");
        assert!(import.students.is_empty());
        assert_eq!(import.skipped, 1);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let import = parse_roster("Ana,1ESO A,ignorado,también");
        assert_eq!(import.students.len(), 1);
        assert_eq!(import.students[0].course, "1ESO A");
    }

    #[test]
    fn duplicate_rows_are_kept() {
        let import = parse_roster("Ana,1ESO A\nAna,1ESO A");
        assert_eq!(import.students.len(), 2);
    }
}
