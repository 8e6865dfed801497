use serde::{Deserialize, Serialize};

/// One assignment's score record as stored in the workspace. `score` is
/// `None` until the assignment has been graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub id: i64,
    pub course_id: i64,
    pub category: Option<String>,
    pub score: Option<f64>,
    pub max_score: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCategory {
    pub course_id: i64,
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub credits: i64,
}

/// Mean of `score / max_score * 100` over the graded assignments in one
/// course category. An empty filtered set reads as 0.0 ("no graded work in
/// category"), not as undefined. `max_score == 0` is not guarded; the
/// division propagates NaN/inf as-is.
pub fn category_average(course_id: i64, category: &str, assignments: &[AssignmentRecord]) -> f64 {
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for a in assignments {
        if a.course_id != course_id || a.category.as_deref() != Some(category) {
            continue;
        }
        let Some(score) = a.score else {
            continue;
        };
        sum += score / a.max_score * 100.0;
        count += 1;
    }
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

/// Weighted course percentage. Each category with at least one graded
/// assignment contributes `category_average * weight / 100`; categories with
/// no graded work contribute nothing. The raw weighted sum is returned
/// without renormalizing over the contributing weights, so a course with
/// only half its weight graded reads low rather than scaled up.
pub fn course_grade(
    course_id: i64,
    categories: &[GradeCategory],
    assignments: &[AssignmentRecord],
) -> f64 {
    let mut total_weighted = 0.0_f64;
    let mut total_weight = 0.0_f64;

    for category in categories {
        if category.course_id != course_id {
            continue;
        }
        let graded = assignments.iter().any(|a| {
            a.course_id == course_id
                && a.category.as_deref() == Some(category.name.as_str())
                && a.score.is_some()
        });
        if !graded {
            continue;
        }
        let avg = category_average(course_id, &category.name, assignments);
        total_weighted += avg * (category.weight / 100.0);
        total_weight += category.weight;
    }

    if total_weight > 0.0 {
        total_weighted
    } else {
        0.0
    }
}

/// Fixed percentage-to-grade-point breakpoints, evaluated top-down.
pub fn grade_to_points(percentage: f64) -> f64 {
    if percentage >= 97.0 {
        return 4.0;
    }
    if percentage >= 93.0 {
        return 3.7;
    }
    if percentage >= 90.0 {
        return 3.3;
    }
    if percentage >= 87.0 {
        return 3.0;
    }
    if percentage >= 83.0 {
        return 2.7;
    }
    if percentage >= 80.0 {
        return 2.3;
    }
    if percentage >= 77.0 {
        return 2.0;
    }
    if percentage >= 73.0 {
        return 1.7;
    }
    if percentage >= 70.0 {
        return 1.3;
    }
    if percentage >= 67.0 {
        return 1.0;
    }
    if percentage >= 65.0 {
        return 0.7;
    }
    0.0
}

pub fn letter_grade(percentage: f64) -> &'static str {
    if percentage >= 97.0 {
        return "A+";
    }
    if percentage >= 93.0 {
        return "A";
    }
    if percentage >= 90.0 {
        return "A-";
    }
    if percentage >= 87.0 {
        return "B+";
    }
    if percentage >= 83.0 {
        return "B";
    }
    if percentage >= 80.0 {
        return "B-";
    }
    if percentage >= 77.0 {
        return "C+";
    }
    if percentage >= 73.0 {
        return "C";
    }
    if percentage >= 70.0 {
        return "C-";
    }
    if percentage >= 67.0 {
        return "D+";
    }
    if percentage >= 65.0 {
        return "D";
    }
    "F"
}

/// Credit-weighted institutional GPA. A course whose computed grade is
/// exactly 0 (which covers "nothing graded yet") is left out of both the
/// numerator and the denominator.
pub fn overall_gpa(
    courses: &[Course],
    categories: &[GradeCategory],
    assignments: &[AssignmentRecord],
) -> f64 {
    let mut total_points = 0.0_f64;
    let mut total_credits = 0.0_f64;

    for course in courses {
        let grade = course_grade(course.id, categories, assignments);
        if grade > 0.0 {
            total_points += grade_to_points(grade) * course.credits as f64;
            total_credits += course.credits as f64;
        }
    }

    if total_credits > 0.0 {
        total_points / total_credits
    } else {
        0.0
    }
}
