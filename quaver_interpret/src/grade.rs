// Confidence-grade arithmetic.
//
// Grades are plain `f64` in [0, 1]. A candidate's *intrinsic* grade comes
// from the classifier, already scaled by `intrinsic_ratio` so that the top
// of the range is reserved for contextual boosts. Its *contextual* grade is
// derived from the support relations committed around it.
//
// Everything here is a pure function over `GradeParams`; the functions are
// small on purpose so the contextual combination can be swapped per call
// site (the combination is a policy, not a law — ensembles use a plain
// member mean instead).

use crate::config::GradeParams;

/// Clamp a grade into [0, 1].
pub fn clamp(grade: f64) -> f64 {
    grade.clamp(0.0, 1.0)
}

/// Scale a raw classifier confidence into the intrinsic range.
pub fn intrinsic(raw: f64, params: &GradeParams) -> f64 {
    clamp(raw) * params.intrinsic_ratio
}

/// Move an intrinsic grade toward the intrinsic ceiling by the given ratio.
///
/// A grade already at or above the ceiling is left unchanged; intrinsic
/// grades never invade the contextual headroom.
pub fn increase(grade: f64, ratio: f64, params: &GradeParams) -> f64 {
    if grade < params.intrinsic_ratio {
        clamp(grade + ratio * (params.intrinsic_ratio - grade))
    } else {
        grade
    }
}

/// Rescale a grade toward zero by the given ratio.
pub fn decrease(grade: f64, ratio: f64) -> f64 {
    clamp(grade * (1.0 - ratio))
}

/// Ratio a support relation applies to an endpoint's contextual grade:
/// `1 + coeff * relation_grade`, always >= 1.
pub fn support_ratio(coeff: f64, relation_grade: f64) -> f64 {
    1.0 + coeff * clamp(relation_grade)
}

/// Contribution of one supporting partner: its best grade weighted by how
/// much the support ratio exceeds neutral.
pub fn contribution(partner_best: f64, ratio: f64) -> f64 {
    clamp(partner_best) * (ratio - 1.0).max(0.0)
}

/// Default contextual combination: `1 - (1 - g) / (1 + sum)` over the
/// support contributions.
///
/// With no supports this is the identity; each added contribution shrinks
/// the remaining doubt `1 - g` proportionally, so the result is monotonic
/// in every contribution and approaches 1 asymptotically.
pub fn contextual(intrinsic: f64, contributions: &[f64]) -> f64 {
    let total: f64 = contributions.iter().sum();
    clamp(1.0 - (1.0 - clamp(intrinsic)) / (1.0 + total))
}

/// Mean of member best grades, the contextual grade of an ensemble.
/// Zero for an empty member list.
pub fn mean(grades: &[f64]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    clamp(grades.iter().sum::<f64>() / grades.len() as f64)
}
