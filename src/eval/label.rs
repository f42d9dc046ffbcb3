use polars::prelude::{Expr, Null, lit, when};

use crate::data::domain::Direction;

/// Three-way label of a continuous move against a non-negative threshold.
///
/// Ties go to `Stable`: the boundary is inclusive on both sides. Missing
/// values stay missing.
pub fn direction_label(value: Option<f64>, threshold: f64) -> Option<Direction> {
    let x = value?;
    if x.is_nan() {
        return None;
    }
    if x.abs() <= threshold {
        Some(Direction::Stable)
    } else if x > threshold {
        Some(Direction::Increase)
    } else {
        Some(Direction::Decrease)
    }
}

/// Signed three-way encoding used for bulk outcome labeling without a
/// companion prediction.
///
/// Without a threshold this is `sign(x)`; with one, the result is `0` iff
/// `|x| <= threshold`, else `sign(x)`. Missing values stay missing.
pub fn signed_label(value: Option<f64>, threshold: Option<f64>) -> Option<i8> {
    let x = value?;
    if x.is_nan() {
        return None;
    }
    let label = match threshold {
        None if x > 0.0 => 1,
        None if x < 0.0 => -1,
        None => 0,
        Some(t) if x.abs() <= t => 0,
        Some(_) if x > 0.0 => 1,
        Some(_) => -1,
    };
    Some(label)
}

/// Expression form of [`direction_label`] over an already-scaled column.
/// Produces a nullable string column of [`Direction`] names.
pub fn direction_label_expr(value: Expr, threshold: f64) -> Expr {
    when(value.clone().abs().lt_eq(lit(threshold)))
        .then(lit(Direction::Stable.as_str()))
        .when(value.clone().gt(lit(threshold)))
        .then(lit(Direction::Increase.as_str()))
        .when(value.lt(lit(-threshold)))
        .then(lit(Direction::Decrease.as_str()))
        .otherwise(lit(Null {}))
}

/// Expression form of [`signed_label`]. Produces a nullable integer column
/// over `{-1, 0, 1}`.
pub fn signed_label_expr(value: Expr, threshold: Option<f64>) -> Expr {
    match threshold {
        None => when(value.clone().gt(lit(0.0)))
            .then(lit(1))
            .when(value.clone().lt(lit(0.0)))
            .then(lit(-1))
            .when(value.is_not_null())
            .then(lit(0))
            .otherwise(lit(Null {})),
        Some(t) => when(value.clone().abs().lt_eq(lit(t)))
            .then(lit(0))
            .when(value.clone().gt(lit(0.0)))
            .then(lit(1))
            .when(value.lt(lit(0.0)))
            .then(lit(-1))
            .otherwise(lit(Null {})),
    }
}
