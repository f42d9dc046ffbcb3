use std::fmt;

use polars::{
    frame::DataFrame,
    prelude::{DataType, Expr, IntoLazy, Null, PlSmallStr, col, lit, when},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{
    data::schema::EventCol,
    error::{DataError, TradeWhispersResult, polars_err},
};

/// Size of one pip in raw price units.
pub const PIP: f64 = 0.0001;

/// Forecast horizon, counted in minutes ahead of the event timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Horizon(pub u32);

impl Horizon {
    pub fn minutes(&self) -> u32 {
        self.0
    }

    /// Canonical name of the realized forward-return column for this horizon.
    pub fn column_name(&self) -> PlSmallStr {
        format!("forward_return_t+{}", self.0).into()
    }

    pub(crate) fn pip_column_name(&self) -> PlSmallStr {
        format!("forward_return_t+{}_pips", self.0).into()
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}", self.0)
    }
}

/// Three-way direction domain shared by predictions and ground-truth labels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum Direction {
    Decrease,
    Stable,
    Increase,
}

/// Fixed normalization table for the string vocabulary. The source labels
/// carry the upstream sign convention, where a bearish headline ("Em baixa")
/// precedes a rising market; the inversion is intentional and must not be
/// "corrected".
const SOURCE_LABELS: [(&str, Direction); 3] = [
    ("Em baixa", Direction::Increase),
    ("Em alta", Direction::Decrease),
    ("Manter", Direction::Stable),
];

/// Fixed normalization table for the signed-integer vocabulary. Same
/// inverted convention as [`SOURCE_LABELS`].
const SOURCE_SIGNALS: [(i64, Direction); 3] = [
    (-1, Direction::Increase),
    (1, Direction::Decrease),
    (0, Direction::Stable),
];

impl Direction {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn name(&self) -> PlSmallStr {
        self.as_str().into()
    }

    /// Full label set, in reporting order.
    pub fn all() -> [Direction; 3] {
        [Direction::Decrease, Direction::Stable, Direction::Increase]
    }

    /// Labels that imply an executed trade.
    pub fn traded() -> [Direction; 2] {
        [Direction::Decrease, Direction::Increase]
    }

    /// Maps a raw string prediction onto the domain. Unknown values map to
    /// `None`.
    pub fn from_source_label(raw: &str) -> Option<Self> {
        SOURCE_LABELS
            .iter()
            .find(|(label, _)| *label == raw)
            .map(|(_, direction)| *direction)
    }

    /// Maps a raw signed prediction onto the domain. Values outside
    /// `{-1, 0, 1}` map to `None`.
    pub fn from_source_signal(raw: i64) -> Option<Self> {
        SOURCE_SIGNALS
            .iter()
            .find(|(signal, _)| *signal == raw)
            .map(|(_, direction)| *direction)
    }
}

/// Expression mapping a raw prediction column onto the three-way domain.
/// Unknown raw values become null.
pub(crate) fn normalized_prediction_expr(
    raw: Expr,
    dtype: &DataType,
) -> TradeWhispersResult<Expr> {
    let [(r0, d0), (r1, d1), (r2, d2)] = SOURCE_LABELS;
    let [(s0, e0), (s1, e1), (s2, e2)] = SOURCE_SIGNALS;

    match dtype {
        DataType::String => Ok(when(raw.clone().eq(lit(r0)))
            .then(lit(d0.as_str()))
            .when(raw.clone().eq(lit(r1)))
            .then(lit(d1.as_str()))
            .when(raw.eq(lit(r2)))
            .then(lit(d2.as_str()))
            .otherwise(lit(Null {}))),
        dt if dt.is_integer() => {
            let raw = raw.cast(DataType::Int64);
            Ok(when(raw.clone().eq(lit(s0)))
                .then(lit(e0.as_str()))
                .when(raw.clone().eq(lit(s1)))
                .then(lit(e1.as_str()))
                .when(raw.eq(lit(s2)))
                .then(lit(e2.as_str()))
                .otherwise(lit(Null {})))
        }
        other => Err(DataError::PredictionType(other.to_string()).into()),
    }
}

/// Replaces the raw prediction column of `df` with its three-way
/// normalization. The output column is a nullable string column holding
/// [`Direction`] names.
pub fn normalize_predictions(df: &DataFrame) -> TradeWhispersResult<DataFrame> {
    let pred = EventCol::Prediction;
    let dtype = df
        .column(pred.as_str())
        .map_err(|_| DataError::MissingColumn {
            table: "results".to_string(),
            column: pred.to_string(),
        })?
        .dtype()
        .clone();

    let expr = normalized_prediction_expr(col(pred), &dtype)?;
    df.clone()
        .lazy()
        .with_column(expr.alias(pred))
        .collect()
        .map_err(|e| polars_err("normalizing predictions", e))
}
