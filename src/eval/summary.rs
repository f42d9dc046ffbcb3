use std::sync::Arc;

use polars::{
    df,
    frame::DataFrame,
    prelude::{DataType, Field, PlSmallStr, Schema, SchemaRef},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    error::{TradeWhispersError, TradeWhispersResult, polars_err},
    eval::Evaluation,
    report::io::{Report, ReportName, ToSchema},
};

/// One row per evaluated horizon.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    PartialOrd,
    Ord,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum EvalCol {
    /// Forecast horizon in minutes.
    Horizon,
    /// Total rows in the results table.
    ResultRows,
    /// Rows matched by the timestamp join.
    MatchedRows,
    /// Rows actually scored, after null dropping and mode restriction.
    EvaluatedRows,
    /// Rows whose prediction implies a trade.
    TradedRows,
    /// Fraction of scored rows where label equals prediction.
    Accuracy,
    /// Signed sum of realized returns under the trade-direction rules.
    CumulativePnl,
}

impl From<EvalCol> for PlSmallStr {
    fn from(value: EvalCol) -> Self {
        value.as_str().into()
    }
}

impl EvalCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Tabular evaluation summary, one row per horizon.
#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    df: DataFrame,
}

impl Default for EvaluationSummary {
    fn default() -> Self {
        let df = DataFrame::empty_with_schema(&Self::to_schema());
        Self { df }
    }
}

impl ReportName for EvaluationSummary {
    fn base_name(&self) -> String {
        "evaluation_summary".to_string()
    }
}

impl Report for EvaluationSummary {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn as_df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }
}

impl ToSchema for EvaluationSummary {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = EvalCol::iter()
            .map(|col| {
                let dtype = match col {
                    EvalCol::Horizon
                    | EvalCol::ResultRows
                    | EvalCol::MatchedRows
                    | EvalCol::EvaluatedRows
                    | EvalCol::TradedRows => DataType::UInt32,

                    EvalCol::Accuracy | EvalCol::CumulativePnl => DataType::Float64,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl TryFrom<&Evaluation> for EvaluationSummary {
    type Error = TradeWhispersError;

    fn try_from(evaluation: &Evaluation) -> TradeWhispersResult<Self> {
        let records = evaluation.horizons();
        if records.is_empty() {
            return Ok(Self::default());
        }

        let df = df!(
            EvalCol::Horizon.to_string() => records.iter().map(|r| r.horizon.minutes()).collect::<Vec<u32>>(),
            EvalCol::ResultRows.to_string() => records.iter().map(|r| r.result_rows).collect::<Vec<u32>>(),
            EvalCol::MatchedRows.to_string() => records.iter().map(|r| r.matched_rows).collect::<Vec<u32>>(),
            EvalCol::EvaluatedRows.to_string() => records.iter().map(|r| r.evaluated_rows).collect::<Vec<u32>>(),
            EvalCol::TradedRows.to_string() => records.iter().map(|r| r.traded_rows).collect::<Vec<u32>>(),
            EvalCol::Accuracy.to_string() => records.iter().map(|r| r.accuracy).collect::<Vec<f64>>(),
            EvalCol::CumulativePnl.to_string() => records.iter().map(|r| r.cumulative_pnl).collect::<Vec<f64>>(),
        )
        .map_err(|e| polars_err("building evaluation summary", e))?;

        Ok(Self { df })
    }
}
