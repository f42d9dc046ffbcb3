pub mod label;
pub mod metrics;
pub mod summary;

use std::fmt;

use itertools::izip;
use polars::{
    frame::DataFrame,
    prelude::{IntoLazy, PlSmallStr, col, lit, when},
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    config::{EvalConfig, ScoringMode},
    data::{
        align::align_events,
        domain::{Direction, Horizon, PIP, normalize_predictions},
        schema::EventCol,
    },
    error::{TradeWhispersResult, polars_err},
    eval::{
        label::direction_label_expr,
        metrics::{ClassificationReport, ConfusionMatrix},
        summary::EvaluationSummary,
    },
};

/// Outcome of scoring predictions against realized returns for one horizon.
#[derive(Debug, Clone)]
pub struct HorizonEvaluation {
    pub horizon: Horizon,
    /// Total rows in the results table.
    pub result_rows: u32,
    /// Rows matched by the timestamp join.
    pub matched_rows: u32,
    /// Rows actually scored, after null dropping and mode restriction.
    pub evaluated_rows: u32,
    /// Rows whose prediction implies a trade.
    pub traded_rows: u32,
    pub accuracy: f64,
    /// Signed sum of unscaled realized returns under the trade-direction
    /// rules.
    pub cumulative_pnl: f64,
    pub confusion: ConfusionMatrix,
    pub class_report: ClassificationReport,
}

/// Full evaluation across the configured horizons.
#[derive(Debug, Clone)]
pub struct Evaluation {
    mode: ScoringMode,
    horizons: Vec<HorizonEvaluation>,
}

impl Evaluation {
    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    pub fn horizons(&self) -> &[HorizonEvaluation] {
        &self.horizons
    }

    /// Tabular form of the per-horizon records.
    pub fn summary(&self) -> TradeWhispersResult<EvaluationSummary> {
        self.try_into()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for h in &self.horizons {
            writeln!(f, "=== Horizon {} ({}) ===", h.horizon, self.mode)?;
            writeln!(
                f,
                "Results rows: {} | Matched: {} | Evaluated: {} | Traded preds: {}",
                h.result_rows, h.matched_rows, h.evaluated_rows, h.traded_rows
            )?;
            writeln!(f, "Confusion Matrix:\n{}", h.confusion)?;
            writeln!(f, "Classification Report:\n{}", h.class_report)?;
            writeln!(f, "Accuracy: {:.4}", h.accuracy)?;
            writeln!(f, "Cumulative PnL: {}", h.cumulative_pnl)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Scores predictions against realized forward returns, one record per
/// configured horizon.
///
/// The stage table is joined to the results table by timestamp (stage
/// deduplicated first), predictions are normalized onto the three-way
/// domain, and per horizon the realized return is pip-scaled and labeled
/// with the configured threshold. Horizons without a forward-return column
/// in `stage` are skipped without error.
#[tracing::instrument(skip_all, fields(mode = %cfg.mode))]
pub fn evaluate(
    stage: &DataFrame,
    results: &DataFrame,
    cfg: &EvalConfig,
) -> TradeWhispersResult<Evaluation> {
    let aligned = align_events(stage, results)?;
    let joined = normalize_predictions(aligned.as_df())?;

    let records = cfg
        .horizons
        .par_iter()
        .map(|h| {
            evaluate_horizon(
                &joined,
                *h,
                cfg,
                aligned.result_rows(),
                aligned.matched_rows(),
            )
        })
        .collect::<TradeWhispersResult<Vec<_>>>()?;

    Ok(Evaluation {
        mode: cfg.mode,
        horizons: records.into_iter().flatten().collect(),
    })
}

fn evaluate_horizon(
    joined: &DataFrame,
    horizon: Horizon,
    cfg: &EvalConfig,
    result_rows: u32,
    matched_rows: u32,
) -> TradeWhispersResult<Option<HorizonEvaluation>> {
    let ret_col = horizon.column_name();
    if joined.column(ret_col.as_str()).is_err() {
        tracing::warn!(%horizon, "stage table has no forward-return column for horizon, skipping");
        return Ok(None);
    }

    let pip_col = horizon.pip_column_name();
    let full = joined
        .clone()
        .lazy()
        .filter(
            col(ret_col.clone())
                .is_not_null()
                .and(col(EventCol::Prediction).is_not_null()),
        )
        .with_column((col(ret_col.clone()) / lit(PIP)).alias(pip_col.clone()))
        .with_column(
            direction_label_expr(col(pip_col), cfg.threshold_pips).alias(EventCol::GroundTruth),
        )
        .filter(col(EventCol::GroundTruth).is_not_null())
        .collect()
        .map_err(|e| polars_err("preparing evaluation rows", e))?;

    let (scored, labels) = match cfg.mode {
        ScoringMode::Filtered => {
            let scored = full
                .clone()
                .lazy()
                .filter(col(EventCol::Prediction).neq(lit(Direction::Stable.as_str())))
                .collect()
                .map_err(|e| polars_err("restricting to traded rows", e))?;
            (scored, Direction::traded().to_vec())
        }
        ScoringMode::Full => (full.clone(), Direction::all().to_vec()),
    };

    let traded_rows = match cfg.mode {
        ScoringMode::Filtered => scored.height() as u32,
        ScoringMode::Full => traded_prediction_count(&full)?,
    };

    let pairs = label_pairs(&scored)?;
    let confusion = ConfusionMatrix::from_pairs(&pairs, &labels);
    let class_report = ClassificationReport::from_pairs(&pairs, &labels);

    let matches = pairs.iter().filter(|(truth, pred)| truth == pred).count();
    let accuracy = if pairs.is_empty() {
        0.0
    } else {
        matches as f64 / pairs.len() as f64
    };
    let cumulative_pnl = cumulative_pnl(&scored, &ret_col)?;

    tracing::debug!(
        %horizon,
        evaluated = scored.height(),
        traded = traded_rows,
        "scored horizon"
    );

    Ok(Some(HorizonEvaluation {
        horizon,
        result_rows,
        matched_rows,
        evaluated_rows: scored.height() as u32,
        traded_rows,
        accuracy,
        cumulative_pnl,
        confusion,
        class_report,
    }))
}

fn traded_prediction_count(df: &DataFrame) -> TradeWhispersResult<u32> {
    let preds = prediction_labels(df)?;
    Ok(preds
        .into_iter()
        .filter(|p| *p != Some(Direction::Stable.as_str()))
        .count() as u32)
}

fn prediction_labels(df: &DataFrame) -> TradeWhispersResult<Vec<Option<&str>>> {
    Ok(df
        .column(EventCol::Prediction.as_str())
        .map_err(|e| polars_err("reading prediction column", e))?
        .str()
        .map_err(|e| polars_err("reading prediction column", e))?
        .into_iter()
        .collect())
}

fn label_pairs(df: &DataFrame) -> TradeWhispersResult<Vec<(Direction, Direction)>> {
    let truth = df
        .column(EventCol::GroundTruth.as_str())
        .map_err(|e| polars_err("reading ground-truth column", e))?
        .str()
        .map_err(|e| polars_err("reading ground-truth column", e))?;
    let pred = df
        .column(EventCol::Prediction.as_str())
        .map_err(|e| polars_err("reading prediction column", e))?
        .str()
        .map_err(|e| polars_err("reading prediction column", e))?;

    Ok(izip!(truth, pred)
        .filter_map(|(t, p)| Some((t?.parse::<Direction>().ok()?, p?.parse::<Direction>().ok()?)))
        .collect())
}

/// Sums unscaled returns with the trade sign applied: positive on
/// `Increase`, negated on `Decrease`, zero on `Stable`.
fn cumulative_pnl(df: &DataFrame, ret_col: &PlSmallStr) -> TradeWhispersResult<f64> {
    let signed = when(col(EventCol::Prediction).eq(lit(Direction::Increase.as_str())))
        .then(col(ret_col.clone()))
        .when(col(EventCol::Prediction).eq(lit(Direction::Decrease.as_str())))
        .then(col(ret_col.clone()) * lit(-1.0))
        .otherwise(lit(0.0));

    let out = df
        .clone()
        .lazy()
        .select([signed.sum().alias("cum_pnl")])
        .collect()
        .map_err(|e| polars_err("summing pnl", e))?;

    let pnl = out
        .column("cum_pnl")
        .map_err(|e| polars_err("reading pnl", e))?
        .f64()
        .map_err(|e| polars_err("reading pnl", e))?
        .get(0)
        .unwrap_or(0.0);
    Ok(pnl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::{
        df,
        prelude::{DataType, TimeUnit, TimeZone},
    };

    const MINUTE_US: i64 = 60_000_000;

    fn with_datetime_ts(df: DataFrame) -> DataFrame {
        df.lazy()
            .with_column(col(EventCol::Timestamp).cast(DataType::Datetime(
                TimeUnit::Microseconds,
                Some(TimeZone::UTC),
            )))
            .collect()
            .expect("to cast timestamps")
    }

    fn stage_frame(rows: &[(i64, Option<f64>)]) -> DataFrame {
        let (ts, ret): (Vec<i64>, Vec<Option<f64>>) = rows.iter().copied().unzip();
        with_datetime_ts(
            df!(
                EventCol::Timestamp.to_string() => ts.iter().map(|t| t * MINUTE_US).collect::<Vec<_>>(),
                Horizon(1).column_name().to_string() => ret,
            )
            .expect("to build stage"),
        )
    }

    fn results_frame(rows: &[(i64, &str)]) -> DataFrame {
        let (ts, pred): (Vec<i64>, Vec<&str>) = rows.iter().copied().unzip();
        with_datetime_ts(
            df!(
                EventCol::Timestamp.to_string() => ts.iter().map(|t| t * MINUTE_US).collect::<Vec<_>>(),
                EventCol::Prediction.to_string() => pred,
            )
            .expect("to build results"),
        )
    }

    fn config(mode: ScoringMode) -> EvalConfig {
        EvalConfig::new(vec![Horizon(1)], 0.0, mode).expect("valid config")
    }

    #[test]
    fn filtered_and_full_modes_count_rows_differently() {
        // Predictions normalize to [Increase, Stable, Decrease, Stable].
        let stage = stage_frame(&[
            (1, Some(0.001)),
            (2, Some(0.001)),
            (3, Some(-0.001)),
            (4, Some(0.001)),
        ]);
        let results = results_frame(&[
            (1, "Em baixa"),
            (2, "Manter"),
            (3, "Em alta"),
            (4, "Manter"),
        ]);

        let filtered =
            evaluate(&stage, &results, &config(ScoringMode::Filtered)).expect("to evaluate");
        let record = &filtered.horizons()[0];
        assert_eq!(record.evaluated_rows, 2);
        assert_eq!(record.traded_rows, 2);

        let full = evaluate(&stage, &results, &config(ScoringMode::Full)).expect("to evaluate");
        let record = &full.horizons()[0];
        assert_eq!(record.evaluated_rows, 4);
        assert_eq!(record.traded_rows, 2);
    }

    #[test]
    fn pnl_follows_the_trade_direction() {
        let stage = stage_frame(&[(1, Some(0.001)), (2, Some(0.002)), (3, Some(0.005))]);
        let results = results_frame(&[(1, "Em baixa"), (2, "Em alta"), (3, "Manter")]);

        let evaluation =
            evaluate(&stage, &results, &config(ScoringMode::Full)).expect("to evaluate");
        let record = &evaluation.horizons()[0];

        // +0.001 (Increase) - 0.002 (Decrease) + 0 (Stable)
        assert!((record.cumulative_pnl - (-0.001)).abs() < 1e-12);

        // The trade-restricted set scores the same two trades.
        let filtered =
            evaluate(&stage, &results, &config(ScoringMode::Filtered)).expect("to evaluate");
        let record = &filtered.horizons()[0];
        assert!((record.cumulative_pnl - (-0.001)).abs() < 1e-12);
    }

    #[test]
    fn accuracy_counts_exact_label_matches() {
        // Returns of +2 pips / -2 pips; threshold 1 pip.
        let stage = stage_frame(&[(1, Some(0.0002)), (2, Some(-0.0002)), (3, Some(0.0002))]);
        // Increase (right), Decrease (right), Decrease (wrong).
        let results = results_frame(&[(1, "Em baixa"), (2, "Em alta"), (3, "Em alta")]);

        let cfg = EvalConfig::new(vec![Horizon(1)], 1.0, ScoringMode::Filtered).expect("config");
        let evaluation = evaluate(&stage, &results, &cfg).expect("to evaluate");
        let record = &evaluation.horizons()[0];

        assert_eq!(record.evaluated_rows, 3);
        assert!((record.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(
            record.confusion.count(Direction::Increase, Direction::Increase),
            1
        );
        assert_eq!(
            record.confusion.count(Direction::Increase, Direction::Decrease),
            1
        );
        assert_eq!(
            record.confusion.count(Direction::Decrease, Direction::Decrease),
            1
        );
    }

    #[test]
    fn unmapped_predictions_are_excluded_everywhere() {
        let stage = stage_frame(&[(1, Some(0.001)), (2, Some(0.001))]);
        let results = results_frame(&[(1, "Em baixa"), (2, "Subindo")]);

        let evaluation =
            evaluate(&stage, &results, &config(ScoringMode::Full)).expect("to evaluate");
        let record = &evaluation.horizons()[0];

        assert_eq!(record.matched_rows, 2);
        assert_eq!(record.evaluated_rows, 1);
        assert_eq!(record.traded_rows, 1);
    }

    #[test]
    fn rows_without_realized_return_are_dropped() {
        let stage = stage_frame(&[(1, Some(0.001)), (2, None)]);
        let results = results_frame(&[(1, "Em baixa"), (2, "Em baixa")]);

        let evaluation =
            evaluate(&stage, &results, &config(ScoringMode::Full)).expect("to evaluate");
        assert_eq!(evaluation.horizons()[0].evaluated_rows, 1);
    }

    #[test]
    fn horizons_without_a_return_column_are_skipped() {
        let stage = stage_frame(&[(1, Some(0.001))]);
        let results = results_frame(&[(1, "Em baixa")]);

        let cfg = EvalConfig::new(vec![Horizon(1), Horizon(9)], 0.0, ScoringMode::Full)
            .expect("config");
        let evaluation = evaluate(&stage, &results, &cfg).expect("to evaluate");

        assert_eq!(evaluation.horizons().len(), 1);
        assert_eq!(evaluation.horizons()[0].horizon, Horizon(1));
    }

    #[test]
    fn summary_has_one_row_per_scored_horizon() {
        let stage = stage_frame(&[(1, Some(0.001)), (2, Some(-0.001))]);
        let results = results_frame(&[(1, "Em baixa"), (2, "Em alta")]);

        let evaluation =
            evaluate(&stage, &results, &config(ScoringMode::Filtered)).expect("to evaluate");
        let summary = evaluation.summary().expect("summary");
        assert_eq!(summary.as_df().height(), 1);

        let rendered = evaluation.to_string();
        assert!(rendered.contains("=== Horizon t+1 (filtered) ==="));
        assert!(rendered.contains("Cumulative PnL"));
    }
}
