use polars::{
    frame::DataFrame,
    prelude::{IntoLazy, JoinArgs, JoinType, MaintainOrderJoin, col},
};

use crate::{
    data::schema::{EventCol, ensure_column, ensure_timestamp},
    error::{TradeWhispersResult, polars_err},
};

/// Result of joining prediction results onto the stage table.
#[derive(Debug, Clone)]
pub struct AlignedEvents {
    df: DataFrame,
    result_rows: u32,
    matched_rows: u32,
}

impl AlignedEvents {
    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }

    /// Total rows in the results table, before joining.
    pub fn result_rows(&self) -> u32 {
        self.result_rows
    }

    /// Rows that survived the timestamp join.
    pub fn matched_rows(&self) -> u32 {
        self.matched_rows
    }
}

/// Inner-joins the results table onto the stage table by timestamp.
///
/// The stage table is reduced to one row per timestamp first (first
/// occurrence wins), so an incidental duplicate timestamp cannot fan a
/// result row out into several joined rows. The results table is taken
/// as-is: every result row whose timestamp exists in stage appears in the
/// join, duplicates included. Result rows without a stage match are silently
/// dropped; a difference between result-row and joined-row counts is
/// reported as an informational notice, never an error.
///
/// Stage rows are expected to be sorted by timestamp ascending; the join
/// preserves stage order and downstream consumers rely on it.
#[tracing::instrument(skip_all)]
pub fn align_events(stage: &DataFrame, results: &DataFrame) -> TradeWhispersResult<AlignedEvents> {
    let stage = ensure_timestamp(stage, "stage")?;
    let results = ensure_timestamp(results, "results")?;
    ensure_column(&results, EventCol::Prediction, "results")?;

    let deduped = stage
        .lazy()
        .group_by_stable([col(EventCol::Timestamp)])
        .agg([col("*").first()]);

    let mut args = JoinArgs::new(JoinType::Inner);
    args.maintain_order = MaintainOrderJoin::Left;

    let joined = deduped
        .join(
            results
                .clone()
                .lazy()
                .select([col(EventCol::Timestamp), col(EventCol::Prediction)]),
            [col(EventCol::Timestamp)],
            [col(EventCol::Timestamp)],
            args,
        )
        .collect()
        .map_err(|e| polars_err("joining stage and results", e))?;

    let result_rows = results.height() as u32;
    let matched_rows = joined.height() as u32;
    if matched_rows != result_rows {
        tracing::info!(
            result_rows,
            matched_rows,
            "joined row count differs from results row count"
        );
    }

    Ok(AlignedEvents {
        df: joined,
        result_rows,
        matched_rows,
    })
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

    fn stage_frame(rows: &[(i64, f64)]) -> DataFrame {
        let (ts, ret): (Vec<i64>, Vec<f64>) = rows.iter().copied().unzip();
        with_datetime_ts(
            df!(
                EventCol::Timestamp.to_string() => ts.iter().map(|t| t * MINUTE_US).collect::<Vec<_>>(),
                "forward_return_t+1" => ret,
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

    #[test]
    fn duplicate_stage_timestamps_do_not_fan_out() {
        let stage = stage_frame(&[(1, 0.1), (1, 0.9), (2, 0.2)]);
        let results = results_frame(&[(1, "Em alta"), (2, "Manter")]);

        let aligned = align_events(&stage, &results).expect("to align");

        assert_eq!(aligned.matched_rows(), 2);
        assert_eq!(aligned.result_rows(), 2);

        // First occurrence wins the dedup.
        let rets: Vec<Option<f64>> = aligned
            .as_df()
            .column("forward_return_t+1")
            .expect("column")
            .f64()
            .expect("f64 column")
            .into_iter()
            .collect();
        assert_eq!(rets, vec![Some(0.1), Some(0.2)]);
    }

    #[test]
    fn result_rows_keep_their_multiplicity() {
        let stage = stage_frame(&[(1, 0.1), (2, 0.2)]);
        let results = results_frame(&[(1, "Em alta"), (1, "Em baixa"), (2, "Manter")]);

        let aligned = align_events(&stage, &results).expect("to align");
        assert_eq!(aligned.matched_rows(), 3);
        assert_eq!(aligned.result_rows(), 3);
    }

    #[test]
    fn unmatched_result_rows_are_dropped_not_fatal() {
        let stage = stage_frame(&[(1, 0.1)]);
        let results = results_frame(&[(1, "Em alta"), (5, "Manter")]);

        let aligned = align_events(&stage, &results).expect("to align");
        assert_eq!(aligned.result_rows(), 2);
        assert_eq!(aligned.matched_rows(), 1);
    }

    #[test]
    fn join_preserves_stage_row_order() {
        let stage = stage_frame(&[(1, 0.1), (2, 0.2), (3, 0.3)]);
        let results = results_frame(&[(3, "Manter"), (1, "Em alta"), (2, "Em baixa")]);

        let aligned = align_events(&stage, &results).expect("to align");
        let ts: Vec<Option<i64>> = aligned
            .as_df()
            .column(EventCol::Timestamp.as_str())
            .expect("column")
            .datetime()
            .expect("datetime column")
            .physical()
            .into_iter()
            .collect();
        assert_eq!(
            ts,
            vec![
                Some(MINUTE_US),
                Some(2 * MINUTE_US),
                Some(3 * MINUTE_US)
            ]
        );
    }

    #[test]
    fn missing_prediction_column_is_fatal() {
        let stage = stage_frame(&[(1, 0.1)]);
        let results = with_datetime_ts(
            df!(EventCol::Timestamp.to_string() => &[MINUTE_US]).expect("to build results"),
        );

        assert!(align_events(&stage, &results).is_err());
    }
}
