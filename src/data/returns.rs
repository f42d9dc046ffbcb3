use polars::{
    frame::DataFrame,
    prelude::{
        Expr, IntoLazy, JoinArgs, JoinType, MaintainOrderJoin, Null, SortMultipleOptions, col, lit,
        when,
    },
};

use crate::{
    data::{
        domain::Horizon,
        schema::{EventCol, ensure_column, ensure_timestamp},
    },
    error::{TradeWhispersResult, polars_err},
    eval::label::signed_label_expr,
};

/// Price series enriched with one realized forward-return column per horizon.
///
/// Returns never look across a calendar-day boundary: a horizon value is
/// populated iff the series still has an observation `h` minutes ahead on
/// the same day. The day boundary is the per-day maximum timestamp,
/// computed once and broadcast over the day's rows.
#[derive(Debug, Clone)]
pub struct ForwardReturnTable {
    df: DataFrame,
    horizons: Vec<Horizon>,
}

impl ForwardReturnTable {
    /// Builds the table from a `(timestamp, mid_price)` series.
    ///
    /// The series is sorted by timestamp before returns are computed. The
    /// `h`-step return pairs each row with the row `h` positions ahead, so
    /// the series is expected to hold one observation per minute within a
    /// trading day.
    #[tracing::instrument(skip_all, fields(horizons = horizons.len()))]
    pub fn from_prices(prices: DataFrame, horizons: &[Horizon]) -> TradeWhispersResult<Self> {
        let prices = ensure_timestamp(&prices, "price series")?;
        ensure_column(&prices, EventCol::MidPrice, "price series")?;

        let ts = || col(EventCol::Timestamp);
        let day_end = ts().max().over([ts().dt().truncate(lit("1d"))]);

        let return_cols: Vec<Expr> = horizons
            .iter()
            .map(|h| {
                let future = col(EventCol::MidPrice).shift(lit(-i64::from(h.minutes())));
                let within_day = (day_end.clone() - ts())
                    .dt()
                    .total_minutes()
                    .gt_eq(lit(i64::from(h.minutes())));
                when(within_day)
                    .then(future - col(EventCol::MidPrice))
                    .otherwise(lit(Null {}))
                    .alias(h.column_name())
            })
            .collect();

        let df = prices
            .lazy()
            .sort([EventCol::Timestamp.as_str()], SortMultipleOptions::default())
            .with_columns(return_cols)
            .collect()
            .map_err(|e| polars_err("building forward returns", e))?;

        Ok(Self {
            df,
            horizons: horizons.to_vec(),
        })
    }

    /// Left-joins an event table onto the return table by exact timestamp.
    ///
    /// Every event row is retained, matched or not, except rows where all
    /// horizon columns end up null; a row with at least one realized horizon
    /// survives. Events without an exact price match therefore drop out of a
    /// multi-horizon table.
    pub fn attach_events(&self, events: DataFrame) -> TradeWhispersResult<DataFrame> {
        let events = ensure_timestamp(&events, "events")?;

        let any_realized = self
            .horizons
            .iter()
            .map(|h| col(h.column_name()).is_not_null())
            .reduce(|a, b| a.or(b))
            .unwrap_or_else(|| lit(true));

        let mut args = JoinArgs::new(JoinType::Left);
        args.maintain_order = MaintainOrderJoin::Left;

        events
            .lazy()
            .join(
                self.df.clone().lazy(),
                [col(EventCol::Timestamp)],
                [col(EventCol::Timestamp)],
                args,
            )
            .filter(any_realized)
            .collect()
            .map_err(|e| polars_err("attaching events to forward returns", e))
    }

    /// Replaces every horizon column with its signed three-way encoding
    /// (see [`signed_label_expr`]), leaving the rest of the table untouched.
    ///
    /// The threshold is interpreted in the columns' own units.
    pub fn encode_outcomes(&self, threshold: Option<f64>) -> TradeWhispersResult<DataFrame> {
        let encoded: Vec<Expr> = self
            .horizons
            .iter()
            .map(|h| signed_label_expr(col(h.column_name()), threshold).alias(h.column_name()))
            .collect();

        self.df
            .clone()
            .lazy()
            .with_columns(encoded)
            .collect()
            .map_err(|e| polars_err("encoding outcomes", e))
    }

    pub fn horizons(&self) -> &[Horizon] {
        &self.horizons
    }

    pub fn as_df(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }
}
