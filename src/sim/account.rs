use std::{fmt, sync::Arc};

use itertools::izip;
use polars::{
    df,
    frame::DataFrame,
    prelude::{DataType, Field, IntoLazy, PlSmallStr, Schema, SchemaRef, col, lit},
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::{
    config::{EvalConfig, ScoringMode},
    data::{
        align::align_events,
        domain::{Direction, Horizon, normalize_predictions},
        schema::EventCol,
    },
    error::{TradeWhispersResult, polars_err},
    report::io::{Report, ReportName, ToSchema},
};

/// One row per simulated horizon account.
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
pub enum BalanceCol {
    /// Forecast horizon in minutes.
    Horizon,
    /// Account balance after replaying every matched row.
    FinalBalance,
}

impl From<BalanceCol> for PlSmallStr {
    fn from(value: BalanceCol) -> Self {
        value.as_str().into()
    }
}

impl BalanceCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Final balances of the simulated per-horizon trading accounts.
#[derive(Debug, Clone)]
pub struct AccountBalances {
    df: DataFrame,
}

impl Default for AccountBalances {
    fn default() -> Self {
        let df = DataFrame::empty_with_schema(&Self::to_schema());
        Self { df }
    }
}

impl ReportName for AccountBalances {
    fn base_name(&self) -> String {
        "account_balances".to_string()
    }
}

impl Report for AccountBalances {
    fn as_df(&self) -> &DataFrame {
        &self.df
    }

    fn as_df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }
}

impl ToSchema for AccountBalances {
    fn to_schema() -> SchemaRef {
        let fields: Vec<Field> = BalanceCol::iter()
            .map(|col| {
                let dtype = match col {
                    BalanceCol::Horizon => DataType::UInt32,
                    BalanceCol::FinalBalance => DataType::Float64,
                };
                Field::new(col.into(), dtype)
            })
            .collect();

        Arc::new(Schema::from_iter(fields))
    }
}

impl AccountBalances {
    fn from_records(
        records: impl IntoIterator<Item = (Horizon, f64)>,
    ) -> TradeWhispersResult<Self> {
        let (horizons, balances): (Vec<u32>, Vec<f64>) = records
            .into_iter()
            .map(|(h, balance)| (h.minutes(), balance))
            .unzip();

        if horizons.is_empty() {
            return Ok(Self::default());
        }

        let df = df!(
            BalanceCol::Horizon.to_string() => horizons,
            BalanceCol::FinalBalance.to_string() => balances,
        )
        .map_err(|e| polars_err("building account balances", e))?;

        Ok(Self { df })
    }

    /// Final balance for the given horizon, if it was simulated.
    pub fn final_balance(&self, horizon: Horizon) -> Option<f64> {
        let horizons = self
            .df
            .column(BalanceCol::Horizon.as_str())
            .ok()?
            .u32()
            .ok()?;
        let balances = self
            .df
            .column(BalanceCol::FinalBalance.as_str())
            .ok()?
            .f64()
            .ok()?;

        izip!(horizons, balances)
            .find(|(h, _)| *h == Some(horizon.minutes()))
            .and_then(|(_, balance)| balance)
    }
}

impl fmt::Display for AccountBalances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10}{:>16}", "horizon", "final_balance")?;
        let horizons = self
            .df
            .column(BalanceCol::Horizon.as_str())
            .and_then(|c| c.u32().cloned())
            .map_err(|_| fmt::Error)?;
        let balances = self
            .df
            .column(BalanceCol::FinalBalance.as_str())
            .and_then(|c| c.f64().cloned())
            .map_err(|_| fmt::Error)?;

        for (horizon, balance) in izip!(&horizons, &balances) {
            if let (Some(h), Some(b)) = (horizon, balance) {
                writeln!(f, "{:>10}{:>16.4}", Horizon(h).to_string(), b)?;
            }
        }
        Ok(())
    }
}

/// Replays predictions over realized returns, compounding one account per
/// horizon from `cfg.starting_balance`.
///
/// Rows are consumed strictly in the joined table's order, which follows the
/// stage table's order: stage input sorted by timestamp ascending is a
/// precondition, and violating it silently changes the replay sequence
/// without an error. The configured pip threshold is not consulted here:
/// the simulation trusts the prediction column as-is, unlike the evaluation
/// engine, which relabels ground truth with it.
#[tracing::instrument(skip_all, fields(mode = %cfg.mode))]
pub fn simulate(
    stage: &DataFrame,
    results: &DataFrame,
    cfg: &EvalConfig,
) -> TradeWhispersResult<AccountBalances> {
    let aligned = align_events(stage, results)?;
    let joined = normalize_predictions(aligned.as_df())?;

    let finals = cfg
        .horizons
        .par_iter()
        .map(|h| simulate_horizon(&joined, *h, cfg))
        .collect::<TradeWhispersResult<Vec<_>>>()?;

    AccountBalances::from_records(finals.into_iter().flatten())
}

fn simulate_horizon(
    joined: &DataFrame,
    horizon: Horizon,
    cfg: &EvalConfig,
) -> TradeWhispersResult<Option<(Horizon, f64)>> {
    let ret_col = horizon.column_name();
    if joined.column(ret_col.as_str()).is_err() {
        tracing::warn!(%horizon, "stage table has no forward-return column for horizon, skipping");
        return Ok(None);
    }

    let mut lf = joined.clone().lazy().filter(
        col(ret_col.clone())
            .is_not_null()
            .and(col(EventCol::Prediction).is_not_null()),
    );
    if cfg.mode == ScoringMode::Filtered {
        lf = lf.filter(col(EventCol::Prediction).neq(lit(Direction::Stable.as_str())));
    }
    let rows = lf
        .collect()
        .map_err(|e| polars_err("preparing simulation rows", e))?;

    let path = replay(&rows, &ret_col, cfg.starting_balance)?;
    let final_balance = path.last().copied().unwrap_or(cfg.starting_balance);

    tracing::debug!(%horizon, rows = rows.height(), final_balance, "replayed horizon");

    Ok(Some((horizon, final_balance)))
}

/// Running balance after each consumed row, in the frame's row order.
/// Nothing is re-sorted: the order of `rows` is the replay sequence.
pub(crate) fn replay(
    rows: &DataFrame,
    ret_col: &PlSmallStr,
    starting_balance: f64,
) -> TradeWhispersResult<Vec<f64>> {
    let returns = rows
        .column(ret_col.as_str())
        .map_err(|e| polars_err("reading forward returns", e))?
        .f64()
        .map_err(|e| polars_err("reading forward returns", e))?;
    let predictions = rows
        .column(EventCol::Prediction.as_str())
        .map_err(|e| polars_err("reading predictions", e))?
        .str()
        .map_err(|e| polars_err("reading predictions", e))?;

    let mut balance = starting_balance;
    let mut path = Vec::with_capacity(rows.height());
    for (ret, pred) in izip!(returns, predictions) {
        match (ret, pred.and_then(|p| p.parse::<Direction>().ok())) {
            (Some(r), Some(Direction::Increase)) => balance *= 1.0 + r,
            (Some(r), Some(Direction::Decrease)) => balance *= 1.0 - r,
            _ => {}
        }
        path.push(balance);
    }
    Ok(path)
}
