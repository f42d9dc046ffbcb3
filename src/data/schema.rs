use polars::{
    frame::DataFrame,
    prelude::{DataType, IntoLazy, PlSmallStr, StrptimeOptions, TimeUnit, TimeZone, col, lit},
};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{DataError, TradeWhispersResult};

/// Canonical column names shared by the price series, the stage table and
/// the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum EventCol {
    /// Event or tick timestamp (UTC, microsecond precision).
    Timestamp,
    /// Mid price of the instrument at the tick.
    MidPrice,
    /// Raw or normalized categorical prediction.
    Prediction,
    /// Threshold-derived three-way label of the realized move.
    GroundTruth,
}

impl From<EventCol> for PlSmallStr {
    fn from(value: EventCol) -> Self {
        value.as_str().into()
    }
}

impl EventCol {
    pub fn name(&self) -> PlSmallStr {
        (*self).into()
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Ensures `table` carries a usable timestamp column and returns the frame
/// with that column as a datetime.
///
/// A missing column or a string column with unparseable values is fatal;
/// everything else about input quality is handled downstream by null
/// propagation.
pub(crate) fn ensure_timestamp(df: &DataFrame, table: &str) -> TradeWhispersResult<DataFrame> {
    let ts = EventCol::Timestamp;
    let column = df.column(ts.as_str()).map_err(|_| DataError::MissingColumn {
        table: table.to_string(),
        column: ts.to_string(),
    })?;

    match column.dtype() {
        DataType::Datetime(_, _) => Ok(df.clone()),
        DataType::String => df
            .clone()
            .lazy()
            .with_column(col(ts).str().to_datetime(
                Some(TimeUnit::Microseconds),
                Some(TimeZone::UTC),
                StrptimeOptions {
                    strict: true,
                    ..Default::default()
                },
                lit("raise"),
            ))
            .collect()
            .map_err(|e| {
                DataError::TimestampParse {
                    table: table.to_string(),
                    column: ts.to_string(),
                    msg: e.to_string(),
                }
                .into()
            }),
        other => Err(DataError::TimestampParse {
            table: table.to_string(),
            column: ts.to_string(),
            msg: format!("expected datetime values, found dtype {other}"),
        }
        .into()),
    }
}

/// Ensures `table` carries the given column, without touching its dtype.
pub(crate) fn ensure_column(
    df: &DataFrame,
    column: EventCol,
    table: &str,
) -> TradeWhispersResult<()> {
    df.column(column.as_str())
        .map_err(|_| DataError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })?;
    Ok(())
}
