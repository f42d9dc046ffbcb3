use chrono::{TimeZone as ChronoTimeZone, Utc};
use polars::{
    df,
    frame::DataFrame,
    prelude::{DataType, IntoLazy, TimeUnit, TimeZone, col},
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Microsecond timestamp for a minute of the March 2024 fixture window.
pub fn micros(day: u32, hour: u32, minute: u32) -> i64 {
    Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0)
        .single()
        .expect("valid fixture timestamp")
        .timestamp_micros()
}

fn with_datetime_ts(frame: DataFrame) -> DataFrame {
    frame
        .lazy()
        .with_column(col("timestamp").cast(DataType::Datetime(
            TimeUnit::Microseconds,
            Some(TimeZone::UTC),
        )))
        .collect()
        .expect("to cast fixture timestamps")
}

pub fn price_series(rows: &[(i64, f64)]) -> DataFrame {
    let (ts, px): (Vec<i64>, Vec<f64>) = rows.iter().copied().unzip();
    with_datetime_ts(
        df!(
            "timestamp" => ts,
            "mid_price" => px,
        )
        .expect("to build price fixture"),
    )
}

pub fn prediction_results(rows: &[(i64, &str)]) -> DataFrame {
    let (ts, pred): (Vec<i64>, Vec<&str>) = rows.iter().copied().unzip();
    with_datetime_ts(
        df!(
            "timestamp" => ts,
            "prediction" => pred,
        )
        .expect("to build results fixture"),
    )
}
