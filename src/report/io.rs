use std::{fs, path::Path};

use polars::{
    frame::DataFrame,
    prelude::{
        CsvWriterOptions, IntoLazy, JsonFormat, JsonWriter, PlPath, SchemaRef, SerWriter,
        SinkOptions, SinkTarget,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{DataError, IoError, TradeWhispersResult};

// ================================================================================================
// Traits
// ================================================================================================

/// Common interface for all tabular report types.
pub trait Report {
    /// Access the underlying DataFrame (Immutable).
    fn as_df(&self) -> &DataFrame;

    /// Access the underlying DataFrame (Mutable).
    fn as_df_mut(&mut self) -> &mut DataFrame;
}

pub trait ReportName {
    fn base_name(&self) -> String;

    fn filename(&self, ext: FileExtension) -> String {
        format!("{}.{}", self.base_name(), ext)
    }
}

pub trait ToSchema {
    /// Returns the canonical schema for this report type.
    fn to_schema() -> SchemaRef;
}

pub trait ToJson {
    /// Serializes the report to a generic JSON Value.
    /// Returns a `Value::Array` containing row objects.
    fn to_json(&self) -> TradeWhispersResult<Value>;
}

pub trait ToCsv {
    /// Writes the report to `<dir>/<base_name>.csv`.
    ///
    /// The directory is created if missing and an existing file is
    /// overwritten.
    fn to_csv(
        &self,
        dir: impl AsRef<Path>,
        opts: Option<&CsvWriterOptions>,
        sink_opts: Option<&SinkOptions>,
    ) -> TradeWhispersResult<()>;
}

// ================================================================================================
// Blanket Implementations
// ================================================================================================

impl<T> ToJson for T
where
    T: Report,
{
    fn to_json(&self) -> TradeWhispersResult<Value> {
        df_to_json_array(self.as_df())
    }
}

impl<T> ToCsv for T
where
    T: Report + ReportName,
{
    fn to_csv(
        &self,
        dir: impl AsRef<Path>,
        opts: Option<&CsvWriterOptions>,
        sink_opts: Option<&SinkOptions>,
    ) -> TradeWhispersResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            IoError::FileSystem(format!("Cannot create directory {}: {e}", dir.display()))
        })?;

        let file_path = dir.join(self.filename(FileExtension::Csv));
        let uri = file_path.to_str().ok_or_else(|| {
            IoError::FileSystem(format!("Non-UTF-8 path: {}", file_path.display()))
        })?;

        let sink_plan = self
            .as_df()
            .clone()
            .lazy()
            .sink_csv(
                SinkTarget::Path(PlPath::new(uri)),
                opts.cloned().unwrap_or_default(),
                None,
                sink_opts.cloned().unwrap_or_default(),
            )
            .map_err(|e| DataError::DataFrame(format!("Cannot build CSV sink plan: {e}")))?;

        let _ = sink_plan.collect().map_err(|e| {
            DataError::DataFrame(format!("Writing CSV to '{}' failed: {e}", file_path.display()))
        })?;

        Ok(())
    }
}

// ================================================================================================
// Helper Functions
// ================================================================================================

/// Round-trips the frame through polars' JSON writer into a
/// `Value::Array` of row objects.
fn df_to_json_array(df: &DataFrame) -> TradeWhispersResult<Value> {
    if df.height() == 0 {
        return Ok(Value::Array(Vec::new()));
    }

    let mut buf = Vec::with_capacity(df.height() * df.width() * (1 << 6));
    JsonWriter::new(&mut buf)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df.clone())
        .map_err(|e| DataError::DataFrame(e.to_string()))?;

    let rows: Value = serde_json::from_slice(&buf).map_err(IoError::Json)?;
    match rows {
        Value::Array(_) => Ok(rows),
        _ => Err(DataError::DataFrame("Polars JSON output was not an array".to_string()).into()),
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum FileExtension {
    Csv,
}
