mod data;
mod eval;
mod report;
mod sim;
pub mod config;
pub mod error;

pub use config::{EvalConfig, ScoringMode};
pub use data::align::{AlignedEvents, align_events};
pub use data::domain::{Direction, Horizon, PIP, normalize_predictions};
pub use data::returns::ForwardReturnTable;
pub use data::schema::EventCol;
pub use eval::label::{direction_label, direction_label_expr, signed_label, signed_label_expr};
pub use eval::metrics::{ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use eval::summary::{EvalCol, EvaluationSummary};
pub use eval::{Evaluation, HorizonEvaluation, evaluate};
pub use report::io::{FileExtension, Report, ReportName, ToCsv, ToJson, ToSchema};
pub use sim::account::{AccountBalances, BalanceCol, simulate};
