use std::fmt;

use crate::data::domain::Direction;

/// Precision, recall, F1 and support for a single class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u32,
}

impl ClassMetrics {
    const ZERO: ClassMetrics = ClassMetrics {
        precision: 0.0,
        recall: 0.0,
        f1: 0.0,
        support: 0,
    };
}

/// Confusion matrix over a fixed label set.
///
/// Rows are true labels, columns predicted labels. Pairs with either side
/// outside the label set are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    labels: Vec<Direction>,
    counts: Vec<u32>,
}

impl ConfusionMatrix {
    pub fn from_pairs(pairs: &[(Direction, Direction)], labels: &[Direction]) -> Self {
        let n = labels.len();
        let mut counts = vec![0_u32; n * n];
        for (truth, predicted) in pairs {
            if let (Some(i), Some(j)) = (index_of(labels, *truth), index_of(labels, *predicted)) {
                counts[i * n + j] += 1;
            }
        }
        Self {
            labels: labels.to_vec(),
            counts,
        }
    }

    pub fn labels(&self) -> &[Direction] {
        &self.labels
    }

    /// Count of rows with the given true and predicted label; 0 for labels
    /// outside the matrix's set.
    pub fn count(&self, truth: Direction, predicted: Direction) -> u32 {
        match (
            index_of(&self.labels, truth),
            index_of(&self.labels, predicted),
        ) {
            (Some(i), Some(j)) => self.counts[i * self.labels.len() + j],
            _ => 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = 10;
        write!(f, "{:>width$}", "")?;
        for label in &self.labels {
            write!(f, "{:>width$}", label.as_str())?;
        }
        writeln!(f)?;
        for truth in &self.labels {
            write!(f, "{:>width$}", truth.as_str())?;
            for predicted in &self.labels {
                write!(f, "{:>width$}", self.count(*truth, *predicted))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Per-class classification metrics with macro and support-weighted
/// averages.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    per_class: Vec<(Direction, ClassMetrics)>,
    macro_avg: ClassMetrics,
    weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Computes metrics for each label in `labels` over the given
    /// (true, predicted) pairs. Classes with no predicted or no true members
    /// score 0 for the affected metric, never an error. Pairs whose true
    /// label lies outside `labels` still count toward false positives of the
    /// listed classes.
    pub fn from_pairs(pairs: &[(Direction, Direction)], labels: &[Direction]) -> Self {
        let per_class: Vec<(Direction, ClassMetrics)> = labels
            .iter()
            .map(|label| {
                let tp = pairs
                    .iter()
                    .filter(|(t, p)| t == label && p == label)
                    .count() as f64;
                let predicted = pairs.iter().filter(|(_, p)| p == label).count() as f64;
                let actual = pairs.iter().filter(|(t, _)| t == label).count() as f64;

                let precision = if predicted == 0.0 { 0.0 } else { tp / predicted };
                let recall = if actual == 0.0 { 0.0 } else { tp / actual };
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };

                (
                    *label,
                    ClassMetrics {
                        precision,
                        recall,
                        f1,
                        support: actual as u32,
                    },
                )
            })
            .collect();

        let total_support: u32 = per_class.iter().map(|(_, m)| m.support).sum();
        let class_count = per_class.len() as f64;

        let macro_avg = if per_class.is_empty() {
            ClassMetrics::ZERO
        } else {
            ClassMetrics {
                precision: per_class.iter().map(|(_, m)| m.precision).sum::<f64>() / class_count,
                recall: per_class.iter().map(|(_, m)| m.recall).sum::<f64>() / class_count,
                f1: per_class.iter().map(|(_, m)| m.f1).sum::<f64>() / class_count,
                support: total_support,
            }
        };

        let weighted_avg = if total_support == 0 {
            ClassMetrics::ZERO
        } else {
            let weight = |metric: fn(&ClassMetrics) -> f64| {
                per_class
                    .iter()
                    .map(|(_, m)| metric(m) * f64::from(m.support))
                    .sum::<f64>()
                    / f64::from(total_support)
            };
            ClassMetrics {
                precision: weight(|m| m.precision),
                recall: weight(|m| m.recall),
                f1: weight(|m| m.f1),
                support: total_support,
            }
        };

        Self {
            per_class,
            macro_avg,
            weighted_avg,
        }
    }

    pub fn class(&self, label: Direction) -> Option<&ClassMetrics> {
        self.per_class
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, m)| m)
    }

    pub fn per_class(&self) -> &[(Direction, ClassMetrics)] {
        &self.per_class
    }

    pub fn macro_avg(&self) -> &ClassMetrics {
        &self.macro_avg
    }

    pub fn weighted_avg(&self) -> &ClassMetrics {
        &self.weighted_avg
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14}{:>11}{:>9}{:>10}{:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (label, m) in &self.per_class {
            writeln!(
                f,
                "{:>14}{:>11.2}{:>9.2}{:>10.2}{:>10}",
                label.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        for (name, m) in [
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ] {
            writeln!(
                f,
                "{:>14}{:>11.2}{:>9.2}{:>10.2}{:>10}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}

fn index_of(labels: &[Direction], label: Direction) -> Option<usize> {
    labels.iter().position(|l| *l == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::Direction::{Decrease, Increase, Stable};

    fn sample_pairs() -> Vec<(Direction, Direction)> {
        // (truth, predicted)
        vec![
            (Increase, Increase),
            (Increase, Decrease),
            (Decrease, Decrease),
            (Decrease, Decrease),
            (Stable, Increase),
        ]
    }

    #[test]
    fn confusion_counts() {
        let cm = ConfusionMatrix::from_pairs(&sample_pairs(), &Direction::all());
        assert_eq!(cm.count(Increase, Increase), 1);
        assert_eq!(cm.count(Increase, Decrease), 1);
        assert_eq!(cm.count(Decrease, Decrease), 2);
        assert_eq!(cm.count(Stable, Increase), 1);
        assert_eq!(cm.count(Stable, Stable), 0);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn confusion_ignores_pairs_outside_the_label_set() {
        let cm = ConfusionMatrix::from_pairs(&sample_pairs(), &Direction::traded());
        // The (Stable, Increase) pair has no row in a 2x2 trade matrix.
        assert_eq!(cm.total(), 4);
        assert_eq!(cm.count(Stable, Increase), 0);
    }

    #[test]
    fn report_counts_out_of_set_truths_as_false_positives() {
        let report = ClassificationReport::from_pairs(&sample_pairs(), &Direction::traded());

        // Increase: tp = 1, predicted = 2 (one Stable truth predicted
        // Increase), actual = 2.
        let inc = report.class(Increase).expect("increase metrics");
        assert_eq!(inc.precision, 0.5);
        assert_eq!(inc.recall, 0.5);
        assert_eq!(inc.support, 2);

        // Decrease: tp = 2, predicted = 3, actual = 2.
        let dec = report.class(Decrease).expect("decrease metrics");
        assert_eq!(dec.precision, 2.0 / 3.0);
        assert_eq!(dec.recall, 1.0);
        assert_eq!(dec.support, 2);
    }

    #[test]
    fn zero_division_scores_zero() {
        let pairs = vec![(Increase, Increase)];
        let report = ClassificationReport::from_pairs(&pairs, &Direction::all());

        let stable = report.class(Stable).expect("stable metrics");
        assert_eq!(stable.precision, 0.0);
        assert_eq!(stable.recall, 0.0);
        assert_eq!(stable.f1, 0.0);
        assert_eq!(stable.support, 0);
    }

    #[test]
    fn averages() {
        let report = ClassificationReport::from_pairs(&sample_pairs(), &Direction::traded());

        let macro_avg = report.macro_avg();
        assert!((macro_avg.precision - (0.5 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        assert_eq!(macro_avg.support, 4);

        let weighted = report.weighted_avg();
        assert!((weighted.precision - (0.5 * 2.0 + 2.0 / 3.0 * 2.0) / 4.0).abs() < 1e-12);
        assert_eq!(weighted.support, 4);
    }

    #[test]
    fn render_is_aligned_and_complete() {
        let report = ClassificationReport::from_pairs(&sample_pairs(), &Direction::all());
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("Decrease"));
        assert!(text.contains("weighted avg"));

        let cm = ConfusionMatrix::from_pairs(&sample_pairs(), &Direction::all());
        let grid = cm.to_string();
        assert!(grid.contains("Stable"));
    }
}
