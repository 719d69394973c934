//! Console tables for the churn model search and evaluation

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::churn::{Evaluation, FamilySearch, GridScore, ModelFamily};

/// Configurations shown per family in the leaderboard
pub const LEADERBOARD_ROWS: usize = 5;

/// Predictors shown in the importance table
pub const IMPORTANCE_ROWS: usize = 10;

fn print_section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn bold(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn auc_cell(value: f64) -> Cell {
    let cell = Cell::new(if value.is_finite() {
        format!("{:.4}", value)
    } else {
        "-".to_string()
    })
    .set_alignment(CellAlignment::Right);
    if value >= 0.8 {
        cell.fg(Color::Green)
    } else if value >= 0.7 {
        cell.fg(Color::Yellow)
    } else {
        cell
    }
}

fn defined_folds(score: &GridScore) -> String {
    let defined = score.fold_aucs.iter().flatten().count();
    format!("{}/{}", defined, score.fold_aucs.len())
}

/// Best configurations of each family by mean cross-validated AUC
pub fn leaderboard_table(searches: &[FamilySearch], rows: usize) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        bold("Family"),
        bold("Rank"),
        bold("Configuration"),
        bold("Mean AUC"),
        bold("Folds"),
    ]);

    for search in searches {
        for (rank, score) in search.top(rows).into_iter().enumerate() {
            table.add_row(vec![
                Cell::new(search.family),
                Cell::new(rank + 1),
                Cell::new(score.config),
                auc_cell(score.mean_auc),
                Cell::new(defined_folds(score)),
            ]);
        }
    }
    table
}

/// Best score per family, winner highlighted
pub fn family_table(searches: &[FamilySearch], evaluation: &Evaluation) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![bold("Family"), bold("Best configuration"), bold("Mean AUC"), bold("Trials")]);

    for search in searches {
        let winner = search.family == evaluation.family;
        let name = if winner {
            Cell::new(format!("★ {}", search.family))
                .fg(Color::Green)
                .add_attribute(Attribute::Bold)
        } else {
            Cell::new(search.family)
        };
        match search.best() {
            Some(best) => table.add_row(vec![
                name,
                Cell::new(best.config),
                auc_cell(best.mean_auc),
                Cell::new(search.scores.len()),
            ]),
            None => table.add_row(vec![name, Cell::new("-"), Cell::new("-"), Cell::new(search.scores.len())]),
        };
    }
    table
}

/// Predicted against actual status
pub fn confusion_table(evaluation: &Evaluation) -> Table {
    let m = &evaluation.confusion;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![bold("Predicted \\ Actual"), bold("Left"), bold("Current")]);
    table.add_row(vec![
        bold("Left"),
        Cell::new(m.true_left).fg(Color::Green),
        Cell::new(m.false_left).fg(Color::Red),
    ]);
    table.add_row(vec![
        bold("Current"),
        Cell::new(m.false_current).fg(Color::Red),
        Cell::new(m.true_current).fg(Color::Green),
    ]);
    table
}

/// Headline test-set metrics
pub fn metrics_table(evaluation: &Evaluation) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![bold("Metric"), bold("Value")]);

    let pct = |v: f64| Cell::new(format!("{:.1}%", v * 100.0)).set_alignment(CellAlignment::Right);
    table.add_row(vec![Cell::new("Model"), Cell::new(evaluation.family)]);
    table.add_row(vec![Cell::new("Configuration"), Cell::new(evaluation.config)]);
    let size = match evaluation.family {
        ModelFamily::Mars => format!("{} basis terms", evaluation.model_size),
        ModelFamily::Bagging | ModelFamily::RandomForest => {
            format!("{} trees", evaluation.model_size)
        }
    };
    table.add_row(vec![Cell::new("Model size"), Cell::new(size)]);
    table.add_row(vec![Cell::new("CV AUC"), auc_cell(evaluation.cv_auc)]);
    table.add_row(vec![
        Cell::new("Test AUC"),
        auc_cell(evaluation.test_auc.unwrap_or(f64::NAN)),
    ]);
    table.add_row(vec![Cell::new("Accuracy"), pct(evaluation.accuracy)]);
    table.add_row(vec![Cell::new("Sensitivity"), pct(evaluation.sensitivity)]);
    table.add_row(vec![Cell::new("Specificity"), pct(evaluation.specificity)]);
    table.add_row(vec![
        Cell::new("Revenue at risk"),
        pct(evaluation.revenue_at_risk)
            .fg(Color::Yellow)
            .add_attribute(Attribute::Bold),
    ]);
    table
}

/// Top predictors with a text bar of their scaled importance
pub fn importance_table(evaluation: &Evaluation, rows: usize) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![bold("#"), bold("Predictor"), bold("Importance"), bold("")]);
    for (rank, entry) in evaluation.importance.iter().take(rows).enumerate() {
        let bar = "█".repeat((entry.scaled / 5.0).round() as usize);
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&entry.feature),
            Cell::new(format!("{:.1}", entry.scaled)).set_alignment(CellAlignment::Right),
            Cell::new(bar).fg(Color::Cyan),
        ]);
    }
    table
}

/// Print the search leaderboard and family comparison
pub fn display_search(searches: &[FamilySearch], evaluation: &Evaluation) {
    print_section("🏁", "MODEL LEADERBOARD");
    print_indented(&leaderboard_table(searches, LEADERBOARD_ROWS));
    print_section("⚖️ ", "FAMILY COMPARISON");
    print_indented(&family_table(searches, evaluation));
}

/// Print the final test-set evaluation
pub fn display_evaluation(evaluation: &Evaluation) {
    print_section("📋", "TEST SET EVALUATION");
    print_indented(&metrics_table(evaluation));
    println!();
    println!(
        "      {} at threshold {}",
        style("Confusion matrix").cyan(),
        evaluation.threshold
    );
    print_indented(&confusion_table(evaluation));
    print_section("🔎", "FEATURE IMPORTANCE");
    print_indented(&importance_table(evaluation, IMPORTANCE_ROWS));
    println!();
    println!(
        "      {} of monthly revenue in the test set comes from customers predicted to leave",
        style(format!("{:.1}%", evaluation.revenue_at_risk * 100.0))
            .yellow()
            .bold()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::churn::{ConfusionMatrix, ImportanceEntry, ModelConfig, ModelFamily};

    fn evaluation() -> Evaluation {
        Evaluation {
            family: ModelFamily::RandomForest,
            config: ModelConfig::RandomForest {
                trees: 66,
                mtry: 2,
                min_node_size: 5,
            },
            model_size: 66,
            cv_auc: 0.83,
            test_auc: Some(0.81),
            threshold: 0.5,
            confusion: ConfusionMatrix {
                true_left: 7,
                false_left: 2,
                true_current: 18,
                false_current: 3,
            },
            accuracy: 25.0 / 30.0,
            sensitivity: 0.7,
            specificity: 0.9,
            importance: vec![
                ImportanceEntry {
                    feature: "Tenure".to_string(),
                    importance: 2.0,
                    scaled: 100.0,
                },
                ImportanceEntry {
                    feature: "MonthlyCharges".to_string(),
                    importance: 1.0,
                    scaled: 50.0,
                },
            ],
            revenue_at_risk: 0.25,
            test_rows: 30,
        }
    }

    #[test]
    fn test_confusion_table_counts() {
        let rendered = confusion_table(&evaluation()).to_string();
        assert!(rendered.contains("Predicted"));
        assert!(rendered.contains("18"));
    }

    #[test]
    fn test_importance_table_limits_rows() {
        let rendered = importance_table(&evaluation(), 1).to_string();
        assert!(rendered.contains("Tenure"));
        assert!(!rendered.contains("MonthlyCharges"));
    }

    #[test]
    fn test_metrics_table_shows_revenue() {
        let rendered = metrics_table(&evaluation()).to_string();
        assert!(rendered.contains("Revenue at risk"));
        assert!(rendered.contains("25.0%"));
        assert!(rendered.contains("0.8100"));
    }

    #[test]
    fn test_metrics_table_shows_model_size() {
        let rendered = metrics_table(&evaluation()).to_string();
        assert!(rendered.contains("66 trees"));

        let mut mars = evaluation();
        mars.family = ModelFamily::Mars;
        mars.config = ModelConfig::Mars { nprune: 10, degree: 1 };
        mars.model_size = 7;
        let rendered = metrics_table(&mars).to_string();
        assert!(rendered.contains("7 basis terms"));
    }
}
