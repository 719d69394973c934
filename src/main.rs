//! Shelf-φ: pricing analysis and churn modelling CLI
//!
//! `shelfphi pricing <data_dir>` summarises price per unit across unit groups
//! and product categories; `shelfphi churn <customers.csv>` tunes, selects and
//! evaluates churn classifiers.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use console::style;

use shelfphi::cli::{confirm_overwrite, ChurnArgs, Cli, Commands, PricingArgs};
use shelfphi::pipeline::churn::{
    evaluate, load_customers, prepare_family, select_model, split_data, Label, ModelFamily, Stage,
};
use shelfphi::pipeline::{load_retail_tables, normalize_products, PriceAnalyzer, PricingPlan};
use shelfphi::report::{
    display_evaluation, display_search, export_product_averages, package_reports, product_csv_path, run_plan,
    write_json, ChurnReport, CustomerStats, PricingReport, ReportMetadata, RetailStats, CHURN_REPORT_FILE,
    PRICING_REPORT_FILE,
};
use shelfphi::utils::{
    create_spinner, create_trial_bar, finish, print_banner,
    print_completion, print_config, print_count, print_info, print_step_header, print_step_time,
    print_success, print_warning, Outcome,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    print_banner(env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Pricing(args) => run_pricing(&cli, args),
        Commands::Churn(args) => run_churn(&cli, args),
    }
}

fn run_pricing(cli: &Cli, args: &PricingArgs) -> Result<()> {
    let mut plan = match &args.plan {
        Some(path) => PricingPlan::load(path)?,
        None => PricingPlan::default(),
    };
    if let Some(bins) = args.bins {
        plan.histogram_bins = bins;
    }

    let plan_name = args
        .plan
        .as_ref()
        .map_or_else(|| "default".to_string(), |p| p.display().to_string());
    print_config(
        "Pricing analysis",
        cli.input(),
        &cli.output_dir,
        &[
            ("Plan", plan_name),
            ("Analyses", plan.analyses.len().to_string()),
            ("Histogram bins", plan.histogram_bins.to_string()),
        ],
    );

    // Step 1: Load tables
    print_step_header(1, "Load Retail Tables");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading products, transactions and demographics...");
    let tables = load_retail_tables(&args.data_dir, cli.infer_schema_length)?;
    finish(&spinner, Outcome::Success, "Tables loaded");

    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Products: {}", tables.products.len());
    println!("      Transactions: {}", tables.transactions.len());
    println!("      Households: {}", tables.demographics.len());
    print_step_time(step_start.elapsed());

    // Step 2: Normalize package sizes
    print_step_header(2, "Normalize Package Sizes");
    let step_start = Instant::now();
    let products = normalize_products(&tables.products);
    print_count(
        "product(s) with a parseable package size",
        products.len(),
        Some(&format!("(of {})", tables.products.len())),
    );
    let unparsed = products.iter().filter(|p| p.package_size.is_none()).count();
    if unparsed > 0 {
        print_info(&format!("{} product(s) have a non-numeric size and are never priced", unparsed));
    }
    print_step_time(step_start.elapsed());

    // Step 3: Analyses
    print_step_header(3, "Price-per-Unit Analyses");
    let step_start = Instant::now();
    let analyzer = PriceAnalyzer::new(&products, &tables.transactions, &tables.demographics);
    let outcomes = run_plan(&analyzer, &plan)?;
    print_success(&format!("{} analyses complete", outcomes.len()));
    print_step_time(step_start.elapsed());

    for outcome in &outcomes {
        outcome.display();
    }

    // Step 4: Export
    print_step_header(4, "Save Reports");
    let json_path = cli.output_file(PRICING_REPORT_FILE);
    let mut files = vec![json_path.clone()];
    files.extend(outcomes.iter().map(|o| product_csv_path(&cli.output_dir, o)));
    if !prepare_output(cli, &files, "pricing")? {
        return Ok(());
    }

    let report = PricingReport {
        metadata: ReportMetadata::new("pricing", &[args.data_dir.as_path()]),
        dataset: RetailStats {
            products: tables.products.len(),
            normalized_products: products.len(),
            transactions: tables.transactions.len(),
            demographics: tables.demographics.len(),
        },
        histogram_bins: plan.histogram_bins,
        analyses: outcomes,
    };
    write_json(&report, &json_path)?;
    for outcome in &report.analyses {
        export_product_averages(outcome, &product_csv_path(&cli.output_dir, outcome))?;
    }
    finish_output(cli, &files, "pricing")?;

    print_completion("pricing analysis");
    Ok(())
}

fn run_churn(cli: &Cli, args: &ChurnArgs) -> Result<()> {
    let options = args.training_options();

    print_config(
        "Churn modelling",
        cli.input(),
        &cli.output_dir,
        &[
            ("Seed", options.seed.to_string()),
            ("Train fraction", options.train_fraction.to_string()),
            ("Folds", options.folds.to_string()),
            ("Threshold", args.threshold.to_string()),
            ("Spline grid levels", options.mars_levels.to_string()),
            ("Forest grid levels", options.forest_levels.to_string()),
        ],
    );

    // Step 1: Load customers
    print_step_header(1, "Load Customers");
    let step_start = Instant::now();
    let spinner = create_spinner("Reading customer records...");
    let table = load_customers(&args.input, cli.infer_schema_length, &args.drop_columns)?;
    finish(&spinner, Outcome::Success, "Customers loaded");

    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", table.len());
    println!("      Predictors: {}", table.predictors.len());
    println!(
        "      Left / Current: {} / {}",
        table.count(Label::Left),
        table.count(Label::Current)
    );
    if table.dropped_rows > 0 {
        print_warning(&format!(
            "Dropped {} row(s) with missing tenure or charges",
            table.dropped_rows
        ));
    }
    print_step_time(step_start.elapsed());

    // Step 2: Split
    print_step_header(2, &Stage::Split.to_string());
    let data = split_data(&table, &options)?;
    print_success(&format!(
        "{} training / {} test rows",
        data.split.train.len(),
        data.split.test.len()
    ));

    // Step 3: Resample, preprocess and search each family
    print_step_header(3, &Stage::GridSearched.to_string());
    let step_start = Instant::now();
    let mut searches = Vec::new();
    for family in ModelFamily::ALL {
        let spinner = create_spinner(&format!("{}: {}...", family, Stage::RecipeBuilt));
        let prepared = prepare_family(&data, family, &options)?;
        spinner.finish_and_clear();

        let pb = create_trial_bar(&family.to_string(), prepared.trial_count());
        let search = prepared.search(Some(&pb));
        match search.best() {
            Some(best) => finish(
                &pb,
                Outcome::Success,
                &format!("{}: best AUC {:.4} ({})", family, best.mean_auc, best.config),
            ),
            None => finish(&pb, Outcome::Warning, &format!("{}: no fold produced an AUC", family)),
        }
        searches.push(search);
    }
    print_step_time(step_start.elapsed());

    // Step 4: Select and refit
    print_step_header(4, &format!("{} and {}", Stage::ModelSelected, Stage::FinalFit));
    let selected = select_model(&searches)?;
    print_info(&format!(
        "{} selected: {} (CV AUC {:.4})",
        selected.family(),
        selected.config(),
        selected.cv_auc()
    ));
    let spinner = create_spinner("Fitting on the full training set...");
    let model = selected.fit(&data, &options)?;
    finish(&spinner, Outcome::Success, "Final model fitted");

    // Step 5: Evaluate
    print_step_header(5, &Stage::Evaluated.to_string());
    let evaluation = evaluate(&model, &data, args.threshold);
    display_search(&searches, &evaluation);
    display_evaluation(&evaluation);

    // Step 6: Export
    print_step_header(6, "Save Reports");
    let json_path = cli.output_file(CHURN_REPORT_FILE);
    let files = vec![json_path.clone()];
    if !prepare_output(cli, &files, "churn")? {
        return Ok(());
    }
    let report = ChurnReport {
        metadata: ReportMetadata::new("churn", &[args.input.as_path()]),
        dataset: CustomerStats {
            rows: table.len(),
            dropped_rows: table.dropped_rows,
            left: table.count(Label::Left),
            current: table.count(Label::Current),
            predictors: table.predictor_names(),
            train_rows: data.split.train.len(),
            test_rows: data.split.test.len(),
        },
        options,
        searches,
        evaluation,
    };
    write_json(&report, &json_path)?;
    finish_output(cli, &files, "churn")?;

    print_completion("churn modelling");
    Ok(())
}

/// Create the output directory and confirm overwrites; `false` means the user declined
fn prepare_output(cli: &Cli, files: &[PathBuf], pipeline: &str) -> Result<bool> {
    std::fs::create_dir_all(&cli.output_dir)?;
    let mut targets = files.to_vec();
    if cli.bundle {
        targets.push(cli.bundle_path(pipeline));
    }
    if !confirm_overwrite(&targets, cli.no_confirm)? {
        print_info("Existing reports kept; nothing written");
        return Ok(false);
    }
    Ok(true)
}

/// Report written files, bundling them when requested
fn finish_output(cli: &Cli, files: &[PathBuf], pipeline: &str) -> Result<()> {
    if cli.bundle {
        let zip_path = cli.bundle_path(pipeline);
        package_reports(files, &zip_path)?;
        print_success(&format!("Reports bundled into {}", zip_path.display()));
    } else {
        for file in files {
            print_success(&format!("Saved {}", file.display()));
        }
    }
    Ok(())
}
