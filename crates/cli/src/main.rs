//! CLI tool for turning spreadsheet rows into slide decks.

use anyhow::{Context, Result};
use clap::Parser;
use present_core::config::default_base_dir;
use present_core::{
    BrowserRenderer, Config, Pipeline, ResourceResolver, RowOutcome, SheetReport, TemplateFiller,
};
use present_pptx::PptxAssembler;
use std::path::PathBuf;

/// Render every row of every sheet through an HTML template and collect the
/// screenshots into one PowerPoint deck per sheet.
#[derive(Parser, Debug)]
#[command(name = "present-me")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base directory holding data.xlsx, template.html and the decorative assets
    /// (default: ~/Desktop/present_me)
    #[arg(short, long, env = "PRESENT_ME_DIR")]
    dir: Option<PathBuf>,

    /// Configuration file (default: present_me.toml in the base directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Browser executable used for screenshots
    #[arg(short, long)]
    browser: Option<PathBuf>,

    /// Keep downloaded media in resource_images/ across runs
    #[arg(long)]
    persist_cache: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    println!("=== Present Me PPT Generator ===");

    run(&args)
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    let workbook_path = config.workbook_path();
    let sheets = present_xlsx::read_workbook(&workbook_path)
        .with_context(|| format!("Failed to read workbook {}", workbook_path.display()))?;

    let template_path = config.template_path();
    let filler = TemplateFiller::from_file(&template_path, config.resolved_assets())
        .with_context(|| format!("Failed to read template {}", template_path.display()))?;

    let resolver = ResourceResolver::from_config(&config).context("Failed to set up media resolution")?;
    let renderer = BrowserRenderer::from_config(&config).context("No usable browser for screenshots")?;
    let assembler = PptxAssembler::new(config.resolved_assets());

    if args.verbose {
        eprintln!("Base directory: {}", config.base_dir.display());
        eprintln!("Browser: {}", renderer.browser().display());
        eprintln!("Found {} sheet(s)", sheets.len());
    }

    let mut pipeline = Pipeline::new(
        config,
        resolver,
        filler,
        Box::new(renderer),
        Box::new(assembler),
    );

    for sheet in &sheets {
        println!("\nGenerating PPT for sheet: {}", sheet.name);

        let report = pipeline
            .process_sheet(sheet, print_outcome)
            .with_context(|| format!("Failed to build deck for sheet '{}'", sheet.name))?;

        print_report(&report);
    }

    println!("\nAll done.");
    Ok(())
}

/// Defaults, then the config file, then command-line flags.
fn load_config(args: &Args) -> Result<Config> {
    let base_dir = args.dir.clone().unwrap_or_else(default_base_dir);

    let mut config = Config::load(&base_dir, args.config.as_deref())
        .with_context(|| format!("Failed to load configuration for {}", base_dir.display()))?;

    if let Some(browser) = &args.browser {
        config.render.browser = Some(browser.clone());
    }
    if args.persist_cache {
        config.cache.persist = true;
    }

    config.validate().context("Invalid configuration")?;
    log::debug!("Using base directory {}", config.base_dir.display());
    Ok(config)
}

fn print_outcome(outcome: &RowOutcome) {
    let row = outcome.row_index() + 1;
    match outcome {
        RowOutcome::Rendered {
            artifact,
            media_warning: None,
        } => println!("✅ Row {}: {}", row, artifact.path.display()),
        RowOutcome::Rendered {
            artifact,
            media_warning: Some(reason),
        } => println!(
            "⚠️ Row {}: {} (without media: {})",
            row,
            artifact.path.display(),
            reason
        ),
        RowOutcome::Skipped { reason, .. } => println!("❌ Row {}: skipped, {}", row, reason),
        RowOutcome::RenderFailed { error, .. } => println!("❌ Row {}: render failed, {}", row, error),
    }
}

fn print_report(report: &SheetReport) {
    println!(
        "✅ PPT saved: {} ({} slides)",
        report.deck.path.display(),
        report.deck.slide_count
    );
    if report.failed_count() > 0 {
        println!(
            "⚠️ {} of {} row(s) left out of '{}'",
            report.failed_count(),
            report.outcomes.len(),
            report.sheet
        );
    }
}
