use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use mzsparse::formats::{MspReader, TabularReader};
use mzsparse::pipeline::{IdRule, IngestReport, IngestionPipeline};

use super::{IngestArgs, ServiceArgs};

/// Ingest an MSP peak-list library.
pub fn run_msp(
    input: PathBuf,
    id_key: Option<String>,
    ingest: &IngestArgs,
    service: &ServiceArgs,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let file_config = service.load_config()?;
    let client = service.connect(&file_config)?;
    let config = ingest
        .pipeline_config(&file_config)?
        .with_id_rule(IdRule::Generated {
            original_id_key: id_key,
        });

    info!("mzSparse - MSP ingestion");
    info!("Input:      {}", input.display());
    info!("Collection: {}", client.collection());
    info!("Bin width:  {}", config.binning().bin_width());
    info!("Batch size: {}", config.batch_size());

    let reader = MspReader::open(&input)
        .with_context(|| format!("Failed to open MSP file: {}", input.display()))?;

    let pipeline = IngestionPipeline::new(&client, config);
    let report = pipeline.run(reader);

    print_report(&report);
    fail_on_lost_batches(&report)
}

/// Ingest a tabular CSV of (id, mass_list_json, intensity_list_json) rows.
pub fn run_table(
    input: PathBuf,
    limit: Option<usize>,
    ingest: &IngestArgs,
    service: &ServiceArgs,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let file_config = service.load_config()?;
    let client = service.connect(&file_config)?;
    let config = ingest.pipeline_config(&file_config)?;

    info!("mzSparse - tabular ingestion");
    info!("Input:      {}", input.display());
    info!("Collection: {}", client.collection());
    info!("Bin width:  {}", config.binning().bin_width());
    info!("Batch size: {}", config.batch_size());
    if let Some(limit) = limit {
        info!("Row limit:  {limit}");
    }

    let reader = TabularReader::open(&input)
        .with_context(|| format!("Failed to open CSV file: {}", input.display()))?;

    let pipeline = IngestionPipeline::new(&client, config);
    let report = match limit {
        Some(n) => pipeline.run(reader.take(n)),
        None => pipeline.run(reader),
    };

    print_report(&report);
    fail_on_lost_batches(&report)
}

fn fail_on_lost_batches(report: &IngestReport) -> Result<()> {
    if report.batches_failed > 0 {
        anyhow::bail!(
            "{} of {} batches failed; identifiers are stable, so re-running the same input re-submits them",
            report.batches_failed,
            report.batches_submitted
        );
    }
    Ok(())
}

fn print_report(report: &IngestReport) {
    #[cfg(feature = "colorized_output")]
    {
        use console::style;

        println!("{}", style("Ingestion report").bold().cyan());
        println!("  Records seen:      {}", report.records_seen);
        println!(
            "  Records succeeded: {}",
            style(report.records_succeeded).green()
        );
        println!(
            "  Records skipped:   {}",
            style(report.records_skipped()).yellow()
        );
        print_skip_breakdown(report);
        println!("  Batches submitted: {}", report.batches_submitted);
        if report.batches_failed > 0 {
            println!(
                "  Batches failed:    {}",
                style(report.batches_failed).red().bold()
            );
        }
        print_failed_batches(report);
        if report.cancelled {
            println!("  {}", style("Run cancelled before completion").yellow());
        }
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("Ingestion report");
        println!("  Records seen:      {}", report.records_seen);
        println!("  Records succeeded: {}", report.records_succeeded);
        println!("  Records skipped:   {}", report.records_skipped());
        print_skip_breakdown(report);
        println!("  Batches submitted: {}", report.batches_submitted);
        if report.batches_failed > 0 {
            println!("  Batches failed:    {}", report.batches_failed);
        }
        print_failed_batches(report);
        if report.cancelled {
            println!("  Run cancelled before completion");
        }
    }
}

fn print_skip_breakdown(report: &IngestReport) {
    if report.skipped_missing_id > 0 {
        println!("    missing identifier: {}", report.skipped_missing_id);
    }
    if report.skipped_domain > 0 {
        println!("    invalid peak data:  {}", report.skipped_domain);
    }
    if report.skipped_malformed_vector > 0 {
        println!("    malformed vector:   {}", report.skipped_malformed_vector);
    }
}

fn print_failed_batches(report: &IngestReport) {
    for (n, batch) in report.failed_batches.iter().enumerate() {
        println!(
            "    failed batch {} ({} points): {}",
            n + 1,
            batch.ids.len(),
            batch.error
        );
        log::debug!("failed batch {} ids: {:?}", n + 1, batch.ids);
    }
}
