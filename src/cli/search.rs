use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use mzsparse::binning::{bin_peaks, BinningConfig};
use mzsparse::formats::read_peak_csv;
use mzsparse::index::{search_ranked, Hit};

use super::ServiceArgs;

/// Search the index with a query spectrum read from a two-column CSV.
pub fn run(
    input: PathBuf,
    bin_width: Option<f64>,
    limit: usize,
    no_payload: bool,
    service: &ServiceArgs,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Query file does not exist: {}", input.display());
    }

    let file_config = service.load_config()?;
    let client = service.connect(&file_config)?;

    let bin_width = bin_width
        .or(file_config.ingest.bin_width)
        .unwrap_or(BinningConfig::DEFAULT_BIN_WIDTH);
    let binning = BinningConfig::new(bin_width)?;

    let peaks = read_peak_csv(&input)
        .with_context(|| format!("Failed to read query CSV: {}", input.display()))?;
    let query = bin_peaks(&peaks, &binning).context("Query spectrum has invalid peaks")?;

    if query.is_empty() {
        anyhow::bail!("Query spectrum is empty after binning; nothing to search");
    }

    info!(
        "searching collection {} with {} query bins (limit {})",
        client.collection(),
        query.len(),
        limit
    );

    let hits = search_ranked(&client, &query, limit, !no_payload)?;

    if hits.is_empty() {
        println!("No hits.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        print_hit(rank + 1, hit);
    }

    Ok(())
}

fn payload_name(hit: &Hit) -> Option<&str> {
    let payload = hit.payload.as_ref()?;
    payload
        .get("NAME")
        .or_else(|| payload.get("Name"))
        .and_then(|v| v.as_str())
}

fn print_hit(rank: usize, hit: &Hit) {
    let name = payload_name(hit).unwrap_or("-");
    let score = format!("{:.6}", hit.score);

    #[cfg(feature = "colorized_output")]
    {
        use console::style;
        println!(
            "{:>3}. {} score={} name={}",
            rank,
            style(&hit.id).bold(),
            style(score).green(),
            name
        );
    }

    #[cfg(not(feature = "colorized_output"))]
    println!("{:>3}. {} score={} name={}", rank, hit.id, score, name);
}
