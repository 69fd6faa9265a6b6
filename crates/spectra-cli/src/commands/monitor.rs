//! Live analysis monitor.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Args;
use serde::Serialize;
use spectra_config::AnalyzerConfig;
use spectra_io::{Analyzer, AnalyzerState, ChannelSnapshot};

use super::common::{SourceArgs, build_analyzer, effective_config, format_db};

/// Polling period of the monitor loop.
const POLL: Duration = Duration::from_millis(10);

#[derive(Args)]
pub struct MonitorArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Print one JSON object per report instead of a table
    #[arg(long)]
    json: bool,

    /// Stop after this many blocks have been analyzed
    #[arg(short, long)]
    blocks: Option<u64>,

    /// Report interval in milliseconds (overrides display.interval_ms)
    #[arg(short, long)]
    interval: Option<u64>,
}

/// One report line in `--json` mode.
#[derive(Serialize)]
struct MonitorLine {
    block: u64,
    state: AnalyzerState,
    overruns: u64,
    sample_rate: u32,
    channels: Vec<ChannelReport>,
}

#[derive(Serialize)]
struct ChannelReport {
    #[serde(flatten)]
    snapshot: ChannelSnapshot,
    snri_db: Option<f64>,
}

pub fn run(args: MonitorArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = effective_config(config_path, &args.source)?;
    if let Some(interval) = args.interval {
        config.display.interval_ms = interval.max(1);
    }

    let analyzer = build_analyzer(&config, args.source.fail_after)?;
    let interval = Duration::from_millis(config.display.interval_ms);

    if !args.json {
        println!(
            "Monitoring {} channel(s) at {} Hz, {}-point transform ({:.2} Hz/bin)",
            analyzer.channel_count(),
            analyzer.sampling_frequency(),
            analyzer.dft_size(),
            analyzer.analog_resolution()
        );
        println!("Press Ctrl+C to stop.\n");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    analyzer.start()?;

    let mut reported = 0;
    let mut last_report = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(POLL);

        if analyzer.state() == AnalyzerState::Crashed {
            report(&analyzer, &config, args.json)?;
            anyhow::bail!(
                "analyzer crashed after {} block(s); see log for the acquisition error",
                analyzer.block_count()
            );
        }

        let blocks = analyzer.block_count();
        if let Some(limit) = args.blocks
            && blocks >= limit
        {
            break;
        }
        if blocks > reported && last_report.elapsed() >= interval {
            report(&analyzer, &config, args.json)?;
            reported = blocks;
            last_report = Instant::now();
        }
    }

    analyzer.stop()?;
    report(&analyzer, &config, args.json)?;
    tracing::debug!(
        blocks = analyzer.block_count(),
        overruns = analyzer.overrun_count(),
        "monitor finished"
    );
    Ok(())
}

fn report(analyzer: &Analyzer, config: &AnalyzerConfig, json: bool) -> anyhow::Result<()> {
    let channels: Vec<ChannelReport> = (0..analyzer.channel_count())
        .map(|channel| ChannelReport {
            snapshot: analyzer.snapshot(channel),
            snri_db: config.snri.map(|band| analyzer.snri(channel, band.f1, band.f2)),
        })
        .collect();

    if json {
        let line = MonitorLine {
            block: analyzer.block_count(),
            state: analyzer.state(),
            overruns: analyzer.overrun_count(),
            sample_rate: analyzer.sampling_frequency(),
            channels,
        };
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    println!(
        "block {} [{}] overruns {}",
        analyzer.block_count(),
        analyzer.state(),
        analyzer.overrun_count()
    );
    println!("  ch    peak Hz  peak dB   amp dB   rms dB  snri dB  mask");
    for report in &channels {
        let s = &report.snapshot;
        let peak_hz = s
            .peak_frequency
            .map_or_else(|| "        -".to_string(), |f| format!("{f:9.1}"));
        let mask = if config.masks_for(s.channel).next().is_none() {
            "-".to_string()
        } else if s.mask.is_clean() {
            "ok".to_string()
        } else {
            format!(
                "{} bin(s), {:.1}..{:.1} Hz",
                s.mask.error_count,
                s.mask.first_trespass_frequency(),
                s.mask.last_trespass_frequency()
            )
        };
        println!(
            "  {:>2}  {}  {}  {}  {}  {}  {}",
            s.channel,
            peak_hz,
            format_db(s.peak_db),
            format_db(20.0 * s.amplitude.log10()),
            format_db(20.0 * s.rms.log10()),
            report.snri_db.map_or_else(|| "      -".to_string(), format_db),
            mask
        );
    }
    println!();
    Ok(())
}
