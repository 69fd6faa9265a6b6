//! Capture a fixed number of blocks and write the PSD table.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use spectra_config::paths::default_dump_dir;
use spectra_io::AnalyzerState;

use super::common::{SourceArgs, build_analyzer, effective_config};

#[derive(Args)]
pub struct DumpArgs {
    /// Output file for the PSD table (defaults to a timestamped file in the
    /// user dump directory)
    output: Option<PathBuf>,

    #[command(flatten)]
    source: SourceArgs,

    /// Number of blocks to analyze before writing
    #[arg(short, long, default_value = "10")]
    blocks: u64,
}

pub fn run(args: DumpArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = effective_config(config_path, &args.source)?;
    let output = match args.output {
        Some(path) => path,
        None => {
            let dir = default_dump_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating dump directory {}", dir.display()))?;
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());
            timestamped_output(&dir, secs)
        }
    };
    let analyzer = build_analyzer(&config, args.source.fail_after)?;
    let target = args.blocks.max(1);

    let pb = ProgressBar::new(target);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({eta})")?
            .progress_chars("##-"),
    );

    analyzer.start()?;
    loop {
        if analyzer.state() == AnalyzerState::Crashed {
            pb.abandon();
            anyhow::bail!(
                "analyzer crashed after {} of {} block(s)",
                analyzer.block_count(),
                target
            );
        }
        let blocks = analyzer.block_count();
        pb.set_position(blocks.min(target));
        if blocks >= target {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    analyzer.stop()?;
    pb.finish_and_clear();

    analyzer.dump_psd(&output)?;
    println!(
        "Wrote {} bins x {} channel(s) to {}",
        analyzer.dft_size() / 2,
        analyzer.channel_count(),
        output.display()
    );
    Ok(())
}

/// Dump file name for a capture finished at `secs` since the Unix epoch.
fn timestamped_output(dir: &Path, secs: u64) -> PathBuf {
    dir.join(format!("psd-{secs}.txt"))
}
