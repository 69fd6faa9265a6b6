//! Integration tests for the analyzer.
//!
//! Drives the full capture pipeline with the synthetic and WAV backends, so
//! no audio hardware is needed.

use std::time::{Duration, Instant};

use spectra_analysis::{SpectrumMask, Waveform, import_psd_table, to_i16};
use spectra_io::{
    Analyzer, AnalyzerSettings, AnalyzerState, Error, FaultPlan, SyntheticAcquisition,
    WavAcquisition,
};

const FS: u32 = 48000;
const N: usize = 4096;
/// Bin 64 of a 4096-point transform at 48 kHz.
const TONE_HZ: f64 = 750.0;
const TONE_BIN: usize = 64;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn settings() -> AnalyzerSettings {
    AnalyzerSettings {
        device: None,
        channels: 2,
        sample_rate: FS,
        dft_size: N,
    }
}

/// Channel 0 carries the tone, channel 1 is silent.
fn tone_source() -> SyntheticAcquisition {
    SyntheticAcquisition::new(TONE_HZ, 0.5).with_channel_tone(1, Waveform::Sine, TONE_HZ, 0.0)
}

fn analyzer(source: SyntheticAcquisition) -> Analyzer {
    let mut analyzer = Analyzer::new(settings(), Box::new(source)).unwrap();
    analyzer.init().unwrap();
    analyzer
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Wait for at least `count` more blocks than have been processed now.
fn wait_blocks(analyzer: &Analyzer, count: u64) {
    let target = analyzer.block_count() + count;
    assert!(
        wait_until(|| analyzer.block_count() >= target),
        "analyzer stalled at block {}",
        analyzer.block_count()
    );
}

// ===========================================================================
// 1. State machine
// ===========================================================================

#[test]
fn init_start_stop_cycle() {
    let analyzer = analyzer(tone_source());
    assert_eq!(analyzer.state(), AnalyzerState::Stopped);
    assert_eq!(analyzer.block_count(), 0);

    analyzer.start().unwrap();
    assert_eq!(analyzer.state(), AnalyzerState::Running);
    wait_blocks(&analyzer, 3);

    analyzer.stop().unwrap();
    assert_eq!(analyzer.state(), AnalyzerState::Stopped);
    // At most one block was in flight when stop returned.
    std::thread::sleep(Duration::from_millis(50));
    let frozen = analyzer.block_count();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(analyzer.block_count(), frozen);

    analyzer.start().unwrap();
    wait_blocks(&analyzer, 1);
}

#[test]
fn stopped_analyzer_processes_nothing() {
    let analyzer = analyzer(tone_source());
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(analyzer.block_count(), 0);
    assert_eq!(analyzer.find_peak(0), None);
}

#[test]
fn init_failure_stays_not_initialized() {
    let source = tone_source().with_faults(FaultPlan {
        fail_open: true,
        ..FaultPlan::default()
    });
    let mut analyzer = Analyzer::new(settings(), Box::new(source)).unwrap();
    assert!(matches!(analyzer.init(), Err(Error::Device(_))));
    assert_eq!(analyzer.state(), AnalyzerState::NotInitialized);
    // The acquisition is kept; a retry reports the same failure, not a panic.
    assert!(analyzer.init().is_err());
}

#[test]
fn odd_channel_count_rejected() {
    let bad = AnalyzerSettings {
        channels: 3,
        ..settings()
    };
    assert!(matches!(
        Analyzer::new(bad, Box::new(tone_source())),
        Err(Error::InvalidSettings(_))
    ));
}

#[test]
#[should_panic(expected = "analyzer not initialized")]
fn query_before_init_panics() {
    let analyzer = Analyzer::new(settings(), Box::new(tone_source())).unwrap();
    let _ = analyzer.find_peak(0);
}

#[test]
#[should_panic(expected = "analyzer not initialized")]
fn start_before_init_panics() {
    let analyzer = Analyzer::new(settings(), Box::new(tone_source())).unwrap();
    let _ = analyzer.start();
}

#[test]
#[should_panic(expected = "out of range")]
fn channel_out_of_range_panics() {
    let analyzer = analyzer(tone_source());
    let _ = analyzer.find_peak(2);
}

#[test]
#[should_panic(expected = "out of range")]
fn bin_out_of_range_panics() {
    let analyzer = analyzer(tone_source());
    let _ = analyzer.power_spectral_density(0, N);
}

// ===========================================================================
// 2. Queries
// ===========================================================================

#[test]
fn peak_and_levels_of_synthetic_tone() {
    let analyzer = analyzer(tone_source());
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 2);
    analyzer.stop().unwrap();

    assert_eq!(analyzer.find_peak(0), Some(TONE_BIN));
    assert_eq!(analyzer.find_peak(1), None);
    assert_eq!(analyzer.peak_frequency(0), Some(TONE_HZ));
    assert_eq!(analyzer.analog_frequency(TONE_BIN), TONE_HZ);
    assert!((analyzer.analog_resolution() - 11.71875).abs() < 1e-12);
    assert_eq!(analyzer.sampling_frequency(), FS);
    assert_eq!(analyzer.dft_size(), N);

    assert!((analyzer.amplitude(0) - 0.5).abs() < 1e-3);
    assert!((analyzer.rms(0) - 0.5 / 2f64.sqrt()).abs() < 1e-3);
    assert_eq!(analyzer.amplitude(1), 0.0);

    let peak_db = analyzer.power_spectral_density_decibels(0, TONE_BIN);
    assert!(peak_db > -10.0 && peak_db < 0.0, "peak level {peak_db} dB");
    // The silent half of a pair only picks up rounding residue.
    assert!(analyzer.power_spectral_density(1, TONE_BIN) < 1e-20);
}

#[test]
fn snri_in_and_out_of_band() {
    let analyzer = analyzer(tone_source());
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 2);
    analyzer.stop().unwrap();

    assert!(analyzer.snri(0, 700.0, 800.0) > 40.0);
    assert!(analyzer.snri(0, 5000.0, 6000.0) < -40.0);
}

#[test]
fn snapshot_matches_individual_queries() {
    let analyzer = analyzer(tone_source());
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 2);
    analyzer.stop().unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let snapshot = analyzer.snapshot(0);
    assert_eq!(snapshot.channel, 0);
    assert_eq!(snapshot.peak.index, Some(TONE_BIN));
    assert_eq!(snapshot.peak_frequency, Some(TONE_HZ));
    assert_eq!(snapshot.amplitude, analyzer.amplitude(0));
    assert!(snapshot.mask.is_clean());
    // Stopped, so the stored block is the last one counted.
    assert_eq!(snapshot.block, analyzer.block_count());
    assert_eq!(analyzer.snapshot(1).block, snapshot.block);
}

// ===========================================================================
// 3. Masks
// ===========================================================================

#[test]
fn mask_trips_then_clears_with_passband() {
    let analyzer = analyzer(tone_source());
    analyzer.reset_mask(0, 30.0);
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 2);

    let mask = analyzer.mask(0).expect("mask attached");
    assert_eq!(mask.thresholds.len(), N / 2);
    assert!(mask.scan.error_count >= 1);
    assert_eq!(mask.scan.first_trespass_frequency(), TONE_HZ);

    analyzer.set_mask_band(0, 700.0, 800.0, 0.0);
    // The block in flight may still use the old curve.
    wait_blocks(&analyzer, 2);
    let mask = analyzer.mask(0).unwrap();
    assert_eq!(mask.scan.error_count, 0);
    assert!(mask.scan.first_trespass_frequency().is_nan());
    assert!(mask.scan.last_trespass_value().is_nan());

    assert!(analyzer.mask(1).is_none());
}

#[test]
fn mask_offset_moves_the_curve() {
    let analyzer = analyzer(tone_source());
    analyzer.reset_mask(0, 30.0);
    analyzer.set_mask_offset(0, 40.0);
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 2);
    assert!(analyzer.mask(0).unwrap().scan.is_clean());
    assert_eq!(analyzer.mask(0).unwrap().vertical_offset, 40.0);
}

#[test]
fn concurrent_mask_mutation_never_tears() {
    let analyzer = analyzer(tone_source());
    analyzer.reset_mask(0, 30.0);
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 1);

    let narrow = vec![-30.0; N / 2];
    let wide = vec![-90.0; N / 2];
    let mut passband = wide.clone();
    // 700..=800 Hz at 11.71875 Hz per bin covers bins 59..=69.
    passband[59..=69].fill(0.0);

    let done = std::sync::atomic::AtomicBool::new(false);
    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..200 {
                analyzer.reset_mask(0, 30.0);
                analyzer.reset_mask(0, 90.0);
                analyzer.set_mask_band(0, 700.0, 800.0, 0.0);
            }
            done.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        let mut last_block = 0;
        let mut reads = 0;
        while !done.load(std::sync::atomic::Ordering::SeqCst) || reads < 100 {
            let mask = analyzer.mask(0).expect("mask stays attached");
            assert!(
                mask.thresholds == narrow || mask.thresholds == wide || mask.thresholds == passband,
                "torn mask curve"
            );
            let scan = mask.scan;
            assert_eq!(scan.error_count == 0, scan.first.is_none());
            assert_eq!(scan.error_count == 0, scan.last.is_none());

            let snapshot = analyzer.snapshot(0);
            assert_eq!(snapshot.mask.error_count == 0, snapshot.mask.first.is_none());
            assert_eq!(snapshot.mask.error_count == 0, snapshot.mask.last.is_none());
            assert_eq!(snapshot.peak.index, Some(TONE_BIN));
            assert!(snapshot.block >= last_block, "block tag went backwards");
            last_block = snapshot.block;
            reads += 1;
        }
    });

    assert_eq!(analyzer.state(), AnalyzerState::Running);
    assert!(analyzer.mask(0).unwrap().thresholds == passband);
}

#[test]
#[should_panic(expected = "sample rate")]
fn mask_for_another_sample_rate_panics() {
    let analyzer = analyzer(tone_source());
    analyzer.set_mask(0, SpectrumMask::new(44100, N));
}

#[test]
fn silent_channel_never_trips_mask() {
    let analyzer = analyzer(tone_source());
    analyzer.reset_mask(1, 200.0);
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 2);
    assert!(analyzer.mask(1).unwrap().scan.is_clean());
}

// ===========================================================================
// 4. Faults
// ===========================================================================

#[test]
fn overruns_are_counted_and_absorbed() {
    let analyzer = analyzer(tone_source().with_faults(FaultPlan::overruns([2, 5])));
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 10);

    assert_eq!(analyzer.overrun_count(), 2);
    assert_eq!(analyzer.state(), AnalyzerState::Running);
    assert_eq!(analyzer.find_peak(0), Some(TONE_BIN));
}

#[test]
fn failed_overrun_recovery_keeps_capturing() {
    let faults = FaultPlan {
        fail_recover: true,
        ..FaultPlan::overruns([2])
    };
    let analyzer = analyzer(tone_source().with_faults(faults));
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 5);
    let before = analyzer.block_count();
    wait_blocks(&analyzer, 3);

    assert_eq!(analyzer.overrun_count(), 1);
    assert_eq!(analyzer.state(), AnalyzerState::Running);
    assert!(analyzer.block_count() > before);
    assert_eq!(analyzer.find_peak(0), Some(TONE_BIN));
}

#[test]
fn fatal_fault_crashes_and_freezes() {
    let analyzer = analyzer(tone_source().with_faults(FaultPlan::fatal(5)));
    analyzer.start().unwrap();
    assert!(wait_until(|| analyzer.state() == AnalyzerState::Crashed));

    let frozen = analyzer.block_count();
    assert_eq!(frozen, 5);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(analyzer.block_count(), frozen);

    // Last good values remain readable.
    assert_eq!(analyzer.find_peak(0), Some(TONE_BIN));
    assert!(analyzer.snri(0, 700.0, 800.0) > 40.0);

    assert!(matches!(analyzer.start(), Err(Error::Crashed)));
    assert!(matches!(analyzer.stop(), Err(Error::Crashed)));
    assert_eq!(analyzer.state(), AnalyzerState::Crashed);
}

#[test]
fn wav_replay_runs_to_end_of_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: FS,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..N * 3 {
        let phase = 2.0 * std::f64::consts::PI * TONE_HZ * i as f64 / f64::from(FS);
        writer.write_sample(to_i16(0.25 * phase.cos())).unwrap();
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    let mut analyzer = Analyzer::new(settings(), Box::new(WavAcquisition::new(&path))).unwrap();
    analyzer.init().unwrap();
    analyzer.start().unwrap();
    assert!(wait_until(|| analyzer.state() == AnalyzerState::Crashed));
    assert_eq!(analyzer.block_count(), 3);
    assert_eq!(analyzer.find_peak(0), Some(TONE_BIN));
}

// ===========================================================================
// 5. Dump
// ===========================================================================

#[test]
fn dump_psd_writes_half_spectrum_table() {
    let analyzer = analyzer(tone_source());
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 2);
    analyzer.stop().unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psd.txt");
    analyzer.dump_psd(&path).unwrap();

    let table = import_psd_table(&path).unwrap();
    assert_eq!(table.frequencies.len(), N / 2);
    assert_eq!(table.channels.len(), 2);
    assert!((table.frequencies[TONE_BIN] - TONE_HZ).abs() < 1e-3);
    let expected = analyzer.power_spectral_density(0, TONE_BIN);
    assert!((table.channels[0][TONE_BIN] - expected).abs() / expected < 1e-7);
    assert!(table.channels[1].iter().all(|&p| p < 1e-20));
}

#[test]
fn drop_joins_running_capture_thread() {
    let analyzer = analyzer(tone_source().realtime(true));
    analyzer.start().unwrap();
    wait_blocks(&analyzer, 1);
    drop(analyzer);
}
