use lofi_pulse_core::{
    kick_train, AnalyserConfig, AppConfig, BeatLoop, PcmAnalyser, PlaybackClock, RecordedSource,
    RecordedTick,
};

fn recorded_tick(time_ms: f64, active: bool, bass: u8) -> RecordedTick {
    let mut frequency = vec![20; 128];
    frequency[..19].fill(bass);
    RecordedTick {
        time_ms,
        active,
        frequency,
        time: vec![128; 128],
    }
}

#[test]
fn replayed_pulse_train_locks_on_and_resets_on_stop() {
    let mut ticks = Vec::new();
    for tick in 0..600u32 {
        let time_ms = f64::from(tick) * 10.0;
        let bass = if tick > 0 && tick % 50 == 0 { 255 } else { 20 };
        ticks.push(recorded_tick(time_ms, true, bass));
    }
    for tick in 600..620u32 {
        ticks.push(recorded_tick(f64::from(tick) * 10.0, false, 0));
    }

    let config = AppConfig::default();
    let mut beat_loop = BeatLoop::new(RecordedSource::new(ticks), &config.levels);
    let mut outputs = Vec::new();
    loop {
        let Some(time_ms) = beat_loop.source().current().map(|tick| tick.time_ms) else {
            break;
        };
        outputs.push(beat_loop.tick(time_ms));
        if !beat_loop.source_mut().advance() {
            break;
        }
    }

    assert_eq!(outputs.len(), 620);
    assert!(outputs.windows(2).all(|pair| pair[1].sequence > pair[0].sequence));

    let playing = &outputs[599];
    assert!(playing.active);
    assert_eq!(playing.summary.bpm, 120);
    assert_eq!(playing.summary.confidence, 1.0);
    assert!(playing.levels.bass > 0.0);

    let stopped = &outputs[600];
    assert!(!stopped.active);
    assert_eq!(stopped.summary.bpm, 0);
    assert_eq!(stopped.summary.confidence, 0.0);
    assert_eq!(beat_loop.state().smoothed_bpm(), 0.0);
}

#[test]
fn pulse_fades_out_when_playback_pauses() {
    let mut ticks = Vec::new();
    for tick in 0..=60u32 {
        let bass = if tick == 60 { 255 } else { 20 };
        ticks.push(recorded_tick(f64::from(tick) * 10.0, true, bass));
    }
    for tick in 61..70u32 {
        ticks.push(recorded_tick(f64::from(tick) * 10.0, false, 0));
    }

    let mut beat_loop = BeatLoop::new(RecordedSource::new(ticks), &AppConfig::default().levels);
    let mut outputs = Vec::new();
    while let Some(time_ms) = beat_loop.source().current().map(|tick| tick.time_ms) {
        outputs.push(beat_loop.tick(time_ms));
        beat_loop.source_mut().advance();
    }

    assert!(outputs[60].summary.is_beat);
    let intensities: Vec<f32> = outputs[60..]
        .iter()
        .map(|output| output.summary.beat_intensity)
        .collect();
    let expected = [1.0, 0.95, 0.90, 0.85, 0.80, 0.75, 0.70, 0.65, 0.60, 0.55];
    assert_eq!(intensities.len(), expected.len());
    for (got, want) in intensities.iter().zip(expected) {
        assert!((got - want).abs() < 1e-5, "expected {want}, got {got}");
    }
    assert_eq!(beat_loop.state().smoothed_bpm(), 0.0);
}

#[test]
fn synthetic_kicks_through_the_analyser() {
    let config = AnalyserConfig {
        smoothing_time_constant: 0.0,
        ..Default::default()
    };
    let sample_rate = config.sample_rate;
    let samples_per_tick = (sample_rate / 60) as usize;
    let pcm = kick_train(120.0, 10.0, sample_rate);

    let mut analyser = PcmAnalyser::new(config).unwrap();
    analyser.set_active(true);
    let mut beat_loop = BeatLoop::new(analyser, &AppConfig::default().levels);
    let mut clock = PlaybackClock::default();

    let mut beats = 0;
    let mut last = None;
    for chunk in pcm.chunks(samples_per_tick) {
        beat_loop.source_mut().push_samples(chunk);
        let output = beat_loop.tick(clock.now_ms());
        beats += usize::from(output.summary.is_beat);
        last = Some(output);
        clock.advance(1000.0 / 60.0);
    }

    let last = last.unwrap();
    assert!(beats >= 10);
    assert!((i64::from(last.summary.bpm) - 120).abs() <= 3);
}
