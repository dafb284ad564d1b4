//! End-to-end behavior of the public echo canceller API.

use echokit::{Algorithm, Config, DtdState, EchoCanceller, Error};
use test_strategy::proptest;

fn noise(len: usize, seed: u64) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 40) as f32 / (1u64 << 24) as f32 - 0.5
        })
        .collect()
}

/// Runs `frames` frames of a pure echo (mic = `gain` * far delayed by
/// `delay`) and returns the outputs.
fn run_echo(
    aec: &mut EchoCanceller,
    frames: usize,
    delay: usize,
    gain: f32,
    seed: u64,
) -> Vec<Vec<f32>> {
    let frame = aec.config().frame_size;
    let signal = noise(frames * frame + delay, seed);
    let mut outputs = Vec::with_capacity(frames);
    for i in 0..frames {
        let start = i * frame + delay;
        let far = &signal[start..start + frame];
        let mic: Vec<f32> = signal[start - delay..start - delay + frame]
            .iter()
            .map(|s| gain * s)
            .collect();
        let mut out = vec![0.0; frame];
        aec.process_f32(&mic, Some(far), &mut out).unwrap();
        outputs.push(out);
    }
    outputs
}

#[proptest]
fn disabled_canceller_copies_input(#[strategy(1usize..2048)] len: usize, seed: u64) {
    let mut aec = EchoCanceller::new(Config::default()).unwrap();
    aec.set_enabled(false);

    let mic: Vec<i16> = noise(len, seed)
        .iter()
        .map(|s| (s * 60000.0) as i16)
        .collect();
    let speaker = vec![1000i16; len];
    let mut out = vec![0i16; len];
    aec.process_i16(&mic, Some(&speaker), &mut out).unwrap();
    assert_eq!(out, mic);

    let mut out = vec![0i16; len];
    aec.capture_i16(&mic, &mut out).unwrap();
    assert_eq!(out, mic);
    assert_eq!(aec.state().frames_processed, 0);
}

#[test]
fn reset_replays_bit_identically() {
    for algorithm in [Algorithm::Fdaf, Algorithm::Nlms] {
        let config = Config {
            algorithm,
            ..Default::default()
        };
        let mut aec = EchoCanceller::new(config).unwrap();
        let first = run_echo(&mut aec, 40, 24, 0.6, 11);
        aec.reset();
        assert_eq!(aec.state().frames_processed, 0);
        assert_eq!(aec.dtd_state(), DtdState::Idle);
        let second = run_echo(&mut aec, 40, 24, 0.6, 11);
        assert_eq!(first, second, "{algorithm:?}");
    }
}

#[test]
fn fdaf_attenuates_delayed_echo() {
    let config = Config {
        enable_dtd: false,
        enable_residual_echo_suppress: false,
        ..Default::default()
    };
    let mut aec = EchoCanceller::new(config).unwrap();
    let outputs = run_echo(&mut aec, 600, 40, 0.5, 7);

    let state = aec.state();
    assert!(state.erle_db > 6.0, "erle {}", state.erle_db);
    assert!(state.convergence > 0.0);
    assert_eq!(state.frames_processed, 600);

    let energy = |frames: &[Vec<f32>]| -> f32 {
        frames.iter().flatten().map(|s| s * s).sum()
    };
    assert!(energy(&outputs[550..]) < energy(&outputs[..50]));
}

#[test]
fn oversized_frames_pass_excess_through() {
    let config = Config {
        frame_size: 160,
        ..Default::default()
    };
    let mut aec = EchoCanceller::new(config).unwrap();
    let mic = noise(400, 5);
    let far = noise(400, 6);
    let mut out = vec![0.0; 400];
    aec.process_f32(&mic, Some(&far), &mut out).unwrap();
    assert_eq!(&out[160..], &mic[160..]);
    assert_eq!(aec.state().frames_processed, 1);
}

#[test]
fn pass_through_algorithm_only_counts_frames() {
    let config = Config {
        algorithm: Algorithm::PassThrough,
        ..Default::default()
    };
    let mut aec = EchoCanceller::new(config).unwrap();
    let mic = noise(160, 9);
    let far = noise(160, 10);
    let mut out = vec![0.0; 160];
    aec.process_f32(&mic, Some(&far), &mut out).unwrap();
    assert_eq!(out, mic);
    assert_eq!(aec.state().frames_processed, 1);
}

#[test]
fn argument_errors_leave_state_untouched() {
    let mut aec = EchoCanceller::new(Config::default()).unwrap();
    let mut out = vec![0.0; 160];
    assert_eq!(
        aec.process_f32(&[], None, &mut []),
        Err(Error::EmptyFrame)
    );
    assert_eq!(
        aec.process_f32(&[0.0; 160], Some(&[0.0; 80]), &mut out),
        Err(Error::LengthMismatch {
            expected: 160,
            actual: 80
        })
    );
    assert_eq!(aec.set_delay(-1), Err(Error::NegativeDelay(-1)));
    assert_eq!(aec.state().frames_processed, 0);
}

#[test]
fn playback_handle_feeds_capture_from_another_thread() {
    let config = Config {
        enable_delay_estimation: false,
        ..Default::default()
    };
    let mut aec = EchoCanceller::new(config).unwrap();
    aec.set_delay(320).unwrap();

    let handle = aec.playback_handle();
    let far = noise(160 * 20, 21);
    std::thread::spawn(move || {
        for chunk in far.chunks(160) {
            handle.write_f32(chunk);
        }
    })
    .join()
    .unwrap();

    let mic = noise(160, 22);
    let mut out = vec![0.0; 160];
    aec.capture_f32(&mic, &mut out).unwrap();
    assert!(out.iter().all(|s| s.is_finite()));
    assert_eq!(aec.delay(), 320);
    assert!(aec.state().delay_stable);
}

#[test]
fn split_mode_estimates_delay_and_cancels_echo() {
    let config = Config {
        enable_dtd: false,
        enable_residual_echo_suppress: false,
        ..Default::default()
    };
    let mut aec = EchoCanceller::new(config).unwrap();
    let frame = aec.config().frame_size;
    let delay = 400;
    let frames = 400;
    let played = noise(frames * frame, 33);
    let mut out = vec![0.0; frame];

    for n in 0..frames {
        let start = n * frame;
        aec.playback_f32(&played[start..start + frame]);
        let mic: Vec<f32> = (start..start + frame)
            .map(|i| i.checked_sub(delay).map_or(0.0, |j| 0.5 * played[j]))
            .collect();
        aec.capture_f32(&mic, &mut out).unwrap();
    }

    let state = aec.state();
    assert!(
        (state.estimated_delay_samples - delay as i32).abs() <= 1,
        "delay {}",
        state.estimated_delay_samples
    );
    assert!(state.delay_stable);
    assert!(state.erle_db > 6.0, "erle {}", state.erle_db);
    assert_eq!(state.frames_processed, frames as u64);
}
