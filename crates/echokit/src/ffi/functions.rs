//! Exported `extern "C"` functions for the echo canceller C API.
//!
//! # Symbol prefix
//!
//! All public symbols use the `echokit_aec_` prefix.
//!
//! # Buffers
//!
//! Sample buffers are 16-bit PCM. Input and output buffers must not overlap.

use std::{ptr, slice};

use crate::{Config, EchoCanceller};

use super::conversions::to_error_code;
use super::panic_guard::{ffi_guard, ffi_guard_or, ffi_guard_ptr};
use super::types::{
    EchokitAec, EchokitAecConfig, EchokitAecState, EchokitDtdState, EchokitError,
};

// ─── Lifecycle ───────────────────────────────────────────────────────

/// Returns a default-initialized configuration.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_config_default() -> EchokitAecConfig {
    EchokitAecConfig::from_rust(&Config::default())
}

/// Creates an echo canceller.
///
/// A null `config` selects the defaults. Returns `NULL` if the configuration
/// is invalid or an internal error occurs. The caller owns the returned
/// pointer and must free it with [`echokit_aec_destroy()`].
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_create(config: *const EchokitAecConfig) -> *mut EchokitAec {
    ffi_guard_ptr! {
        let config = if config.is_null() {
            Config::default()
        } else {
            // Safety: the caller guarantees a non-null pointer is valid.
            unsafe { *config }.to_rust()
        };
        match EchoCanceller::new(config) {
            Ok(inner) => Box::into_raw(Box::new(EchokitAec { inner })),
            Err(err) => {
                tracing::warn!("[aec]: echokit_aec_create failed: {}", err);
                ptr::null_mut()
            }
        }
    }
}

/// Destroys an echo canceller and frees its memory.
///
/// Passing `NULL` is a safe no-op. After this call the pointer is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_destroy(aec: *mut EchokitAec) {
    if !aec.is_null() {
        // Safety: we created this pointer via Box::into_raw in
        // echokit_aec_create, and the caller guarantees single ownership.
        let _ = unsafe { Box::from_raw(aec) };
    }
}

// ─── Processing ──────────────────────────────────────────────────────

/// Cancels echo of `speaker` from `mic` into `out`, all `frame_count`
/// samples long.
///
/// `speaker` may be `NULL`, which is treated as silence.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_process(
    aec: *mut EchokitAec,
    mic: *const i16,
    speaker: *const i16,
    out: *mut i16,
    frame_count: usize,
) -> EchokitError {
    ffi_guard! {
        if aec.is_null() || mic.is_null() || out.is_null() {
            return EchokitError::NullPointer;
        }
        if frame_count == 0 {
            return EchokitError::EmptyFrame;
        }
        // Safety: the caller guarantees the pointers are valid for
        // `frame_count` samples and that `out` does not alias the inputs.
        let (aec, mic, out) = unsafe {
            (
                &mut *aec,
                slice::from_raw_parts(mic, frame_count),
                slice::from_raw_parts_mut(out, frame_count),
            )
        };
        let speaker = (!speaker.is_null())
            // Safety: as above.
            .then(|| unsafe { slice::from_raw_parts(speaker, frame_count) });
        to_error_code(aec.inner.process_i16(mic, speaker, out))
    }
}

/// Appends `frame_count` samples of speaker output to the playback buffer.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_playback(
    aec: *const EchokitAec,
    samples: *const i16,
    frame_count: usize,
) -> EchokitError {
    ffi_guard! {
        if aec.is_null() || samples.is_null() {
            return EchokitError::NullPointer;
        }
        // Safety: the caller guarantees the pointers are valid.
        let (aec, samples) = unsafe { (&*aec, slice::from_raw_parts(samples, frame_count)) };
        aec.inner.playback_i16(samples);
        EchokitError::None
    }
}

/// Cancels echo from `mic` using the buffered playback as reference.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_capture(
    aec: *mut EchokitAec,
    mic: *const i16,
    out: *mut i16,
    frame_count: usize,
) -> EchokitError {
    ffi_guard! {
        if aec.is_null() || mic.is_null() || out.is_null() {
            return EchokitError::NullPointer;
        }
        if frame_count == 0 {
            return EchokitError::EmptyFrame;
        }
        // Safety: the caller guarantees the pointers are valid for
        // `frame_count` samples and that `out` does not alias `mic`.
        let (aec, mic, out) = unsafe {
            (
                &mut *aec,
                slice::from_raw_parts(mic, frame_count),
                slice::from_raw_parts_mut(out, frame_count),
            )
        };
        to_error_code(aec.inner.capture_i16(mic, out))
    }
}

// ─── Control ─────────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_set_enabled(aec: *mut EchokitAec, enabled: bool) -> EchokitError {
    ffi_guard! {
        if aec.is_null() {
            return EchokitError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let aec = unsafe { &mut *aec };
        aec.inner.set_enabled(enabled);
        EchokitError::None
    }
}

/// Returns `false` for a null handle.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_is_enabled(aec: *const EchokitAec) -> bool {
    ffi_guard_or! { false;
        // Safety: the caller guarantees a non-null pointer is valid.
        !aec.is_null() && unsafe { &*aec }.inner.is_enabled()
    }
}

/// Sets a known playback-to-capture delay. Zero clears it.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_set_delay(aec: *mut EchokitAec, delay_samples: i32) -> EchokitError {
    ffi_guard! {
        if aec.is_null() {
            return EchokitError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let aec = unsafe { &mut *aec };
        to_error_code(aec.inner.set_delay(delay_samples))
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_enable_delay_estimation(
    aec: *mut EchokitAec,
    enabled: bool,
) -> EchokitError {
    ffi_guard! {
        if aec.is_null() {
            return EchokitError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let aec = unsafe { &mut *aec };
        aec.inner.enable_delay_estimation(enabled);
        EchokitError::None
    }
}

/// Sets residual suppression levels in (negative) dB.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_set_suppress(
    aec: *mut EchokitAec,
    suppress_db: f32,
    suppress_active_db: f32,
) -> EchokitError {
    ffi_guard! {
        if aec.is_null() {
            return EchokitError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let aec = unsafe { &mut *aec };
        aec.inner.set_suppress(suppress_db, suppress_active_db);
        EchokitError::None
    }
}

/// Writes a state snapshot to `state_out`.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_get_state(
    aec: *const EchokitAec,
    state_out: *mut EchokitAecState,
) -> EchokitError {
    ffi_guard! {
        if aec.is_null() || state_out.is_null() {
            return EchokitError::NullPointer;
        }
        // Safety: the caller guarantees the pointers are valid.
        let aec = unsafe { &*aec };
        unsafe { ptr::write(state_out, aec.inner.state().into()) };
        EchokitError::None
    }
}

/// Returns `Idle` for a null handle.
#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_get_dtd_state(aec: *const EchokitAec) -> EchokitDtdState {
    ffi_guard_or! { EchokitDtdState::Idle;
        if aec.is_null() {
            return EchokitDtdState::Idle;
        }
        // Safety: the caller guarantees the pointer is valid.
        unsafe { &*aec }.inner.dtd_state().into()
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn echokit_aec_reset(aec: *mut EchokitAec) -> EchokitError {
    ffi_guard! {
        if aec.is_null() {
            return EchokitError::NullPointer;
        }
        // Safety: the caller guarantees the pointer is valid and not aliased.
        let aec = unsafe { &mut *aec };
        aec.inner.reset();
        EchokitError::None
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::types::EchokitAlgorithm;

    #[test]
    fn create_and_destroy() {
        let aec = echokit_aec_create(ptr::null());
        assert!(!aec.is_null());
        assert!(echokit_aec_is_enabled(aec));
        echokit_aec_destroy(aec);
    }

    #[test]
    fn destroy_null_is_safe() {
        echokit_aec_destroy(ptr::null_mut());
    }

    #[test]
    fn create_rejects_invalid_config() {
        let mut config = echokit_aec_config_default();
        config.frame_size = 4096;
        assert!(echokit_aec_create(&config).is_null());
    }

    #[test]
    fn config_default_matches_rust_default() {
        let config = echokit_aec_config_default();
        assert_eq!(config.to_rust(), Config::default());
        assert_eq!(config.algorithm, EchokitAlgorithm::Fdaf);
    }

    #[test]
    fn null_handles_return_errors() {
        let mut out = [0i16; 160];
        let mic = [0i16; 160];
        assert_eq!(
            echokit_aec_process(ptr::null_mut(), mic.as_ptr(), ptr::null(), out.as_mut_ptr(), 160),
            EchokitError::NullPointer
        );
        assert_eq!(
            echokit_aec_capture(ptr::null_mut(), mic.as_ptr(), out.as_mut_ptr(), 160),
            EchokitError::NullPointer
        );
        assert_eq!(echokit_aec_reset(ptr::null_mut()), EchokitError::NullPointer);
        assert_eq!(
            echokit_aec_get_state(ptr::null(), ptr::null_mut()),
            EchokitError::NullPointer
        );
        assert!(!echokit_aec_is_enabled(ptr::null()));
        assert_eq!(echokit_aec_get_dtd_state(ptr::null()), EchokitDtdState::Idle);
    }

    #[test]
    fn disabled_process_copies_input() {
        let aec = echokit_aec_create(ptr::null());
        assert_eq!(echokit_aec_set_enabled(aec, false), EchokitError::None);

        let mic: Vec<i16> = (0..700).map(|i| (i * 37 % 2000) as i16 - 1000).collect();
        let speaker = vec![1000i16; 700];
        let mut out = vec![0i16; 700];
        let err = echokit_aec_process(aec, mic.as_ptr(), speaker.as_ptr(), out.as_mut_ptr(), 700);

        assert_eq!(err, EchokitError::None);
        assert_eq!(out, mic);
        echokit_aec_destroy(aec);
    }

    #[test]
    fn playback_capture_and_state() {
        let aec = echokit_aec_create(ptr::null());
        let speaker = vec![500i16; 160];
        let mic = vec![0i16; 160];
        let mut out = vec![0i16; 160];

        for _ in 0..10 {
            assert_eq!(echokit_aec_playback(aec, speaker.as_ptr(), 160), EchokitError::None);
            assert_eq!(
                echokit_aec_capture(aec, mic.as_ptr(), out.as_mut_ptr(), 160),
                EchokitError::None
            );
        }

        let mut state = EchokitAecState::from(crate::AecState::default());
        assert_eq!(echokit_aec_get_state(aec, &mut state), EchokitError::None);
        assert_eq!(state.frames_processed, 10);

        assert_eq!(echokit_aec_reset(aec), EchokitError::None);
        assert_eq!(echokit_aec_get_state(aec, &mut state), EchokitError::None);
        assert_eq!(state.frames_processed, 0);
        echokit_aec_destroy(aec);
    }

    #[test]
    fn lockstep_capture_with_known_delay_cancels_echo() {
        let mut config = echokit_aec_config_default();
        config.enable_dtd = false;
        config.enable_residual_echo_suppress = false;
        config.enable_delay_estimation = false;
        let aec = echokit_aec_create(&config);
        assert!(!aec.is_null());
        assert_eq!(echokit_aec_set_delay(aec, 400), EchokitError::None);

        let frames = 300;
        let mut seed = 0x2545_f491_u32;
        let played: Vec<i16> = (0..frames * 160)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                (seed >> 16) as i16 / 4
            })
            .collect();
        let mut out = vec![0i16; 160];

        for n in 0..frames {
            let start = n * 160;
            let mic: Vec<i16> = (start..start + 160)
                .map(|i: usize| i.checked_sub(400).map_or(0, |j| played[j] / 2))
                .collect();
            assert_eq!(
                echokit_aec_playback(aec, played[start..].as_ptr(), 160),
                EchokitError::None
            );
            assert_eq!(
                echokit_aec_capture(aec, mic.as_ptr(), out.as_mut_ptr(), 160),
                EchokitError::None
            );
        }

        let mut state = EchokitAecState::from(crate::AecState::default());
        assert_eq!(echokit_aec_get_state(aec, &mut state), EchokitError::None);
        assert!(state.erle_db > 6.0, "erle {}", state.erle_db);
        echokit_aec_destroy(aec);
    }

    #[test]
    fn set_delay_validates() {
        let aec = echokit_aec_create(ptr::null());
        assert_eq!(echokit_aec_set_delay(aec, -5), EchokitError::NegativeDelay);
        assert_eq!(echokit_aec_set_delay(aec, 320), EchokitError::None);

        let mut state = EchokitAecState::from(crate::AecState::default());
        echokit_aec_get_state(aec, &mut state);
        assert_eq!(state.estimated_delay_samples, 320);
        assert!(state.delay_stable);

        assert_eq!(echokit_aec_enable_delay_estimation(aec, false), EchokitError::None);
        assert_eq!(echokit_aec_set_suppress(aec, -30.0, -10.0), EchokitError::None);
        echokit_aec_destroy(aec);
    }

    #[test]
    fn zero_frame_count_is_rejected() {
        let aec = echokit_aec_create(ptr::null());
        let mic = [0i16; 1];
        let mut out = [0i16; 1];
        assert_eq!(
            echokit_aec_process(aec, mic.as_ptr(), ptr::null(), out.as_mut_ptr(), 0),
            EchokitError::EmptyFrame
        );
        echokit_aec_destroy(aec);
    }
}
