//! Playback ring behavior under overflow and concurrent use.

use std::num::NonZero;
use std::sync::Arc;

use echokit_ring_buffer::PlaybackRing;

#[test]
fn overflow_keeps_newest_samples() {
    let ring = PlaybackRing::new(NonZero::new(64).unwrap());
    let capacity = ring.capacity();
    let samples: Vec<f32> = (0..capacity * 3).map(|i| i as f32).collect();
    ring.write(&samples);

    assert_eq!(ring.fill_count(), capacity);
    let mut latest = vec![0.0; capacity];
    ring.copy_latest(&mut latest);
    assert_eq!(latest, samples[samples.len() - capacity..]);
}

#[test]
fn concurrent_writer_and_reader_see_ordered_samples() {
    let ring = Arc::new(PlaybackRing::new(NonZero::new(4096).unwrap()));
    let writer = {
        let ring = Arc::clone(&ring);
        std::thread::spawn(move || {
            for block in 0..64 {
                let chunk: Vec<f32> = (0..32).map(|i| (block * 32 + i) as f32).collect();
                ring.write(&chunk);
            }
        })
    };
    writer.join().unwrap();

    let mut out = vec![0.0; 32];
    assert_eq!(ring.read_delayed(32, &mut out), 32);
    let expected: Vec<f32> = (63 * 32..64 * 32).map(|i| i as f32).collect();
    assert_eq!(out, expected);
}
