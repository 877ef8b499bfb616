//! Benchmarks for marker resolution on the playback hot path
//!
//! Every `timeupdate` (about 4Hz per player) resolves the active marker and
//! recolours ticks, so lookups must stay well under a millisecond even for
//! long lectures with many slides:
//! - index construction from unsorted markers (100, 1 000, 10 000)
//! - latest-at-or-before lookups across the whole clip
//! - a full overlay time update including tick recolouring

use alea_playback::markers::MarkerIndex;
use alea_playback::overlay::MarkerOverlay;
use alea_playback::test_utils::{marker, slide_index};
use alea_playback::types::Marker;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn lecture(count: usize) -> (Vec<Marker>, Vec<String>) {
    let uris: Vec<String> = (0..count).map(|i| format!("slide-{i}")).collect();
    // Interleave so the index has to sort
    let markers = (0..count)
        .map(|i| if i % 2 == 0 { i } else { count - i })
        .map(|i| marker(i as f64 * 7.5, "lecture", &uris[i]))
        .collect();
    (markers, uris)
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("marker_index_build");
    for size in SIZES {
        let (markers, _) = lecture(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &markers, |b, markers| {
            b.iter(|| black_box(MarkerIndex::new(markers.iter().cloned())))
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("latest_at_or_before");
    for size in SIZES {
        let (markers, _) = lecture(size);
        let index = MarkerIndex::new(markers);
        let end = size as f64 * 7.5;
        group.bench_with_input(BenchmarkId::from_parameter(size), &index, |b, index| {
            let mut t = 0.0;
            b.iter(|| {
                t = (t + 3.3) % end;
                black_box(index.latest_at_or_before(black_box(t)))
            })
        });
    }
    group.finish();
}

fn bench_time_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay_time_update");
    for size in SIZES {
        let (markers, uris) = lecture(size);
        let uris: Vec<&str> = uris.iter().map(String::as_str).collect();
        let mut overlay = MarkerOverlay::new(1.0);
        overlay.set_slide_index(Arc::new(slide_index("lecture", &uris)));
        overlay.set_markers(markers.into());
        let duration = size as f64 * 7.5 + 1.0;
        overlay.on_loaded_metadata(duration);

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            let mut t = 0.0;
            b.iter(|| {
                t = (t + 0.25) % duration;
                black_box(overlay.on_time_update(black_box(t)))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_index_build, bench_lookup, bench_time_update);
criterion_main!(benches);
