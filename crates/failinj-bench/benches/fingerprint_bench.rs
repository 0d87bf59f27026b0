//! Folding cost of the callsite hash over a realistic stack depth.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use failinj_core::hash::{HASH_SEED, djb_extend, frame_text};

fn synthetic_stack(depth: usize) -> Vec<String> {
    (0..depth)
        .map(|i| frame_text(&format!("frame_{i}_symbol_name"), (i as u64) * 0x40 + 0x1c))
        .collect()
}

fn bench_fold_stack(c: &mut Criterion) {
    for depth in [8usize, 32, 128] {
        let frames = synthetic_stack(depth);
        c.bench_function(&format!("fingerprint/fold_{depth}_frames"), |b| {
            b.iter(|| {
                let mut hash = HASH_SEED;
                for frame in &frames {
                    hash = djb_extend(hash, black_box(frame));
                }
                black_box(hash)
            });
        });
    }
}

criterion_group!(benches, bench_fold_stack);
criterion_main!(benches);
