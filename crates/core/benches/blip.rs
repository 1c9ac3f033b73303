use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emu_core::apu::Blip;

fn bench_blip_frame(c: &mut Criterion) {
    // One NTSC frame of FM-rate deltas (~889 events) resampled to 48 kHz.
    let frame_cycles = 262 * 3420u32;

    c.bench_function("blip_frame", |b| {
        let mut blip = Blip::new(4800);
        blip.set_rates(53_693_175.0, 48_000.0);
        let mut out = vec![0i16; 4800];

        b.iter(|| {
            let mut time = 0u32;
            let mut level = 0i32;
            while time < frame_cycles {
                let next = ((time / 1008) % 32) as i32 * 100 - 1600;
                blip.add_delta(time, next - level);
                level = next;
                time += 1008;
            }
            blip.end_frame(frame_cycles);
            let n = blip.samples_avail();
            blip.read_samples(black_box(&mut out), n, false);
        });
    });
}

criterion_group!(benches, bench_blip_frame);
criterion_main!(benches);
