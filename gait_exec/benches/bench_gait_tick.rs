//! # Gait Tick Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::eqpt::imu::RawOrientation;
use gait_lib::{
    dispatch::Dispatcher,
    gait_ctrl::{GaitCtrl, InputData},
    units,
};
use util::module::State;

/// Raw sample of a robot swaying slowly from side to side, enough to keep it stepping.
fn swaying_sample(tick: u64) -> InputData {
    let roll_rad = 0.06 * (tick as f64 * 0.05).sin();
    let pitch_rad = 0.02 * (tick as f64 * 0.03).cos();

    InputData {
        raw: RawOrientation {
            pitch: units::rad_to_raw(pitch_rad),
            roll: units::wrap_roll(units::rad_to_raw(roll_rad)),
            roll_rate: (40.0 * (tick as f64 * 0.05).cos()) as i16,
            ..Default::default()
        },
    }
}

fn gait_tick_benchmark(c: &mut Criterion) {
    let mut gait_ctrl = GaitCtrl::default();
    let mut dispatcher = Dispatcher::new(gait_ctrl.params().dispatch.clone());
    let mut tick = 0u64;

    // Get through startup and calibration first
    let level = InputData {
        raw: RawOrientation {
            roll: units::ROLL_WRAP_RAW,
            ..Default::default()
        },
    };
    for _ in 0..300 {
        gait_ctrl.proc(&level).unwrap();
    }

    c.bench_function("gait_tick", |b| {
        b.iter(|| {
            tick += 1;
            let (output, _) = gait_ctrl.proc(black_box(&swaying_sample(tick))).unwrap();
            black_box(dispatcher.process(&output))
        })
    });
}

criterion_group!(benches, gait_tick_benchmark);
criterion_main!(benches);
