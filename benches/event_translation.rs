//! Event Translation Benchmarks
//!
//! Measures per-event translation cost for pointer, scroll and touch
//! streams, and the cost of a full dispatch cycle through the driver.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::os::fd::RawFd;

use lamco_input_driver::device::{
    AbsolutePoint, AxisRange, AxisSource, AxisValue, ButtonState, RawEventKind,
};
use lamco_input_driver::input::{ConsumerEvent, EventTranslator, TranslationState};
use lamco_input_driver::options::ButtonMap;
use lamco_input_driver::{
    DeviceId, Driver, OptionMap, ReadinessHost, VirtualBackend, VirtualDeviceSpec,
};

struct NullHost;

impl ReadinessHost for NullHost {
    fn add_enabled_device(&mut self, _fd: RawFd) {}
    fn remove_enabled_device(&mut self, _fd: RawFd) {}
}

fn point(x: f64, y: f64) -> AbsolutePoint {
    let range = AxisRange {
        minimum: 0.0,
        maximum: 4096.0,
    };
    AbsolutePoint {
        x,
        y,
        x_range: range,
        y_range: range,
    }
}

/// Mixed mouse stream: motion with occasional clicks and wheel steps
fn pointer_stream(len: usize) -> Vec<RawEventKind> {
    (0..len)
        .map(|i| match i % 16 {
            0 => RawEventKind::PointerButton {
                button: 0x110,
                state: ButtonState::Pressed,
            },
            1 => RawEventKind::PointerButton {
                button: 0x110,
                state: ButtonState::Released,
            },
            2 => RawEventKind::PointerAxis {
                source: AxisSource::Wheel,
                horizontal: None,
                vertical: Some(AxisValue {
                    value: 15.0,
                    discrete: 1.0,
                }),
            },
            _ => RawEventKind::PointerMotion {
                dx: (i % 7) as f64 - 3.0,
                dy: (i % 5) as f64 - 2.0,
                unaccelerated: Some((1.0, -1.0)),
            },
        })
        .collect()
}

/// Two-finger touch stream with frames
fn touch_stream(len: usize) -> Vec<RawEventKind> {
    let mut events = Vec::with_capacity(len);
    let mut step = 0.0;
    while events.len() < len {
        events.push(RawEventKind::TouchDown {
            slot: 0,
            point: point(100.0, 100.0),
        });
        events.push(RawEventKind::TouchDown {
            slot: 1,
            point: point(200.0, 100.0),
        });
        events.push(RawEventKind::TouchFrame);
        for _ in 0..8 {
            step += 1.0;
            events.push(RawEventKind::TouchMotion {
                slot: 0,
                point: point(100.0 + step, 100.0),
            });
            events.push(RawEventKind::TouchMotion {
                slot: 1,
                point: point(200.0 + step, 100.0),
            });
            events.push(RawEventKind::TouchFrame);
        }
        events.push(RawEventKind::TouchUp { slot: 0 });
        events.push(RawEventKind::TouchUp { slot: 1 });
        events.push(RawEventKind::TouchFrame);
    }
    events.truncate(len);
    events
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate");

    for (name, stream) in [
        ("pointer", pointer_stream(1024)),
        ("touch", touch_stream(1024)),
    ] {
        group.throughput(Throughput::Elements(stream.len() as u64));
        group.bench_with_input(BenchmarkId::new("stream", name), &stream, |b, stream| {
            let mut translator = EventTranslator::new();
            let mut state = TranslationState::default();
            let map = ButtonMap::identity();
            let mut sink: Vec<(DeviceId, ConsumerEvent)> = Vec::with_capacity(stream.len());

            b.iter(|| {
                sink.clear();
                for event in stream {
                    translator.translate(DeviceId(1), &mut state, &map, event, &mut sink);
                }
                black_box(sink.len())
            });
        });
    }

    group.finish();
}

fn bench_button_remap(c: &mut Criterion) {
    let map = ButtonMap::from_entries(vec![3, 2, 1, 4, 5, 6, 7, 9, 8]).unwrap_or_default();

    c.bench_function("button_map_lookup", |b| {
        b.iter(|| {
            let mut total = 0;
            for button in 0..32 {
                total += map.map(black_box(button));
            }
            total
        })
    });
}

fn bench_dispatch_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for batch in [1usize, 16, 256] {
        let backend = VirtualBackend::new([VirtualDeviceSpec::mouse("/dev/input/event4")]);
        let source = backend.clone();
        let mut driver = Driver::new(move || Ok(source.clone()), NullHost);
        let id = driver
            .pre_init(&OptionMap::new().with("Device", "/dev/input/event4"), None)
            .expect("pre_init");
        driver.init(id).expect("init");
        driver.enable(id).expect("enable");

        let stream = pointer_stream(batch);
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("batch", batch), &stream, |b, stream| {
            let mut sink = Vec::with_capacity(stream.len());
            b.iter(|| {
                for event in stream {
                    backend.push_event("/dev/input/event4", event.clone());
                }
                sink.clear();
                black_box(driver.read_input(&mut sink).unwrap_or(0))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_translate,
    bench_button_remap,
    bench_dispatch_cycle
);
criterion_main!(benches);
