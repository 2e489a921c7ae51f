use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use pixcal_core::mocks::{StaticConfig, UniformLayout};
use pixcal_core::{DiodeType, Ingestor, RawPayload, RecordSet};
use pixcal_traits::ReadoutTechnology;

const MODULES: usize = 2048;
const FRONT_ENDS: usize = 16;

// Synthetic charges spread over 1 ke .. 200 ke
fn synth_charges(n: usize, seed: u32) -> Vec<f32> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    (0..n).map(|_| 1000.0 + next_f32() * 199_000.0).collect()
}

fn records() -> RecordSet {
    let entry: Vec<f64> = vec![
        3500.0, 35.0, 160.0, 5000.0, 3600.0, 36.0, 170.0, 5100.0, 3700.0, 37.0, 180.0, 5200.0,
        70.2, -3561.25, 26000.0, 71.0, -3500.0, 27000.0, 0.08, 0.0002,
    ];
    let data = serde_json::Value::Array(vec![serde_json::json!(entry); FRONT_ENDS]);
    RecordSet {
        records: (0..MODULES)
            .map(|module| RawPayload {
                module,
                data: None,
                data_array: Some(data.clone()),
                data_indexed: None,
            })
            .collect(),
    }
}

fn configure(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p pixcal_core --bench conversion
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
}

pub fn bench_ingest(c: &mut Criterion) {
    let mut g = c.benchmark_group("ingest");
    configure(&mut g);
    let layout = UniformLayout::new(MODULES, FRONT_ENDS, ReadoutTechnology::Fei3);
    let set = records();
    for extrapolate in [false, true] {
        let config = StaticConfig {
            linear_extrapolation: extrapolate,
            ..StaticConfig::default()
        };
        g.bench_function(format!("array_records_extrapolate_{extrapolate}"), |b| {
            b.iter(|| {
                let out = Ingestor::new(&layout, &config).run(Some(black_box(&set)));
                black_box(out.ok());
            });
        });
    }
    g.finish();
}

pub fn bench_queries(c: &mut Criterion) {
    let mut g = c.benchmark_group("queries");
    configure(&mut g);
    let layout = UniformLayout::new(MODULES, FRONT_ENDS, ReadoutTechnology::Fei3);
    let config = StaticConfig {
        linear_extrapolation: true,
        ..StaticConfig::default()
    };
    let Ok((store, _)) = Ingestor::new(&layout, &config).run(Some(&records())) else {
        return;
    };
    let charges = synth_charges(50_000, 0xC0FFEE);

    g.bench_function("tot_run3pix", |b| {
        b.iter_batched(
            || charges.clone(),
            |qs| {
                let mut acc = 0.0f32;
                for (i, q) in qs.iter().enumerate() {
                    let module = i % MODULES;
                    let fe = i % FRONT_ENDS;
                    acc += store.tot(DiodeType::Normal, module, fe, *q).unwrap_or(0.0);
                }
                black_box(acc);
            },
            BatchSize::SmallInput,
        );
    });
    g.bench_function("charge_run3pix", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for tot in 0..64u16 {
                for module in (0..MODULES).step_by(64) {
                    acc += store
                        .charge(DiodeType::Ganged, module, 0, f32::from(tot))
                        .unwrap_or(0.0);
                }
            }
            black_box(acc);
        });
    });
    g.finish();
}

criterion_group!(conversion, bench_ingest, bench_queries);
criterion_main!(conversion);
