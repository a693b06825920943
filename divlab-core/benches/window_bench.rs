//! Criterion benchmarks for the window scans.
//!
//! 1. Event-date window (±30 days) over series of increasing length
//! 2. Prior-calendar-year window
//! 3. A full year of events against one series

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use divlab_core::analysis::{prior_calendar_year, window_around, DEFAULT_RADIUS_DAYS};
use divlab_core::domain::{PricePoint, PriceSeries};

fn make_series(n: usize) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
    let points = (0..n)
        .map(|i| {
            let close = 20.0 + (i as f64 * 0.05).sin() * 5.0;
            PricePoint::new(
                base + chrono::Duration::days(i as i64),
                close + 0.4,
                close - 0.4,
                close,
            )
        })
        .collect();
    PriceSeries::new("BENCH", points)
}

fn bench_window_around(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_around");
    for n in [250usize, 1_250, 5_000] {
        let series = make_series(n);
        let target = series.points()[n / 2].date;
        group.bench_with_input(BenchmarkId::from_parameter(n), &series, |b, s| {
            b.iter(|| window_around(black_box(s), black_box(target), DEFAULT_RADIUS_DAYS))
        });
    }
    group.finish();
}

fn bench_prior_year(c: &mut Criterion) {
    let series = make_series(5_000);
    let report = NaiveDate::from_ymd_opt(2015, 4, 20).unwrap();
    c.bench_function("prior_calendar_year_5000", |b| {
        b.iter(|| prior_calendar_year(black_box(&series), black_box(report)))
    });
}

fn bench_event_sweep(c: &mut Criterion) {
    let series = make_series(5_000);
    let targets: Vec<NaiveDate> = series.points().iter().step_by(7).map(|p| p.date).collect();
    c.bench_function("window_around_every_week", |b| {
        b.iter(|| {
            targets
                .iter()
                .filter_map(|t| window_around(&series, *t, DEFAULT_RADIUS_DAYS))
                .count()
        })
    });
}

criterion_group!(benches, bench_window_around, bench_prior_year, bench_event_sweep);
criterion_main!(benches);
