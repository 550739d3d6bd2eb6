use std::time::Instant;

use crate::events::EventBus;
use crate::model::AppEntry;
use crate::sort_key::sort_entries;
use crate::view::FilterableView;

fn p95_ms(samples: &mut [f64]) -> f64 {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let last = samples.len().saturating_sub(1);
    let idx = ((last as f64) * 0.95).round() as usize;
    samples[idx.min(last)]
}

#[test]
fn warm_filter_p95_under_15ms() {
    let mut entries: Vec<AppEntry> = (0..5_000)
        .map(|i| {
            AppEntry::new(
                &format!("com.vendor{i:04}.app"),
                &format!("Application {i:05}"),
                Vec::new(),
                true,
            )
        })
        .collect();
    entries.push(AppEntry::new("org.osmand.maps", "OsmAnd Maps", Vec::new(), true));
    sort_entries(&mut entries);

    let mut view = FilterableView::new(EventBus::new());
    view.set_source(entries);

    for _ in 0..30 {
        view.apply_filter("osmand");
    }

    let mut batch_p95 = Vec::with_capacity(5);
    for _ in 0..5 {
        let mut samples = Vec::with_capacity(80);
        for _ in 0..80 {
            let start = Instant::now();
            view.apply_filter("osmand");
            let _ = view.position_for_section('O');
            samples.push(start.elapsed().as_secs_f64() * 1000.0);
        }
        batch_p95.push(p95_ms(&mut samples));
    }

    batch_p95.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_p95 = batch_p95[batch_p95.len() / 2];

    assert_eq!(view.len(), 1);
    assert!(
        median_p95 <= 15.0,
        "median batch p95 too high: {median_p95:.3}ms (budget 15.0ms); batches={batch_p95:?}",
    );
}
