//! End-to-end sorter behavior

mod common;

use common::{config_in, idle_monitor, random_i64s, run_files_in, FailingSink, SharedSink};
use spillsort_core::config::SortConfig;
use spillsort_core::error::Error;
use spillsort_core::order::{natural_order, order_by_key};
use spillsort_engine::Sorter;
use tempfile::TempDir;

#[test]
fn sorts_small_batch() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, output) = SharedSink::new();
    let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .monitor(idle_monitor())
        .build()
        .expect("build sorter");

    for n in [3i64, 1, 2] {
        sorter.process(n).expect("process");
    }
    sorter.close().expect("close");

    let output = output.lock().expect("sink lock");
    assert_eq!(output.items, vec![1, 2, 3]);
    assert_eq!(output.closes, 1);
}

#[test]
fn preserves_duplicates() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, output) = SharedSink::new();
    let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .monitor(idle_monitor())
        .build()
        .expect("build sorter");

    for n in [5i64, 5, 5, 5] {
        sorter.process(n).expect("process");
    }
    sorter.close().expect("close");

    assert_eq!(output.lock().expect("sink lock").items, vec![5, 5, 5, 5]);
}

#[test]
fn empty_input_closes_downstream_once() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, output) = SharedSink::new();
    let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .monitor(idle_monitor())
        .build()
        .expect("build sorter");

    sorter.close().expect("close");

    let output = output.lock().expect("sink lock");
    assert!(output.items.is_empty());
    assert_eq!(output.closes, 1);
}

#[test]
fn output_is_sorted_permutation_of_input() {
    let dir = TempDir::new().expect("temp dir");
    let input = random_i64s(5_000);
    let (sink, output) = SharedSink::new();
    let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .monitor(idle_monitor())
        .build()
        .expect("build sorter");

    for &n in &input {
        sorter.process(n).expect("process");
    }
    sorter.close().expect("close");

    let mut expected = input;
    expected.sort_unstable();
    assert_eq!(output.lock().expect("sink lock").items, expected);
}

#[test]
fn spilled_run_matches_in_memory_run() {
    let input = random_i64s(20_000);

    let sort_with = |object_limit: usize| {
        let dir = TempDir::new().expect("temp dir");
        let (sink, output) = SharedSink::new();
        let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
            .config(SortConfig {
                object_limit,
                reduce_interval: 1_000,
                ..config_in(dir.path())
            })
            .monitor(idle_monitor())
            .build()
            .expect("build sorter");
        for &n in &input {
            sorter.process(n).expect("process");
        }
        let metrics = sorter.metrics();
        sorter.close().expect("close");
        let items = output.lock().expect("sink lock").items.clone();
        (items, metrics.files_written.get())
    };

    let (spilled, files_spilled) = sort_with(2_000);
    let (in_memory, files_in_memory) = sort_with(usize::MAX);

    assert!(files_spilled > 0, "tiny limit must force spills");
    assert_eq!(files_in_memory, 0, "huge limit must not spill");
    assert_eq!(spilled, in_memory);
}

#[test]
fn large_input_spills_then_cleans_up() {
    let dir = TempDir::new().expect("temp dir");
    let input = random_i64s(150_000);
    let (sink, output) = SharedSink::new();
    let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
        .config(SortConfig {
            object_limit: 10_000,
            reduce_interval: 2_500,
            ..config_in(dir.path())
        })
        .monitor(idle_monitor())
        .build()
        .expect("build sorter");

    for &n in &input {
        sorter.process(n).expect("process");
    }
    let metrics = sorter.metrics();
    sorter.close().expect("close");

    assert!(metrics.files_written.get() > 0);
    assert_eq!(run_files_in(dir.path()), 0, "temporaries must be deleted");

    let mut expected = input;
    expected.sort_unstable();
    assert_eq!(output.lock().expect("sink lock").items, expected);
}

#[test]
fn sums_payloads_by_key() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, output) = SharedSink::new();
    let mut sorter = Sorter::builder(order_by_key(|r: &(char, i64)| r.0), sink)
        .config(config_in(dir.path()))
        .monitor(idle_monitor())
        .reducer(sum_by_key)
        .build()
        .expect("build sorter");

    for record in [('A', 1i64), ('B', 2), ('A', 3), ('A', 4), ('B', 5)] {
        sorter.process(record).expect("process");
    }
    sorter.close().expect("close");

    assert_eq!(
        output.lock().expect("sink lock").items,
        vec![('A', 8), ('B', 7)]
    );
}

#[test]
fn reducer_keeps_per_key_sums_across_spills() {
    let dir = TempDir::new().expect("temp dir");
    let mut rng_values = random_i64s(10_000);
    for v in &mut rng_values {
        *v = v.rem_euclid(1_000); // keep sums well away from overflow
    }
    let input: Vec<(char, i64)> = rng_values
        .iter()
        .enumerate()
        .map(|(i, &v)| ((b'a' + (i % 26) as u8) as char, v))
        .collect();

    let (sink, output) = SharedSink::new();
    let mut sorter = Sorter::builder(order_by_key(|r: &(char, i64)| r.0), sink)
        .config(SortConfig {
            object_limit: 500,
            reduce_interval: 100,
            ..config_in(dir.path())
        })
        .monitor(idle_monitor())
        .reducer(sum_by_key)
        .build()
        .expect("build sorter");

    for record in input.clone() {
        sorter.process(record).expect("process");
    }
    let metrics = sorter.metrics();
    sorter.close().expect("close");

    assert!(metrics.files_written.get() > 0, "spills expected");

    let mut expected = std::collections::BTreeMap::new();
    for (k, v) in &input {
        *expected.entry(*k).or_insert(0i64) += v;
    }
    let mut emitted = std::collections::BTreeMap::new();
    let items = output.lock().expect("sink lock").items.clone();
    let mut last_key = None;
    for (k, v) in items {
        assert!(last_key <= Some(k), "emitted keys out of order");
        last_key = Some(k);
        *emitted.entry(k).or_insert(0i64) += v;
    }
    assert_eq!(emitted, expected);
}

#[test]
fn build_without_monitor_is_a_config_error() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, _output) = SharedSink::new();
    let result = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn build_without_a_watchable_pool_is_a_config_error() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, _output) = SharedSink::new();
    // A monitor with no threshold-capable pool cannot back the stage.
    let empty = std::sync::Arc::new(spillsort_mem::HeapPools::new());
    let result = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .monitor(empty)
        .build();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn process_after_close_is_a_protocol_error() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, _output) = SharedSink::new();
    let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .monitor(idle_monitor())
        .build()
        .expect("build sorter");

    sorter.process(1).expect("process");
    sorter.close().expect("close");

    assert!(matches!(sorter.process(2), Err(Error::Protocol(_))));
}

#[test]
fn close_twice_is_a_protocol_error() {
    let dir = TempDir::new().expect("temp dir");
    let (sink, _output) = SharedSink::new();
    let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
        .config(config_in(dir.path()))
        .monitor(idle_monitor())
        .build()
        .expect("build sorter");

    sorter.close().expect("close");
    assert!(matches!(sorter.close(), Err(Error::Protocol(_))));
}

#[test]
fn downstream_failure_propagates_and_cleans_temporaries() {
    let dir = TempDir::new().expect("temp dir");
    let mut sorter = Sorter::builder(
        natural_order::<i64>(),
        FailingSink {
            accept: 10,
            seen: 0,
        },
    )
    .config(SortConfig {
        object_limit: 100,
        reduce_interval: 50,
        ..config_in(dir.path())
    })
    .monitor(idle_monitor())
    .build()
    .expect("build sorter");

    for n in random_i64s(1_000) {
        sorter.process(n).expect("process");
    }
    assert!(sorter.spill_file_count() > 0);

    assert!(sorter.close().is_err());
    assert_eq!(run_files_in(dir.path()), 0, "temporaries must be deleted");
}

#[test]
fn dropped_unclosed_sorter_deletes_temporaries() {
    let dir = TempDir::new().expect("temp dir");
    {
        let (sink, _output) = SharedSink::new();
        let mut sorter = Sorter::builder(natural_order::<i64>(), sink)
            .config(SortConfig {
                object_limit: 100,
                reduce_interval: 50,
                ..config_in(dir.path())
            })
            .monitor(idle_monitor())
            .build()
            .expect("build sorter");
        for n in random_i64s(1_000) {
            sorter.process(n).expect("process");
        }
        assert!(run_files_in(dir.path()) > 0);
    }
    assert_eq!(run_files_in(dir.path()), 0);
}

fn sum_by_key(batch: Vec<(char, i64)>) -> Vec<(char, i64)> {
    let mut out: Vec<(char, i64)> = Vec::new();
    for (key, value) in batch {
        match out.last_mut() {
            Some((last, sum)) if *last == key => *sum += value,
            _ => out.push((key, value)),
        }
    }
    out
}
