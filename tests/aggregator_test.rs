//! Integration tests for the window aggregator using in-memory collaborators

use mud_density_aggregator::{
    AggregateOutput, AggregatorError, ApiError, DatasetClient, DatasetQuery, DatasetRef,
    FileWatermarkStore, MemoryWatermarkStore, Outcome, OutputPublisher, ScheduleWindow,
    SourceRecord, WatermarkStore, WindowAggregator, WATERMARK_KEY,
};
use std::cell::RefCell;

const START: i64 = 1578291000;
const INTERVAL: u64 = 60;

fn window() -> ScheduleWindow {
    ScheduleWindow::new(1, 1234, START, INTERVAL)
}

fn scenario_records() -> Vec<SourceRecord> {
    vec![
        SourceRecord::new(1578291010, Some(1.0)),
        SourceRecord::new(1578291030, Some(2.0)),
        SourceRecord::new(1578291060, Some(3.0)),
    ]
}

#[derive(Default)]
struct FakeDataset {
    records: Vec<SourceRecord>,
    fail: bool,
    queries: RefCell<Vec<DatasetQuery>>,
}

impl FakeDataset {
    fn with_records(records: Vec<SourceRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl DatasetClient for FakeDataset {
    fn query(&self, query: &DatasetQuery) -> Result<Vec<SourceRecord>, ApiError> {
        self.queries.borrow_mut().push(query.clone());
        if self.fail {
            return Err(ApiError::Network("connection refused".to_string()));
        }
        Ok(self.records.clone())
    }
}

#[derive(Default)]
struct FakePublisher {
    reject_with: Option<u16>,
    batches: RefCell<Vec<(DatasetRef, Vec<AggregateOutput>)>>,
}

impl FakePublisher {
    fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Default::default()
        }
    }

    fn call_count(&self) -> usize {
        self.batches.borrow().len()
    }
}

impl OutputPublisher for FakePublisher {
    fn publish(&self, target: &DatasetRef, records: &[AggregateOutput]) -> Result<(), ApiError> {
        self.batches
            .borrow_mut()
            .push((target.clone(), records.to_vec()));
        match self.reject_with {
            Some(status) => Err(ApiError::Server {
                status,
                message: "rejected".to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn stored_watermark(store: &dyn WatermarkStore) -> Option<String> {
    store.get(WATERMARK_KEY).unwrap()
}

#[test]
fn test_publishes_mean_and_advances_watermark() {
    let dataset = FakeDataset::with_records(scenario_records());
    let publisher = FakePublisher::default();
    let mut watermarks = MemoryWatermarkStore::new();

    let outcome = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap();

    let output = outcome.output().expect("expected a published summary");
    assert_eq!(output.data.mean_mud_density, 2.0);
    assert_eq!(output.timestamp, 1578291060);
    assert_eq!(output.asset_id, 1234);
    assert_eq!(output.company_id, 1);
    assert_eq!(output.data.schedule_start, START);
    assert_eq!(output.data.schedule_end, 1578291060);
    assert_eq!(output.version, 1);

    let batches = publisher.batches.borrow();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].1.len(), 1);
    assert_eq!(&batches[0].1[0], output);

    assert_eq!(stored_watermark(&watermarks).as_deref(), Some("1578291060"));
}

#[test]
fn test_queries_inclusive_window_sorted_and_capped() {
    let dataset = FakeDataset::with_records(scenario_records());
    let mut watermarks = MemoryWatermarkStore::new();

    WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &FakePublisher::default())
        .unwrap();

    let queries = dataset.queries.borrow();
    assert_eq!(queries.len(), 1);
    let query = &queries[0];
    assert_eq!(query.source, DatasetRef::new("corva", "wits"));
    assert_eq!(query.filter["asset_id"], 1234);
    assert_eq!(query.filter["timestamp"]["$gte"], START);
    assert_eq!(query.filter["timestamp"]["$lte"], 1578291060);
    assert_eq!(query.sort["timestamp"], 1);
    assert_eq!(query.limit, 500);
    assert_eq!(query.fields, "timestamp,data.mud_density");
}

#[test]
fn test_empty_window_publishes_nothing() {
    let dataset = FakeDataset::with_records(Vec::new());
    let publisher = FakePublisher::default();
    let mut watermarks = MemoryWatermarkStore::new();

    let outcome = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap();

    assert_eq!(outcome, Outcome::EmptyWindow);
    assert_eq!(publisher.call_count(), 0);
    assert_eq!(stored_watermark(&watermarks), None);
}

#[test]
fn test_already_exported_window_is_skipped() {
    let dataset = FakeDataset::with_records(scenario_records());
    let publisher = FakePublisher::default();
    let mut watermarks = MemoryWatermarkStore::with_value(WATERMARK_KEY, "1578291060");

    let outcome = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::AlreadyExported {
            watermark: 1578291060
        }
    );
    assert!(outcome.output().is_none());
    assert_eq!(publisher.call_count(), 0);
    assert_eq!(stored_watermark(&watermarks).as_deref(), Some("1578291060"));
}

#[test]
fn test_watermark_past_window_end_is_skipped() {
    let dataset = FakeDataset::with_records(scenario_records());
    let publisher = FakePublisher::default();
    let mut watermarks = MemoryWatermarkStore::with_value(WATERMARK_KEY, "1578299999");

    let outcome = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap();

    assert_eq!(outcome.label(), "already_exported");
    assert_eq!(publisher.call_count(), 0);
}

#[test]
fn test_publish_failure_keeps_watermark() {
    let dataset = FakeDataset::with_records(scenario_records());
    let publisher = FakePublisher::rejecting(500);
    let mut watermarks = MemoryWatermarkStore::with_value(WATERMARK_KEY, "1578290940");

    let err = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap_err();

    assert!(matches!(
        err,
        AggregatorError::Publish(ApiError::Server { status: 500, .. })
    ));
    assert!(err.is_upstream());
    assert_eq!(publisher.call_count(), 1);
    assert_eq!(stored_watermark(&watermarks).as_deref(), Some("1578290940"));
}

#[test]
fn test_dataset_failure_is_fatal() {
    let dataset = FakeDataset::failing();
    let publisher = FakePublisher::default();
    let mut watermarks = MemoryWatermarkStore::new();

    let err = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap_err();

    assert!(matches!(err, AggregatorError::Dataset(ApiError::Network(_))));
    assert_eq!(publisher.call_count(), 0);
    assert_eq!(stored_watermark(&watermarks), None);
}

#[test]
fn test_missing_density_counts_as_zero() {
    let dataset = FakeDataset::with_records(vec![
        SourceRecord::new(1578291010, Some(4.0)),
        SourceRecord::new(1578291020, None),
        SourceRecord::new(1578291030, Some(2.0)),
    ]);
    let mut watermarks = MemoryWatermarkStore::new();

    let output = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &FakePublisher::default())
        .unwrap()
        .into_output()
        .unwrap();

    assert_eq!(output.data.mean_mud_density, 2.0);
    assert_eq!(output.timestamp, 1578291030);
    assert_eq!(stored_watermark(&watermarks).as_deref(), Some("1578291030"));
}

#[test]
fn test_boundary_sample_of_previous_window_is_included() {
    // The previous window ended on 1578291000; its last sample sits on the
    // shared boundary and is averaged again here.
    let dataset = FakeDataset::with_records(vec![
        SourceRecord::new(1578291000, Some(5.0)),
        SourceRecord::new(1578291030, Some(3.0)),
    ]);
    let mut watermarks = MemoryWatermarkStore::with_value(WATERMARK_KEY, "1578291000");

    let output = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &FakePublisher::default())
        .unwrap()
        .into_output()
        .unwrap();

    assert_eq!(output.data.mean_mud_density, 4.0);
}

#[test]
fn test_watermark_never_moves_backwards() {
    let dataset = FakeDataset::with_records(vec![SourceRecord::new(1578291040, Some(1.0))]);
    let mut watermarks = MemoryWatermarkStore::with_value(WATERMARK_KEY, "1578291050");

    let outcome = WindowAggregator::default()
        .run(&window(), &dataset, &mut watermarks, &FakePublisher::default())
        .unwrap();

    assert_eq!(outcome.label(), "published");
    assert_eq!(stored_watermark(&watermarks).as_deref(), Some("1578291050"));
}

#[test]
fn test_rerun_of_same_window_is_deduplicated() {
    let dataset = FakeDataset::with_records(scenario_records());
    let publisher = FakePublisher::default();
    let mut watermarks = MemoryWatermarkStore::new();
    let aggregator = WindowAggregator::default();

    let first = aggregator
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap();
    let second = aggregator
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap();

    assert_eq!(first.label(), "published");
    assert_eq!(second.label(), "already_exported");
    assert_eq!(publisher.call_count(), 1);
}

#[test]
fn test_output_dataset_and_limit_follow_settings() {
    let dataset = FakeDataset::with_records(scenario_records());
    let publisher = FakePublisher::default();
    let mut watermarks = MemoryWatermarkStore::new();
    let aggregator = WindowAggregator::new(
        DatasetRef::new("acme", "sensors"),
        DatasetRef::new("acme", "mud-summary"),
    )
    .with_query_limit(50);

    let output = aggregator
        .run(&window(), &dataset, &mut watermarks, &publisher)
        .unwrap()
        .into_output()
        .unwrap();

    assert_eq!(output.provider, "acme");
    assert_eq!(output.collection, "mud-summary");
    assert_eq!(dataset.queries.borrow()[0].limit, 50);
    assert_eq!(dataset.queries.borrow()[0].source.dataset, "sensors");
    assert_eq!(
        publisher.batches.borrow()[0].0,
        DatasetRef::new("acme", "mud-summary")
    );
}

#[test]
fn test_file_watermark_store_persists_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("watermarks.json");
    let dataset = FakeDataset::with_records(scenario_records());
    let publisher = FakePublisher::default();
    let aggregator = WindowAggregator::default();

    let mut store = FileWatermarkStore::new(&path, 1, 1234);
    aggregator
        .run(&window(), &dataset, &mut store, &publisher)
        .unwrap();

    let mut reopened = FileWatermarkStore::new(&path, 1, 1234);
    let outcome = aggregator
        .run(&window(), &dataset, &mut reopened, &publisher)
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::AlreadyExported {
            watermark: 1578291060
        }
    );

    // A different asset has its own watermark.
    let other_window = ScheduleWindow::new(1, 5678, START, INTERVAL);
    let mut other = FileWatermarkStore::new(&path, 1, 5678);
    let outcome = aggregator
        .run(&other_window, &dataset, &mut other, &publisher)
        .unwrap();
    assert_eq!(outcome.label(), "published");
    assert_eq!(publisher.call_count(), 2);
}
