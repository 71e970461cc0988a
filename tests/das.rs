#![cfg(unix)]

use assert_matches::assert_matches;

use stops_datasets::das::{DasgoClient, MetadataQuery};
use stops_datasets::error::DatasetError;

#[test]
fn failing_query_tool_is_reported() {
    let client = DasgoClient::with_binary("false".into());
    let err = client.query_files("/A/B/C").unwrap_err();
    assert_matches!(err, DatasetError::QueryFailed { key, message } if key == "/A/B/C" && message.contains("false"));
}

#[test]
fn empty_query_output_is_rejected() {
    let client = DasgoClient::with_binary("true".into());
    let err = client.query_files("/A/B/C").unwrap_err();
    assert_matches!(err, DatasetError::QueryFailed { key, message } if key == "/A/B/C" && message.contains("unexpected DAS output"));
}
