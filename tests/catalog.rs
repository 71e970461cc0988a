use std::sync::Mutex;

use assert_matches::assert_matches;

use stops_datasets::catalog::{CatalogTable, SheetSource};
use stops_datasets::domain::{Period, Tier};
use stops_datasets::error::DatasetError;

const HEADER: &str = "Dataset,MiniAOD,NanoAOD,ReNanoAOD,NTuple";

struct MockSheet {
    requests: Mutex<Vec<(String, Period)>>,
    result: Result<String, u16>,
}

impl MockSheet {
    fn serving(data: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            result: Ok(data.to_string()),
        }
    }
}

impl SheetSource for MockSheet {
    fn fetch_csv(&self, spreadsheet_id: &str, period: Period) -> Result<String, DatasetError> {
        self.requests
            .lock()
            .unwrap()
            .push((spreadsheet_id.to_string(), period));
        match &self.result {
            Ok(data) => Ok(data.clone()),
            Err(status) => Err(DatasetError::SourceStatus {
                status: *status,
                message: "Not Found".to_string(),
            }),
        }
    }
}

#[test]
fn load_requests_period_sheet() {
    let sheet = MockSheet::serving(&format!("{HEADER}\nFoo,/A/B/C,,,bar/v1\n"));
    let table = CatalogTable::load(&sheet, "doc-id", Period::Run2017).unwrap();

    assert_eq!(table.period(), Period::Run2017);
    assert_eq!(table.len(), 1);
    assert_eq!(
        *sheet.requests.lock().unwrap(),
        vec![("doc-id".to_string(), Period::Run2017)]
    );
}

#[test]
fn load_propagates_transport_errors() {
    let sheet = MockSheet {
        requests: Mutex::new(Vec::new()),
        result: Err(404),
    };
    let err = CatalogTable::load(&sheet, "doc-id", Period::Run2018).unwrap_err();
    assert_matches!(err, DatasetError::SourceStatus { status: 404, .. });
}

#[test]
fn missing_columns_are_malformed() {
    let err = CatalogTable::from_csv(Period::Run2018, "Dataset,MiniAOD,NanoAOD\nFoo,a,b\n")
        .unwrap_err();
    assert_matches!(err, DatasetError::MalformedSource(message) if message.contains("ReNanoAOD") && message.contains("NTuple"));

    let err = CatalogTable::from_csv(Period::Run2018, "Name,MiniAOD,NanoAOD,ReNanoAOD,NTuple\n")
        .unwrap_err();
    assert_matches!(err, DatasetError::MalformedSource(message) if message.contains("Dataset") && !message.contains("NTuple"));

    let err = CatalogTable::from_csv(Period::Run2018, "").unwrap_err();
    assert_matches!(err, DatasetError::MalformedSource(_));
}

#[test]
fn rows_without_name_are_skipped() {
    let data = format!("{HEADER}\n  ,/A/B/C,,,\nFoo,,/N/A/NO,,\n");
    let table = CatalogTable::from_csv(Period::Run2018, &data).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.resolver_key_for("Foo", Tier::NanoAod), Some("/N/A/NO"));
}

#[test]
fn absent_tier_is_a_lookup_failure() {
    let data = format!("{HEADER}\nFoo,/A/B/C,,,\n");
    let table = CatalogTable::from_csv(Period::Run2018, &data).unwrap();

    let err = table.require_key("Foo", Tier::NTuple).unwrap_err();
    assert_matches!(
        err,
        DatasetError::UnknownDatasetOrTier { dataset, tier } if dataset == "Foo" && tier == "NTuple"
    );
    let err = table.require_key("Bar", Tier::MiniAod).unwrap_err();
    assert_matches!(err, DatasetError::UnknownDatasetOrTier { .. });
}

#[test]
fn later_rows_overwrite_per_tier() {
    let data = format!("{HEADER}\nFoo,/A/B/C,,,old/v1\nFoo,,,,new/v2\n");
    let table = CatalogTable::from_csv(Period::Run2018, &data).unwrap();
    assert_eq!(table.resolver_key_for("Foo", Tier::MiniAod), Some("/A/B/C"));
    assert_eq!(table.resolver_key_for("Foo", Tier::NTuple), Some("new/v2"));
}

#[test]
fn extra_columns_and_short_rows_are_tolerated() {
    let data = "Comment,NTuple,Dataset,ReNanoAOD,NanoAOD,MiniAOD\n\
                note,\"ntuple/v3\",\"MET_Run2016B\",/store/user/x/MET\n\
                ,,Other\n";
    let table = CatalogTable::from_csv(Period::Run2016preVFP, data).unwrap();
    assert_eq!(
        table.resolver_key_for("MET_Run2016B", Tier::NTuple),
        Some("ntuple/v3")
    );
    assert_eq!(
        table.resolver_key_for("MET_Run2016B", Tier::ReNanoAod),
        Some("/store/user/x/MET")
    );
    assert_eq!(table.resolver_key_for("MET_Run2016B", Tier::MiniAod), None);
    // a dataset without any tier key has nothing to resolve
    assert_eq!(table.len(), 1);
}
