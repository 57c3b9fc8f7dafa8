mod common;

use std::time::Duration;

use arrow::array::{AsArray, RecordBatch};
use census2020_core::{
    DatasetLocation, IngestError, IngestOptions, Jurisdiction, QueryError, QueryRequest,
    fetch::{DirArchiveSource, FetchError, RetryPolicy},
    ingest::resolve_jurisdictions,
    ingest_jurisdiction, ingest_many, read_filtered, write_jurisdiction_table,
};
use common::{FIRST_COUNTY_NAME, TestResult, write_archive};
use futures::StreamExt;
use tempfile::TempDir;

fn quick_options() -> IngestOptions {
    IngestOptions {
        retry: RetryPolicy::new(2, Duration::from_millis(1)),
        concurrency: 3,
    }
}

fn strings(batch: &RecordBatch, name: &str) -> TestResult<Vec<String>> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| format!("missing column {name}"))?;
    Ok(column
        .as_string::<i32>()
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

/// Archives for Rhode Island (5 counties) and Wyoming (23), pulled through a
/// directory source and persisted into `<tmp>/dataset`.
async fn ri_wy_dataset(tmp: &TempDir) -> TestResult<DatasetLocation> {
    let archives = tmp.path().join("archives");
    write_archive(&archives, "RI", "44", 5)?;
    write_archive(&archives, "WY", "56", 23)?;

    let source = DirArchiveSource::new(&archives);
    let location = DatasetLocation::local(tmp.path().join("dataset"));

    let jurisdictions = resolve_jurisdictions(["RI", "WY"])?;
    let mut outcomes = ingest_many(&source, jurisdictions, quick_options());
    while let Some(outcome) = outcomes.next().await {
        let table = outcome.result?;
        write_jurisdiction_table(&location, outcome.jurisdiction, &table).await?;
    }
    Ok(location)
}

#[tokio::test]
async fn state_county_rows_for_two_jurisdictions() -> TestResult {
    let tmp = TempDir::new()?;
    let location = ri_wy_dataset(&tmp).await?;

    let request = QueryRequest::new()
        .jurisdictions(["RI", "WY"])
        .summary_levels(["state-county"]);
    let result = read_filtered(&location, &request).await?;

    assert_eq!(result.num_rows(), 28);

    let stusab = strings(&result, "STUSAB")?;
    assert_eq!(stusab.iter().filter(|s| *s == "RI").count(), 5);
    assert_eq!(stusab.iter().filter(|s| *s == "WY").count(), 23);

    let geoids = strings(&result, "GEOID")?;
    for (geoid, abbr) in geoids.iter().zip(&stusab) {
        let fips = Jurisdiction::lookup(abbr).ok_or("unknown STUSAB")?.fips;
        assert_eq!(&geoid[geoid.len() - 5..geoid.len() - 3], fips, "{geoid}");
        assert!(geoid.starts_with("0500000US"), "{geoid}");
    }

    // Request order decides table order.
    assert!(stusab[..5].iter().all(|s| s == "RI"));
    Ok(())
}

#[tokio::test]
async fn column_list_without_geoid_still_returns_it_once() -> TestResult {
    let tmp = TempDir::new()?;
    let location = ri_wy_dataset(&tmp).await?;

    let request = QueryRequest::new()
        .jurisdictions(["wy"])
        .summary_levels(["050"])
        .columns(["NAME", "P0010001"]);
    let result = read_filtered(&location, &request).await?;

    let names: Vec<String> = result
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, ["GEOID", "NAME", "P0010001"]);
    assert_eq!(result.num_rows(), 23);

    let county_names = strings(&result, "NAME")?;
    assert_eq!(county_names[0], FIRST_COUNTY_NAME);
    Ok(())
}

#[tokio::test]
async fn unknown_jurisdiction_is_rejected_without_partial_results() -> TestResult {
    let tmp = TempDir::new()?;
    let location = ri_wy_dataset(&tmp).await?;

    let request = QueryRequest::new().jurisdictions(["RI", "Atlantis"]);
    let err = read_filtered(&location, &request)
        .await
        .expect_err("Atlantis is not a jurisdiction");

    assert!(matches!(err, QueryError::UnknownJurisdiction { ref code } if code == "Atlantis"));
    Ok(())
}

#[tokio::test]
async fn whole_dataset_without_filters() -> TestResult {
    let tmp = TempDir::new()?;
    let location = ri_wy_dataset(&tmp).await?;

    let result = read_filtered(&location, &QueryRequest::new()).await?;

    // State row + counties + one tract, per jurisdiction.
    assert_eq!(result.num_rows(), (1 + 5 + 1) + (1 + 23 + 1));
    assert_eq!(result.num_columns(), 398);
    assert_eq!(strings(&result, "GEOID")?[0], "0400000US44");
    Ok(())
}

#[tokio::test]
async fn bulk_ingest_reports_each_jurisdiction_independently() -> TestResult {
    let tmp = TempDir::new()?;
    let archives = tmp.path().join("archives");
    write_archive(&archives, "RI", "44", 5)?;
    write_archive(&archives, "WY", "56", 23)?;
    // Not a zip at all.
    std::fs::write(archives.join("de2020.pl.zip"), b"garbage")?;

    let source = DirArchiveSource::new(&archives);
    let jurisdictions = resolve_jurisdictions(["RI", "VT", "WY", "DE"])?;
    let outcomes: Vec<_> = ingest_many(&source, jurisdictions, quick_options())
        .collect()
        .await;

    assert_eq!(outcomes.len(), 4);
    for outcome in &outcomes {
        match (outcome.jurisdiction.abbr, &outcome.result) {
            ("RI", Ok(table)) => assert_eq!(table.num_rows(), 7),
            ("WY", Ok(table)) => assert_eq!(table.num_rows(), 25),
            (
                "VT",
                Err(IngestError::Fetch {
                    source: FetchError::RetrievalExhausted { attempts, .. },
                }),
            ) => assert_eq!(*attempts, 2),
            ("DE", Err(IngestError::Archive { .. })) => {}
            (abbr, other) => panic!("unexpected outcome for {abbr}: {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn single_jurisdiction_ingest_by_numeric_code() -> TestResult {
    let tmp = TempDir::new()?;
    write_archive(tmp.path(), "RI", "44", 5)?;
    let source = DirArchiveSource::new(tmp.path());

    let table = ingest_jurisdiction(&source, "44", RetryPolicy::new(1, Duration::ZERO)).await?;
    assert_eq!(table.num_rows(), 7);

    let err = ingest_jurisdiction(&source, "99", RetryPolicy::new(1, Duration::ZERO))
        .await
        .expect_err("99 is not a jurisdiction code");
    assert!(matches!(err, IngestError::UnknownJurisdiction { .. }));
    Ok(())
}
