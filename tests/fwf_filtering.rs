mod common;

use std::collections::BTreeSet;

use anyhow::Result;
use filespec::{default_registry, DateFilter, FileSpecification, Source};

use common::{ids, init_test_logging};

const SPEC: &str = r##"
READER: fwf
COMMENTS: "#"
FIELDSPEC_DEFAULTS: {dtype: int32, strftime: "%Y%m%d"}
FIELDSPECS:
  - {name: ID, len: 5}
  - {name: valid_from, len: 8}
  - {name: valid_until, len: 8}
  - {name: changed, len: 8}
EFFECTIVE_DATE_FIELD: changed
PERIOD_DATE_FIELDS: {from: valid_from, to: valid_until, inclusive: true}
"##;

const DATA: &str = "#
1    199901012199123120180601
2    201801012018013120180701
3    201802012018033120180801
4    201803012018030120180901
5    201804012018030120180801
6    201804302018053120180701
7    201812312019123120180601
8    201812012018123120180501
9    201805012018123120180601
10   201805022199123120180701
";

fn source() -> Source {
    Source::bytes("effective_period.dat", DATA)
}

fn spec() -> FileSpecification {
    FileSpecification::from_yaml_str("effective_period", SPEC).unwrap()
}

fn set(values: &[i32]) -> BTreeSet<i32> {
    values.iter().copied().collect()
}

#[test]
fn snapshot_at_effective_date() -> Result<()> {
    init_test_logging();
    let spec = spec();
    let cases: &[(&str, &[i32])] = &[
        ("20180430", &[]),
        ("20180501", &[8]),
        ("20180531", &[8]),
        ("20180601", &[1, 7, 8, 9]),
        ("20180630", &[1, 7, 8, 9]),
        ("20180701", &[1, 2, 6, 7, 8, 9, 10]),
        ("20180731", &[1, 2, 6, 7, 8, 9, 10]),
        ("20180801", &[1, 2, 3, 5, 6, 7, 8, 9, 10]),
        ("20180831", &[1, 2, 3, 5, 6, 7, 8, 9, 10]),
        ("20180901", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
    ];
    for (effective, expected) in cases {
        let batch = spec.load_file(source(), &DateFilter::at(*effective)?)?;
        assert_eq!(ids(&batch, "ID"), set(expected), "effective date {}", effective);
    }
    Ok(())
}

#[test]
fn period_overlap_respects_inclusivity() -> Result<()> {
    init_test_logging();
    let mut spec = spec();
    let cases: &[(&str, &str, &[i32], &[i32])] = &[
        ("20180101", "20180130", &[1, 2], &[1, 2]),
        ("20180101", "20180131", &[1, 2], &[1]),
        ("20180101", "20180201", &[1], &[1]),
    ];
    for (from, until, inclusive, exclusive) in cases {
        let filter = DateFilter::new().with_period(*from, *until)?;

        spec.set(
            "PERIOD_DATE_FIELDS",
            serde_yaml::from_str::<serde_yaml::Value>(
                "{from: valid_from, to: valid_until, inclusive: true}",
            )?,
        )?;
        let batch = spec.load_file(source(), &filter)?;
        assert_eq!(ids(&batch, "ID"), set(inclusive), "inclusive {}..{}", from, until);

        spec.set("PERIOD_DATE_FIELDS", vec!["valid_from", "valid_until"])?;
        let batch = spec.load_file(source(), &filter)?;
        assert_eq!(ids(&batch, "ID"), set(exclusive), "exclusive {}..{}", from, until);
    }
    Ok(())
}

#[test]
fn period_windows_over_the_year() -> Result<()> {
    init_test_logging();
    let spec = spec();
    let cases: &[(&str, &str, &[i32])] = &[
        ("20180201", "20180228", &[1, 3]),
        ("20180301", "20180331", &[1, 3]),
        ("20180401", "20180430", &[1]),
        ("20180501", "20180531", &[1, 6, 9]),
        ("20180601", "20180630", &[1, 9, 10]),
        ("20181201", "20181231", &[1, 8, 9, 10]),
    ];
    for (from, until, expected) in cases {
        let filter = DateFilter::new().with_period(*from, *until)?;
        let batch = spec.load_file(source(), &filter)?;
        assert_eq!(ids(&batch, "ID"), set(expected), "period {}..{}", from, until);
    }
    Ok(())
}

#[test]
fn effective_date_and_period_combine() -> Result<()> {
    init_test_logging();
    let filter = DateFilter::at("20180630")?.with_period("20180601", "20180630")?;
    let batch = spec().load_file(source(), &filter)?;
    assert_eq!(ids(&batch, "ID"), set(&[1, 9]));
    Ok(())
}

#[test]
fn latest_revision_per_id() -> Result<()> {
    init_test_logging();
    let mut spec = spec();
    spec.set("INDEX_COL", "ID")?;
    let data = "\
1    201801012199123120180101
1    201801012018063020180601
2    201801012199123120180301
1    201801012018033120180301
";
    let batch = spec.load_file(Source::bytes("revisions.dat", data), &DateFilter::at("20180901")?)?;
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(ids(&batch, "ID"), set(&[1, 2]));
    assert_eq!(ids(&batch, "changed"), set(&[20180601, 20180301]));

    // a snapshot before the newest revision falls back to the previous one
    let batch = spec.load_file(Source::bytes("revisions.dat", data), &DateFilter::at("20180401")?)?;
    assert_eq!(ids(&batch, "changed"), set(&[20180301]));
    assert_eq!(batch.num_rows(), 2);
    Ok(())
}

#[test]
fn period_filter_runs_before_revision_selection() -> Result<()> {
    init_test_logging();
    let mut spec = spec();
    spec.set("INDEX_COL", "ID")?;
    // the newer revision of 1 only starts in June
    let data = "\
1    201801012199123120180101
1    201806012199123120180301
2    201801012199123120180201
";
    let filter = DateFilter::at("20180901")?.with_period("20180401", "20180430")?;
    let batch = spec.load_file(Source::bytes("revisions.dat", data), &filter)?;
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(ids(&batch, "ID"), set(&[1, 2]));
    assert_eq!(ids(&batch, "changed"), set(&[20180101, 20180201]));

    // once the period covers June the newer revision wins
    let filter = DateFilter::at("20180901")?.with_period("20180601", "20180630")?;
    let batch = spec.load_file(Source::bytes("revisions.dat", data), &filter)?;
    assert_eq!(ids(&batch, "changed"), set(&[20180301, 20180201]));
    Ok(())
}

#[test]
fn full_and_delta_files_merge_before_selection() -> Result<()> {
    init_test_logging();
    let mut spec = spec();
    spec.set("INDEX_COL", "ID")?;
    spec.set("FULL_FILES", "*_FULL.dat")?;
    let full = Source::bytes(
        "people_FULL.dat",
        "1    201801012199123120180101\n2    201801012199123120180101\n",
    );
    let delta = Source::bytes("people_DELTA.dat", "1    201801012018063020180301\n");
    assert!(spec.is_full(&full.name()));
    assert!(!spec.is_full(&delta.name()));

    let files = [full, delta];
    let batch = default_registry().load_many(&spec, &files, &DateFilter::at("20180901")?)?;
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(ids(&batch, "ID"), set(&[1, 2]));
    assert_eq!(ids(&batch, "valid_until"), set(&[20180630, 21991231]));

    // before the delta took effect the full file alone decides
    let batch = default_registry().load_many(&spec, &files, &DateFilter::at("20180201")?)?;
    assert_eq!(ids(&batch, "changed"), set(&[20180101]));
    assert_eq!(batch.num_rows(), 2);
    Ok(())
}

#[test]
fn missing_ids_are_reported() -> Result<()> {
    init_test_logging();
    let data = "     199901012199123120180601\n";
    match spec().load_file(Source::bytes("broken.dat", data), &DateFilter::new()) {
        Err(filespec::Error::FieldMissingValue { field, file }) => {
            assert_eq!(field, "ID");
            assert_eq!(file, "broken.dat");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    Ok(())
}
