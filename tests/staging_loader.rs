mod common;

use anyhow::Result;
use tempfile::tempdir;

use churn_elt::pipeline::{LoadOutcome, StagingLoader, Warehouse};
use common::{staging_count, test_config, write_input};

#[test]
fn missing_input_is_skipped_without_touching_staging() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let loader = StagingLoader::from_config(&config);
    let mut wh = Warehouse::open(&config.database)?;

    write_input(&config, &["C1,Female,30,12,50,600,One year,DSL,No"]);
    assert!(matches!(loader.load(&mut wh)?, LoadOutcome::Loaded(_)));
    assert_eq!(staging_count(&config), 1);
    let archived = std::fs::read_dir(&config.paths.archive_dir)?.count();

    let outcome = loader.load(&mut wh)?;

    assert!(matches!(outcome, LoadOutcome::Skipped { .. }));
    assert_eq!(staging_count(&config), 1);
    let audit_rows: i64 =
        wh.conn()
            .query_row("SELECT count(*) FROM staging_schema.load_batches", [], |r| r.get(0))?;
    assert_eq!(audit_rows, 1);
    assert_eq!(std::fs::read_dir(&config.paths.archive_dir)?.count(), archived);
    Ok(())
}

#[test]
fn skipped_load_on_fresh_warehouse_creates_nothing() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let mut wh = Warehouse::open(&config.database)?;

    let outcome = StagingLoader::from_config(&config).load(&mut wh)?;

    assert!(matches!(outcome, LoadOutcome::Skipped { .. }));
    assert!(!config.paths.archive_dir.exists());
    Ok(())
}

#[test]
fn loads_normalized_rows_and_archives_input() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    write_input(
        &config,
        &[
            "C1,Female,30,12,50.5,600.25,One year,Fiber optic,No",
            "C2,,70,,abc,,,,",
            "C3, male ,65,3,20,60,Month-to-month,DSL,Yes",
        ],
    );
    let mut wh = Warehouse::open(&config.database)?;

    let outcome = StagingLoader::from_config(&config).load(&mut wh)?;
    let report = match outcome {
        LoadOutcome::Loaded(report) => report,
        other => panic!("expected a load, got {other:?}"),
    };

    assert_eq!(report.rows, 3);
    assert!(!config.paths.input_file.exists());
    assert!(report.archived_to.exists());
    let archived_name = report.archived_to.file_name().unwrap().to_string_lossy().into_owned();
    assert!(archived_name.starts_with("telecom_custom_data_"));
    assert!(archived_name.ends_with(".csv"));

    let mut stmt = wh.conn().prepare(
        "SELECT Gender, Age, Tenure, MonthlyCharges, TotalCharges, ContractType,
                InternetService, Churn, is_female, is_senior, Last_load_time
         FROM staging_schema.raw_telecom_data ORDER BY rowid",
    )?;
    let rows: Vec<(String, i64, i64, f64, f64, String, String, String, i64, i64, String)> = stmt
        .query_map([], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
                r.get(7)?,
                r.get(8)?,
                r.get(9)?,
                r.get(10)?,
            ))
        })?
        .collect::<std::result::Result<_, _>>()?;

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].0, "Female");
    assert_eq!(rows[0].8, 1);
    assert_eq!(rows[0].4, 600.25);

    let dirty = &rows[1];
    assert_eq!(dirty.0, "Unknown");
    assert_eq!(dirty.1, 70);
    assert_eq!(dirty.2, 0);
    assert_eq!(dirty.3, 0.0);
    assert_eq!(dirty.4, 0.0);
    assert_eq!(dirty.5, "Unknown");
    assert_eq!(dirty.6, "Unknown");
    assert_eq!(dirty.7, "No");
    assert_eq!(dirty.9, 1);

    // Padded gender is stored verbatim but still not female
    assert_eq!(rows[2].0, " male ");
    assert_eq!(rows[2].8, 0);
    assert_eq!(rows[2].9, 1);

    // One timestamp per batch
    assert!(rows.iter().all(|r| r.10 == rows[0].10));

    let (audit_rows, audit_count): (i64, i64) = wh.conn().query_row(
        "SELECT count(*), sum(row_count) FROM staging_schema.load_batches",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(audit_rows, 1);
    assert_eq!(audit_count, 3);
    Ok(())
}

#[test]
fn numeric_columns_in_text_fields_are_stored_as_plain_text() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    write_input(
        &config,
        &["C1,Female,30,12,50,600,12.0,DSL,1.0", "C2,Male,40,1,10,10,24,DSL,0"],
    );
    let mut wh = Warehouse::open(&config.database)?;

    StagingLoader::from_config(&config).load(&mut wh)?;

    let mut stmt = wh.conn().prepare(
        "SELECT ContractType, Churn FROM staging_schema.raw_telecom_data ORDER BY rowid",
    )?;
    let rows: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(
        rows,
        vec![
            ("12".to_string(), "1".to_string()),
            ("24".to_string(), "0".to_string())
        ]
    );
    Ok(())
}

#[test]
fn batches_are_appended_across_runs() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let loader = StagingLoader::from_config(&config);
    let mut wh = Warehouse::open(&config.database)?;

    write_input(&config, &["C1,Female,30,12,50,600,One year,DSL,No"]);
    loader.load(&mut wh)?;
    // Archive names have second granularity
    std::thread::sleep(std::time::Duration::from_millis(1100));
    write_input(
        &config,
        &["C2,Male,40,1,10,10,One year,DSL,Yes", "C3,Male,41,1,10,10,One year,DSL,No"],
    );
    loader.load(&mut wh)?;

    assert_eq!(staging_count(&config), 3);
    assert_eq!(std::fs::read_dir(&config.paths.archive_dir)?.count(), 2);
    Ok(())
}

#[test]
fn missing_required_column_fails_and_keeps_input() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    std::fs::create_dir_all(config.paths.input_file.parent().unwrap())?;
    std::fs::write(
        &config.paths.input_file,
        "Age,Tenure,MonthlyCharges,TotalCharges,ContractType,InternetService,Churn\n30,1,1,1,x,y,No\n",
    )?;
    let mut wh = Warehouse::open(&config.database)?;

    let err = StagingLoader::from_config(&config).load(&mut wh).unwrap_err();

    assert!(err.to_string().contains("Gender"));
    assert!(config.paths.input_file.exists());
    assert_eq!(staging_count(&config), 0);
    Ok(())
}

#[test]
fn failed_insert_rolls_back_the_whole_batch() -> Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let mut wh = Warehouse::open(&config.database)?;

    // A staging table with a stricter contract: no seniors allowed. The second
    // row violates it after the first has already been inserted.
    wh.conn().execute_batch(
        "CREATE TABLE staging_schema.raw_telecom_data (
            Gender TEXT NOT NULL, Age INTEGER NOT NULL CHECK (Age < 65), Tenure INTEGER NOT NULL,
            MonthlyCharges REAL NOT NULL, TotalCharges REAL NOT NULL, ContractType TEXT NOT NULL,
            InternetService TEXT NOT NULL, Churn TEXT NOT NULL, is_female INTEGER NOT NULL,
            is_senior INTEGER NOT NULL, Last_load_time TEXT NOT NULL)",
    )?;
    write_input(
        &config,
        &["C1,Female,30,12,50,600,One year,DSL,No", "C2,Male,80,1,10,10,One year,DSL,Yes"],
    );

    let result = StagingLoader::from_config(&config).load(&mut wh);

    assert!(result.is_err());
    assert_eq!(staging_count(&config), 0);
    assert!(config.paths.input_file.exists());
    assert!(!config.paths.archive_dir.exists());
    Ok(())
}
