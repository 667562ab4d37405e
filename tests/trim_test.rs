//! Integration tests: build synthetic coadd files on disk, trim them against a
//! reference catalog, and check the written files.

use std::fs;
use std::path::{Path, PathBuf};

use skytrim::fits::{read_fits, write_fits, BinTableBuilder, FitsFile, Hdu};
use skytrim::{trim_file, trimmed_path, Catalog, CatalogConfig, SkytrimError, TrimConfig};

/// Coadd with one FIBERMAP row per target plus per-band arrays.
fn coadd(positions: &[(f64, f64)]) -> FitsFile {
    let n = positions.len();
    let ra: Vec<f64> = positions.iter().map(|p| p.0).collect();
    let dec: Vec<f64> = positions.iter().map(|p| p.1).collect();
    let ids: Vec<i64> = (0..n as i64).map(|i| 39627000 + i).collect();
    let n_wave = 5;
    let flux: Vec<f32> = (0..n * n_wave).map(|v| v as f32 * 0.5).collect();
    let mask: Vec<i32> = (0..n * n_wave).map(|v| (v % 3) as i32).collect();

    FitsFile::new(vec![
        Hdu::empty_primary(),
        BinTableBuilder::new("FIBERMAP")
            .column_i64("TARGETID", &ids)
            .column_f64("TARGET_RA", &ra)
            .column_f64("TARGET_DEC", &dec)
            .column_str("OBJTYPE", 3, &vec!["TGT"; n])
            .build()
            .unwrap(),
        Hdu::image_f32("B_WAVELENGTH", &[n_wave], &[3600.0, 3600.8, 3601.6, 3602.4, 3603.2])
            .unwrap(),
        Hdu::image_f32("B_FLUX", &[n, n_wave], &flux).unwrap(),
        Hdu::image_i32("B_MASK", &[n, n_wave], &mask).unwrap(),
    ])
}

fn write_coadd(dir: &Path, name: &str, positions: &[(f64, f64)]) -> PathBuf {
    let path = dir.join(name);
    write_fits(&path, &coadd(positions)).unwrap();
    path
}

const TARGETS: [(f64, f64); 3] = [(10.0, 5.0), (50.0, 50.0), (10.00005, 5.00005)];

fn reference() -> Catalog {
    Catalog::from_radec(&[(10.0, 5.0), (10.0001, 5.0001)])
}

#[test]
fn trims_to_matching_rows_in_order() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-main-dark-1.fits", &TARGETS);

    let report = trim_file(&input, &reference(), &TrimConfig::default()).unwrap();
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.kept_rows, 2);
    assert_eq!(report.report_rows, 2);
    assert_eq!(report.segments_trimmed, 3);
    assert_eq!(report.segments_copied, 2);
    assert_eq!(report.output, dir.path().join("coadd-main-dark-1.trimmed.fits"));
    assert!(!report.deleted_original);
    assert!(input.exists());

    let original = read_fits(&input).unwrap();
    let trimmed = read_fits(&report.output).unwrap();
    let (_, fibermap) = trimmed.find("FIBERMAP").unwrap();
    assert_eq!(fibermap.row_count(), Some(2));
    assert_eq!(
        fibermap.read_column_f64("TARGETID").unwrap(),
        vec![39627000.0, 39627002.0]
    );
    assert_eq!(
        fibermap.read_column_f64("TARGET_RA").unwrap(),
        vec![10.0, 10.00005]
    );

    // Row-aligned arrays carry the same rows as FIBERMAP.
    for name in ["B_FLUX", "B_MASK"] {
        let (_, before) = original.find(name).unwrap();
        let (_, after) = trimmed.find(name).unwrap();
        assert_eq!(after.row_count(), Some(2));
        assert_eq!(after.row(0), before.row(0));
        assert_eq!(after.row(1), before.row(2));
    }

    // Non-aligned segments are untouched, header cards included.
    assert_eq!(trimmed.hdus[0], original.hdus[0]);
    assert_eq!(
        trimmed.find("B_WAVELENGTH").unwrap().1,
        original.find("B_WAVELENGTH").unwrap().1
    );
}

#[test]
fn no_matches_writes_zero_row_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-1.fits", &TARGETS);
    let far = Catalog::from_radec(&[(200.0, -40.0)]);

    let report = trim_file(&input, &far, &TrimConfig::default()).unwrap();
    assert_eq!(report.kept_rows, 0);

    let trimmed = read_fits(&report.output).unwrap();
    for name in ["FIBERMAP", "B_FLUX", "B_MASK"] {
        assert_eq!(trimmed.find(name).unwrap().1.row_count(), Some(0), "{name}");
    }
    assert_eq!(trimmed.find("B_WAVELENGTH").unwrap().1.row_count(), Some(5));
}

#[test]
fn trimming_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-1.fits", &TARGETS);
    let first = trim_file(&input, &reference(), &TrimConfig::default()).unwrap();

    let config = TrimConfig {
        output: Some(dir.path().join("again.fits")),
        ..Default::default()
    };
    let second = trim_file(&first.output, &reference(), &config).unwrap();
    assert_eq!(second.total_rows, 2);
    assert_eq!(second.kept_rows, 2);
    assert_eq!(
        fs::read(&first.output).unwrap(),
        fs::read(&second.output).unwrap()
    );
}

#[test]
fn same_input_gives_same_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-1.fits", &TARGETS);
    let a = dir.path().join("a.fits");
    let b = dir.path().join("b.fits");
    for out in [&a, &b] {
        let config = TrimConfig {
            output: Some(out.clone()),
            ..Default::default()
        };
        trim_file(&input, &reference(), &config).unwrap();
    }
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn missing_position_columns_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("coadd-1.fits");
    let file = FitsFile::new(vec![
        Hdu::empty_primary(),
        BinTableBuilder::new("FIBERMAP")
            .column_f64("FLUX_G", &[1.0, 2.0])
            .build()
            .unwrap(),
    ]);
    write_fits(&input, &file).unwrap();

    let config = TrimConfig {
        delete_original: true,
        ..Default::default()
    };
    let err = trim_file(&input, &reference(), &config).unwrap_err();
    assert!(matches!(err, SkytrimError::MalformedInput(_)));
    assert!(!trimmed_path(&input).exists());
    assert!(input.exists());
}

#[test]
fn missing_primary_segment_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-1.fits", &TARGETS);
    let config = TrimConfig {
        primary_segment: "EXP_FIBERMAP".to_string(),
        ..Default::default()
    };
    let err = trim_file(&input, &reference(), &config).unwrap_err();
    assert!(matches!(err, SkytrimError::MalformedInput(_)));
    assert!(!trimmed_path(&input).exists());
}

#[test]
fn image_primary_segment_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-1.fits", &TARGETS);
    let config = TrimConfig {
        primary_segment: "B_FLUX".to_string(),
        delete_original: true,
        ..Default::default()
    };
    let err = trim_file(&input, &reference(), &config).unwrap_err();
    assert!(matches!(err, SkytrimError::MalformedInput(_)));
    assert!(!err.is_io_failure());
    assert!(!trimmed_path(&input).exists());
    assert!(input.exists());
}

#[test]
fn corrupt_input_is_an_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("coadd-1.fits");
    fs::write(&input, b"SIMPLE  =                    T").unwrap();
    let err = trim_file(&input, &reference(), &TrimConfig::default()).unwrap_err();
    assert!(err.is_io_failure());
    assert!(!trimmed_path(&input).exists());
}

#[test]
fn delete_original_after_write() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-1.fits", &TARGETS);
    let config = TrimConfig {
        delete_original: true,
        ..Default::default()
    };
    let report = trim_file(&input, &reference(), &config).unwrap();
    assert!(report.deleted_original);
    assert!(!input.exists());
    assert!(report.output.exists());
}

#[test]
fn failed_write_keeps_original() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_coadd(dir.path(), "coadd-1.fits", &TARGETS);
    let config = TrimConfig {
        output: Some(dir.path().join("missing-dir").join("out.fits")),
        delete_original: true,
        ..Default::default()
    };
    let err = trim_file(&input, &reference(), &config).unwrap_err();
    assert!(err.is_io_failure());
    assert!(input.exists());
}

#[test]
fn generic_position_columns_and_csv_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("matches.csv");
    fs::write(
        &csv,
        "TARGETID,RA_DESI,DEC_DESI\n1,10.0,5.0\n2,10.0001,5.0001\n",
    )
    .unwrap();
    let reference = Catalog::from_csv_path(&csv, &CatalogConfig::default()).unwrap();
    assert_eq!(reference.len(), 2);

    let input = dir.path().join("coadd-1.fits");
    let file = FitsFile::new(vec![
        Hdu::empty_primary(),
        BinTableBuilder::new("FIBERMAP")
            .column_f64("RA", &[10.0, 50.0, 10.00005])
            .column_f64("DEC", &[5.0, 50.0, 5.00005])
            .build()
            .unwrap(),
    ]);
    write_fits(&input, &file).unwrap();

    let report = trim_file(&input, &reference, &TrimConfig::default()).unwrap();
    assert_eq!(report.kept_rows, 2);
}

#[test]
fn wider_report_threshold_counts_more_rows() {
    let dir = tempfile::tempdir().unwrap();
    // Second target sits ~2" from the reference point.
    let input = write_coadd(
        dir.path(),
        "coadd-1.fits",
        &[(120.0, 30.0), (120.0, 30.0 + 2.0 / 3600.0)],
    );
    let reference = Catalog::from_radec(&[(120.0, 30.0)]);
    let report = trim_file(&input, &reference, &TrimConfig::default()).unwrap();
    assert_eq!(report.kept_rows, 1);
    assert_eq!(report.report_rows, 2);
}
