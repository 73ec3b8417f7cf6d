use std::fs::File;
use std::io::Write;
use std::path::Path;

use chronoslot::{
    Engine, EngineConfig, Error, Number, NumberType, PartitionPeriod, QueryRequest,
    SeriesDefinition, StorageRoot,
};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const JAN_1: i64 = 1_704_067_200_000;
const HOUR: i64 = 3_600_000;

/// Packs every `<series>/<file>` under `root` into a zip at `target`.
fn pack(root: &Path, target: &Path) {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(File::create(target).expect("create zip"));
    for series in std::fs::read_dir(root).expect("read root") {
        let series = series.expect("entry").path();
        let id = series.file_name().expect("name").to_string_lossy().to_string();
        for file in std::fs::read_dir(&series).expect("read series") {
            let file = file.expect("entry").path();
            let name = file.file_name().expect("name").to_string_lossy().to_string();
            zip.start_file(format!("{id}/{name}"), options).expect("start file");
            zip.write_all(&std::fs::read(&file).expect("read file")).expect("write entry");
        }
    }
    zip.finish().expect("finish zip");
}

#[test]
fn archive_root_serves_reads_and_rejects_writes() {
    let dir = tempdir().expect("tempdir");
    let db = dir.path().join("db");
    {
        let engine = Engine::open(EngineConfig::with_root(StorageRoot::Directory(db.clone())))
            .expect("open engine");
        engine
            .create_series(
                SeriesDefinition::new("wind.speed", NumberType::Curved2, HOUR, PartitionPeriod::Day)
                    .with_bounds(-50.0, 50.0),
            )
            .expect("create series");
        let batch: Vec<_> = (0..30)
            .map(|h| (JAN_1 + h * HOUR, Some(Number::Float(h as f64 - 10.0))))
            .collect();
        engine.insert("wind.speed", &batch, None).expect("insert");
    }

    let archive = dir.path().join("db.zip");
    pack(&db, &archive);

    let engine = Engine::open(EngineConfig::with_root(StorageRoot::parse(
        archive.to_str().expect("utf-8 path"),
    )))
    .expect("open archive engine");
    assert!(engine.is_read_only());
    assert_eq!(engine.list_series().len(), 1);
    assert_eq!(engine.partitions("wind.speed").expect("partitions").len(), 2);

    let value = engine.get("wind.speed", JAN_1 + 12 * HOUR).expect("get").expect("present");
    assert!((value.as_f64() - 2.0).abs() < 0.01);
    assert_eq!(engine.get("wind.speed", JAN_1 + 40 * HOUR).expect("get"), None);

    let samples = engine
        .query("wind.speed", &QueryRequest::new(JAN_1 + 22 * HOUR, JAN_1 + 25 * HOUR))
        .expect("query");
    assert_eq!(samples.len(), 4);
    assert!(samples.iter().all(|s| s.value.is_some()));

    assert!(matches!(
        engine.insert("wind.speed", &[(JAN_1, Some(Number::Float(1.0)))], None),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(engine.delete_series("wind.speed"), Err(Error::ReadOnly)));
    assert!(matches!(
        engine.create_series(SeriesDefinition::new("x", NumberType::Int1, HOUR, PartitionPeriod::Day)),
        Err(Error::ReadOnly)
    ));
    // archive untouched
    drop(engine);
    assert!(archive.is_file());
    assert!(Engine::open(EngineConfig::with_root(StorageRoot::Archive(archive))).is_ok());
}

#[test]
fn read_only_directory_root() {
    let dir = tempdir().expect("tempdir");
    {
        let engine = Engine::open(EngineConfig::with_root(StorageRoot::Directory(
            dir.path().to_path_buf(),
        )))
        .expect("open engine");
        engine
            .create_series(SeriesDefinition::new("s", NumberType::Float2, HOUR, PartitionPeriod::Month))
            .expect("create series");
        engine.insert("s", &[(JAN_1, Some(Number::Float(0.5)))], None).expect("insert");
    }

    let mut config = EngineConfig::with_root(StorageRoot::Directory(dir.path().to_path_buf()));
    config.read_only = true;
    config.create_on_insert = Some(chronoslot::SeriesTemplate::default());
    let engine = Engine::open(config).expect("open read-only");
    assert_eq!(engine.get("s", JAN_1).expect("get"), Some(Number::Float(0.5)));
    assert!(matches!(
        engine.insert("s", &[(JAN_1, Some(Number::Float(1.0)))], None),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(
        engine.insert("brand.new", &[(JAN_1, Some(Number::Float(1.0)))], None),
        Err(Error::ReadOnly)
    ));
}
