use {
    rollog::{Bucket, Config, Cycle, LogError, PooledRecord, SyncWriter, Writer},
    std::{fs, path::Path},
};

fn open(dir: &Path, rotate_bytes: u64, rotate_cycle: Cycle) -> SyncWriter {
    SyncWriter::open(&Config {
        path: dir.join("app.log").to_string_lossy().into_owned(),
        rotate_bytes,
        rotate_cycle,
        ..Config::default()
    })
    .unwrap()
}

fn record(writer: &SyncWriter, bucket: Bucket, body: &[u8]) -> PooledRecord {
    let mut record = writer.acquire();
    record.set_bucket(bucket);
    record.extend_from_slice(body);
    record
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn size_rotation_keeps_every_file_within_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let writer = open(dir.path(), 1000, Cycle::None);
    let bucket = Bucket::new(2024, 3, 10, 12);
    let line = [b'x'; 100];

    for _ in 0..95 {
        writer.write(record(&writer, bucket, &line)).unwrap();
    }
    writer.close().unwrap();

    // ten 100 byte records fill a file exactly, the eleventh starts a new one
    assert_eq!(writer.rotations(), 9);
    let mut total = 0;
    for name in file_names(dir.path()) {
        let size = fs::metadata(dir.path().join(&name)).unwrap().len();
        assert!(size <= 1000, "{name} has {size} bytes");
        total += size;
    }
    assert_eq!(total, 9500);
    assert_eq!(fs::metadata(dir.path().join("app.log")).unwrap().len(), 500);
}

#[test]
fn daily_boundary_rotates_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let writer = open(dir.path(), 0, Cycle::Daily);
    let evening = Bucket::new(2023, 12, 31, 23);
    let morning = Bucket::new(2024, 1, 1, 0);

    writer.write(record(&writer, evening, b"before midnight\n")).unwrap();
    writer.write(record(&writer, evening, b"still before\n")).unwrap();
    writer.write(record(&writer, morning, b"after midnight\n")).unwrap();
    writer.write(record(&writer, Bucket::new(2024, 1, 1, 9), b"same day\n")).unwrap();
    writer.close().unwrap();

    assert_eq!(writer.rotations(), 1);
    assert_eq!(file_names(dir.path()), vec!["app.log", "app.log.2023-12-31"]);
    assert_eq!(
        fs::read_to_string(dir.path().join("app.log.2023-12-31")).unwrap(),
        "before midnight\nstill before\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("app.log")).unwrap(),
        "after midnight\nsame day\n"
    );
}

#[test]
fn late_record_after_midnight_does_not_rotate_back() {
    let dir = tempfile::tempdir().unwrap();
    let writer = open(dir.path(), 0, Cycle::Daily);
    let june_1 = Bucket::new(2024, 6, 1, 23);
    let june_2 = Bucket::new(2024, 6, 2, 0);

    writer.write(record(&writer, june_1, b"june 1\n")).unwrap();
    writer.write(record(&writer, june_2, b"june 2\n")).unwrap();
    // rendered before midnight, locked after
    writer.write(record(&writer, june_1, b"june 1 late\n")).unwrap();
    writer.write(record(&writer, june_2, b"june 2 again\n")).unwrap();
    writer.close().unwrap();

    assert_eq!(writer.rotations(), 1);
    assert_eq!(writer.bucket(), june_2);
    assert_eq!(file_names(dir.path()), vec!["app.log", "app.log.2024-06-01"]);
    assert_eq!(fs::read_to_string(dir.path().join("app.log.2024-06-01")).unwrap(), "june 1\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("app.log")).unwrap(),
        "june 2\njune 1 late\njune 2 again\n"
    );
}

#[test]
fn monthly_and_yearly_cycles_ignore_smaller_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let monthly = open(&dir.path().join("monthly"), 0, Cycle::Monthly);
    monthly.write(record(&monthly, Bucket::new(2024, 4, 1, 0), b"a\n")).unwrap();
    monthly.write(record(&monthly, Bucket::new(2024, 4, 30, 23), b"b\n")).unwrap();
    monthly.write(record(&monthly, Bucket::new(2024, 5, 1, 0), b"c\n")).unwrap();
    assert_eq!(monthly.rotations(), 1);

    let yearly = open(&dir.path().join("yearly"), 0, Cycle::Yearly);
    yearly.write(record(&yearly, Bucket::new(2024, 1, 1, 0), b"a\n")).unwrap();
    yearly.write(record(&yearly, Bucket::new(2024, 12, 31, 23), b"b\n")).unwrap();
    assert_eq!(yearly.rotations(), 0);
    yearly.write(record(&yearly, Bucket::new(2025, 1, 1, 0), b"c\n")).unwrap();
    assert_eq!(yearly.rotations(), 1);
}

#[test]
fn rotations_within_one_bucket_get_distinct_names() {
    let dir = tempfile::tempdir().unwrap();
    let writer = open(dir.path(), 10, Cycle::Daily);
    let bucket = Bucket::new(2024, 6, 1, 8);

    for body in [b"first-00\n", b"second-0\n", b"third-00\n", b"fourth-0\n"] {
        writer.write(record(&writer, bucket, body)).unwrap();
    }
    writer.close().unwrap();

    assert_eq!(writer.rotations(), 3);
    assert_eq!(
        file_names(dir.path()),
        vec!["app.log", "app.log.2024-06-01", "app.log.2024-06-01.1", "app.log.2024-06-01.2"]
    );
    assert_eq!(fs::read_to_string(dir.path().join("app.log.2024-06-01")).unwrap(), "first-00\n");
    assert_eq!(fs::read_to_string(dir.path().join("app.log.2024-06-01.2")).unwrap(), "third-00\n");
    assert_eq!(fs::read_to_string(dir.path().join("app.log")).unwrap(), "fourth-0\n");
}

#[test]
fn existing_archives_are_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.log.2024-06-01"), b"from an earlier run\n").unwrap();

    let writer = open(dir.path(), 0, Cycle::Daily);
    writer.write(record(&writer, Bucket::new(2024, 6, 1, 8), b"day one\n")).unwrap();
    writer.write(record(&writer, Bucket::new(2024, 6, 2, 8), b"day two\n")).unwrap();
    writer.close().unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("app.log.2024-06-01")).unwrap(),
        "from an earlier run\n"
    );
    assert_eq!(fs::read_to_string(dir.path().join("app.log.2024-06-01.1")).unwrap(), "day one\n");
}

#[test]
fn standard_streams_never_rotate_or_close() {
    for path in ["stdout", "STDERR"] {
        let writer = SyncWriter::open(&Config {
            path: path.to_string(),
            rotate_bytes: 1,
            rotate_cycle: Cycle::Hourly,
            ..Config::default()
        })
        .unwrap();
        assert_eq!(writer.policy().threshold(), 0);

        writer.write(record(&writer, Bucket::new(2024, 1, 1, 0), b"stream check\n")).unwrap();
        writer.write(record(&writer, Bucket::new(2024, 1, 1, 1), b"stream check\n")).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.rotations(), 0);

        writer.close().unwrap();
        let err = writer.write(record(&writer, Bucket::new(2024, 1, 1, 2), b"late\n")).unwrap_err();
        assert!(matches!(err, LogError::WriterClosed(_)));
    }
    // the process streams are still usable
    println!("stdout still open");
    eprintln!("stderr still open");
}
