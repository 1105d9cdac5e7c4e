mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use common::{MIB, ram_fs};
use flatfs::{NodeType, OpenMode};

const THREADS: usize = 8;
const PER_THREAD: usize = 12;

#[test]
fn test_parallel_creation() {
    let fs = Arc::new(ram_fs(4 * MIB));
    fs.mkdir("/spool").unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    fs.mknode(&format!("/spool/job-{t}-{i}"), NodeType::FILE).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = fs.read_dir("/spool").unwrap();
    assert_eq!(entries.len(), THREADS * PER_THREAD);
    let blocks: HashSet<u32> = entries.iter().map(|(id, _)| *id).collect();
    assert_eq!(blocks.len(), entries.len(), "two nodes share a home block");
    for t in 0..THREADS {
        for i in 0..PER_THREAD {
            let path = format!("/spool/job-{t}-{i}");
            assert!(fs.find_node(&path, NodeType::FILE).unwrap().is_some(), "{path}");
        }
    }

    let report = fs.check().unwrap();
    assert!(report.is_clean(), "{:?}", report.problems);
}

#[test]
fn test_parallel_writers() {
    let fs = Arc::new(ram_fs(4 * MIB));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let path = format!("/out-{t}");
                let mut file = fs.open(&path, OpenMode::WRITE).unwrap();
                // Small writes so chains from different threads interleave on disk.
                for _ in 0..40 {
                    fs.write(&mut file, &[t as u8; 500]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..THREADS {
        let mut file = fs.open(&format!("/out-{t}"), OpenMode::READ).unwrap();
        let content = fs.read_to_end(&mut file).unwrap();
        assert_eq!(content.len(), 20_000);
        assert!(content.iter().all(|&b| b == t as u8), "file {t} holds foreign bytes");
    }

    let report = fs.check().unwrap();
    assert!(report.is_clean(), "{:?}", report.problems);
    assert_eq!(report.files, THREADS as u32);
}

#[test]
fn test_shared_file_appenders() {
    let fs = Arc::new(ram_fs(MIB));
    fs.create("/log", NodeType::FILE).unwrap();

    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let mut file = fs.open("/log", OpenMode::READ).unwrap();
                let mut buf = [0u8; 64];
                // Readers only ever see whole, in-bounds content.
                for _ in 0..50 {
                    let n = fs.read(&mut file, &mut buf).unwrap();
                    assert!(file.position() <= file.size(), "reader {t} ran past the end");
                    assert!(n <= buf.len());
                }
            })
        })
        .collect();

    let mut writer = fs.open("/log", OpenMode::WRITE).unwrap();
    for _ in 0..100 {
        fs.write(&mut writer, b"0123456789").unwrap();
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(fs.stat("/log").unwrap().1.size, 1_000);
}
