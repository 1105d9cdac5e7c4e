mod common;

use std::fs::File;
use std::sync::Arc;

use common::MIB;
use flatfs::{Error, FileSystem, ImageFile, NodeType, OpenMode};

#[test]
fn test_image_file_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let data: Vec<u8> = (0..10_000u32).map(|i| (i % 97) as u8).collect();

    {
        let device = ImageFile::create(&path, MIB).unwrap();
        let fs = FileSystem::format(Arc::new(device), MIB).unwrap();
        fs.mkdir("/home").unwrap();
        let mut file = fs.open("/home/notes.txt", OpenMode::WRITE).unwrap();
        fs.write(&mut file, &data).unwrap();
        fs.flush().unwrap();
    }
    assert_eq!(std::fs::metadata(&path).unwrap().len(), MIB);

    let device = ImageFile::open(&path).unwrap();
    let fs = FileSystem::mount(Arc::new(device)).unwrap();
    log!("{}", fs.dump().unwrap());

    let (_, node) = fs.find_node("/home/notes.txt", NodeType::FILE).unwrap().unwrap();
    assert_eq!(node.size, 10_000);
    let mut file = fs.open("/home/notes.txt", OpenMode::READ).unwrap();
    assert_eq!(fs.read_to_end(&mut file).unwrap(), data);

    let report = fs.check().unwrap();
    assert!(report.is_clean(), "{:?}", report.problems);
    assert_eq!(report.files, 1);
}

#[test]
fn test_append_after_remount() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    {
        let fs = FileSystem::format(Arc::new(ImageFile::create(&path, MIB).unwrap()), MIB).unwrap();
        let mut file = fs.open("/dev/stdout", OpenMode::WRITE).unwrap();
        fs.write(&mut file, b"line 1\n").unwrap();
        fs.flush().unwrap();
    }
    {
        let fs = FileSystem::mount(Arc::new(ImageFile::open(&path).unwrap())).unwrap();
        let mut file = fs.open("/dev/stdout", OpenMode::APPEND).unwrap();
        fs.write(&mut file, b"line 2\n").unwrap();
        fs.flush().unwrap();
    }
    let fs = FileSystem::mount(Arc::new(ImageFile::open(&path).unwrap())).unwrap();
    let mut file = fs.open("/dev/stdout", OpenMode::READ).unwrap();
    assert_eq!(fs.read_to_end(&mut file).unwrap(), b"line 1\nline 2\n");
}

#[test]
fn test_truncated_image_fails_mount() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    {
        let fs = FileSystem::format(Arc::new(ImageFile::create(&path, MIB).unwrap()), MIB).unwrap();
        fs.flush().unwrap();
    }
    File::options().write(true).open(&path).unwrap().set_len(MIB / 8).unwrap();

    let device = ImageFile::open(&path).unwrap();
    assert_eq!(flatfs::BlockDevice::num_blocks(&device), 32);
    let result = FileSystem::mount(Arc::new(device));
    assert!(matches!(result, Err(Error::InvalidSuperBlock(_))));
}

#[test]
fn test_empty_host_file() {
    let file = tempfile::tempfile().unwrap();
    let device = ImageFile::from_file(file).unwrap();
    let result = FileSystem::mount(Arc::new(device));
    assert!(matches!(result, Err(Error::InvalidBlockId(0))));
}
