use sferase_lib::device::ImageFlash;
use sferase_lib::driver::FlashDevice;
use sferase_lib::{EraseGeometry, EraseRegionFile, EraseRegionParams, SfEraseTool};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn create_image_is_erased() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flash.bin");

    let image = ImageFlash::create(&path, 0x20000, EraseGeometry::default()).unwrap();
    assert_eq!(image.capacity(), 0x20000);
    drop(image);

    let data = std::fs::read(&path).unwrap();
    assert_eq!(data.len(), 0x20000);
    assert!(data.iter().all(|&b| b == 0xFF));
}

#[test]
fn erase_region_persists_to_file() {
    let mut temp = NamedTempFile::new().unwrap();
    temp.write_all(&vec![0x5A; 0x30000]).unwrap();
    temp.flush().unwrap();

    let image = ImageFlash::open(temp.path(), EraseGeometry::default()).unwrap();
    let mut tool = SfEraseTool::new(image, EraseGeometry::default()).unwrap();
    tool.erase_region(&EraseRegionParams {
        regions: vec![EraseRegionFile {
            address: 0x8800,
            size: 0x10000,
        }],
        verify: true,
    })
    .unwrap();
    tool.device().flush().unwrap();
    drop(tool);

    let data = std::fs::read(temp.path()).unwrap();
    assert!(data[..0x8000].iter().all(|&b| b == 0x5A));
    assert!(data[0x8000..0x19000].iter().all(|&b| b == 0xFF));
    assert!(data[0x19000..].iter().all(|&b| b == 0x5A));
}

#[test]
fn write_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flash.bin");
    let mut image = ImageFlash::create(&path, 0x10000, EraseGeometry::default()).unwrap();

    image.write(0x100, b"sferase").unwrap();
    let mut buf = [0u8; 7];
    image.read(0x100, &mut buf).unwrap();
    assert_eq!(&buf, b"sferase");
}

#[test]
fn invalid_images_are_rejected() {
    let empty = NamedTempFile::new().unwrap();
    assert!(ImageFlash::open(empty.path(), EraseGeometry::default()).is_err());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flash.bin");
    assert!(ImageFlash::create(&path, 0, EraseGeometry::default()).is_err());
    assert!(ImageFlash::create(&path, 0x1800, EraseGeometry::default()).is_err());
    assert!(ImageFlash::open(dir.path().join("missing.bin"), EraseGeometry::default()).is_err());
}
