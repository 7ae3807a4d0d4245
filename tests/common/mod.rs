//! Shared setup for the integration tests.

#![allow(dead_code)]

use image::{ExtendedColorType, ImageEncoder, RgbImage};
use sha2::{Digest, Sha256};
use simple_assets::tasks::sources::expand;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const NONE: &[&str] = &[];

/// Copy `fixtures/site/` into a temp project root and synthesize its rasters.
pub fn setup_site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path());

    let img = tmp.path().join("src/img");
    std::fs::create_dir_all(img.join("photos")).unwrap();
    write_jpeg(&img.join("hero.jpg"), 160, 120);
    write_png(&img.join("photos/team.png"), 64, 48);
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) {
    for entry in std::fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path).unwrap();
            copy_dir_recursive(&src_path, &dst_path);
        } else {
            std::fs::copy(&src_path, &dst_path).unwrap();
        }
    }
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 3 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    image::codecs::jpeg::JpegEncoder::new_with_quality(std::io::BufWriter::new(file), 95)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    let img = gradient(width, height);
    let file = std::fs::File::create(path).unwrap();
    image::codecs::png::PngEncoder::new(std::io::BufWriter::new(file))
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
}

/// Relative path → SHA-256 of every file under `root`.
pub fn digest_tree(root: &Path) -> BTreeMap<String, String> {
    expand(root, &["**/*"], NONE)
        .unwrap()
        .into_iter()
        .map(|file| {
            let bytes = std::fs::read(&file.path).unwrap();
            let digest = Sha256::digest(&bytes);
            let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
            (file.relative.to_string_lossy().replace('\\', "/"), hex)
        })
        .collect()
}

/// Every file under `root`, relative, with forward slashes.
pub fn list_tree(root: &Path) -> Vec<String> {
    digest_tree(root).into_keys().collect()
}

/// Send a raw HTTP/1.1 request and return the whole response.
pub fn http(addr: SocketAddr, method: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(
        stream,
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    )
    .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    response
}
