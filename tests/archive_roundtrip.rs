//! Both archive formats must extract to the same `<source-name>/...` tree.

use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use tempfile::tempdir;

use dist_forge::archive::compress_dir;
use dist_forge::{ArchiveFormat, CompressionJob};

/// Relative path -> content for every regular file under `root`.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.insert(key, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn build_tree(root: &Path) {
    fs::create_dir_all(root.join("runtimes/linux-x64/native")).unwrap();
    fs::create_dir_all(root.join("empty-dir")).unwrap();
    fs::write(root.join("redlines"), b"\x7fELF fake binary").unwrap();
    fs::write(root.join("redlines.deps.json"), br#"{"runtimeTarget": {}}"#).unwrap();
    fs::write(
        root.join("runtimes/linux-x64/native/libSkiaSharp.so"),
        vec![0xAB_u8; 64 * 1024],
    )
    .unwrap();
}

#[tokio::test]
async fn test_tar_and_zip_extract_to_identical_trees() {
    let tmp = tempdir().expect("Failed to create temp dir");
    let source = tmp.path().join("build/linux-x64");
    build_tree(&source);

    let tar_target = tmp.path().join("dist/linux-x64-1.2.3.tar.gz");
    let zip_target = tmp.path().join("dist/linux-x64-1.2.3.zip");

    let tar_report = compress_dir(&source, &tar_target).await.unwrap();
    let zip_report = compress_dir(&source, &zip_target).await.unwrap();
    assert_eq!(tar_report.format, ArchiveFormat::TarGz);
    assert_eq!(zip_report.format, ArchiveFormat::Zip);
    assert_eq!(tar_report.files, 3);
    assert_eq!(zip_report.files, 3);

    let tar_out = tmp.path().join("tar-out");
    tar::Archive::new(GzDecoder::new(File::open(&tar_target).unwrap()))
        .unpack(&tar_out)
        .unwrap();
    let zip_out = tmp.path().join("zip-out");
    zip::ZipArchive::new(File::open(&zip_target).unwrap())
        .unwrap()
        .extract(&zip_out)
        .unwrap();

    // single top-level directory named after the source
    for out in [&tar_out, &zip_out] {
        let top: Vec<_> = fs::read_dir(out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(top, vec!["linux-x64".to_string()]);
    }

    let expected = snapshot(&source);
    assert_eq!(snapshot(&tar_out.join("linux-x64")), expected);
    assert_eq!(snapshot(&zip_out.join("linux-x64")), expected);
}

#[tokio::test]
async fn test_archiving_twice_yields_same_entry_set() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("win-x64");
    build_tree(&source);

    let first = tmp.path().join("a/win-x64-1.0.zip");
    let second = tmp.path().join("b/win-x64-1.0.zip");
    compress_dir(&source, &first).await.unwrap();

    // archive(extract(archive(D))) has the same entries and content as archive(D)
    let extracted = tmp.path().join("extracted");
    zip::ZipArchive::new(File::open(&first).unwrap())
        .unwrap()
        .extract(&extracted)
        .unwrap();
    compress_dir(&extracted.join("win-x64"), &second).await.unwrap();

    let names = |path: &Path| {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        let contents: Vec<Vec<u8>> = names
            .iter()
            .map(|n| {
                let mut buf = Vec::new();
                std::io::copy(&mut archive.by_name(n).unwrap(), &mut buf).unwrap();
                buf
            })
            .collect();
        (names, contents)
    };
    assert_eq!(names(&first), names(&second));
}

#[tokio::test]
async fn test_concurrent_archives_do_not_interfere() {
    let tmp = tempdir().unwrap();
    let mut jobs = Vec::new();
    for rid in ["linux-x64", "linux-arm64", "win-x64", "win-arm64", "osx-x64", "osx-arm64"] {
        let source = tmp.path().join("out").join(rid);
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("id.txt"), rid).unwrap();
        let ext = if rid.starts_with("win") { "zip" } else { "tar.gz" };
        jobs.push(CompressionJob::new(
            rid,
            source,
            tmp.path().join(format!("dist/{}-4.0.{}", rid, ext)),
        ));
    }

    let outcomes = dist_forge::run_compression_jobs(&jobs).await;
    assert!(outcomes.iter().all(|o| o.is_ok()));

    for job in &jobs {
        let out = tmp.path().join("check").join(&job.label);
        if job.target.to_string_lossy().ends_with(".zip") {
            zip::ZipArchive::new(File::open(&job.target).unwrap())
                .unwrap()
                .extract(&out)
                .unwrap();
        } else {
            tar::Archive::new(GzDecoder::new(File::open(&job.target).unwrap()))
                .unpack(&out)
                .unwrap();
        }
        let id = fs::read_to_string(out.join(&job.label).join("id.txt")).unwrap();
        assert_eq!(id, job.label);
    }
}
