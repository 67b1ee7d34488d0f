use crate::error::ShellError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Packaging format of a downloaded artifact, judged by file name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    /// Not an archive; the file itself is the deliverable.
    Other,
}

impl ArchiveKind {
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else {
            Self::Other
        }
    }
}

/// Unpack `archive` into `dest`, reproducing its stored directory layout.
///
/// Entries that would escape `dest` are refused by the underlying readers.
/// Extracting [`ArchiveKind::Other`] is an error.
pub fn extract(kind: ArchiveKind, archive: &Path, dest: &Path) -> Result<(), ShellError> {
    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::TarGz => extract_tar_gz(archive, dest),
        ArchiveKind::Other => Err(ShellError::archive(archive, "not a supported archive type")),
    }
}

pub fn extract_zip(archive: &Path, dest: &Path) -> Result<(), ShellError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| ShellError::archive(archive, e))?;
    zip.extract(dest).map_err(|e| ShellError::archive(archive, e))
}

pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), ShellError> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.set_preserve_permissions(true);
    tar.unpack(dest).map_err(|e| ShellError::archive(archive, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::Write;
    use walkdir::WalkDir;
    use zip::write::SimpleFileOptions;

    const TREE: &[(&str, &str)] = &[
        ("pkg/README.md", "# pkg\n"),
        ("pkg/src/lib.rs", "pub fn f() {}\n"),
        ("pkg/src/nested/deep.txt", "deep"),
    ];

    fn write_zip(path: &Path) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in TREE {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn write_tar_gz(path: &Path) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut tar = tar::Builder::new(encoder);
        for (name, body) in TREE {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        tar.into_inner().unwrap().finish().unwrap();
    }

    fn files_under(root: &Path) -> Vec<(String, String)> {
        let mut files: Vec<(String, String)> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap();
                let rel = rel.to_string_lossy().replace('\\', "/");
                (rel, fs::read_to_string(e.path()).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    fn expected_tree() -> Vec<(String, String)> {
        let mut files: Vec<(String, String)> = TREE
            .iter()
            .map(|(n, b)| (n.to_string(), b.to_string()))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn kind_is_derived_from_suffix() {
        assert_eq!(ArchiveKind::from_file_name("a.zip"), ArchiveKind::Zip);
        assert_eq!(ArchiveKind::from_file_name("a.ZIP"), ArchiveKind::Zip);
        assert_eq!(ArchiveKind::from_file_name("a-src.tar.gz"), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::from_file_name("a.tgz"), ArchiveKind::TarGz);
        assert_eq!(ArchiveKind::from_file_name("a.tar"), ArchiveKind::Other);
        assert_eq!(ArchiveKind::from_file_name("tool-linux-amd64"), ArchiveKind::Other);
    }

    #[test]
    fn zip_extraction_reproduces_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();
        write_zip(&archive);

        extract(ArchiveKind::Zip, &archive, &out).unwrap();
        assert_eq!(files_under(&out), expected_tree());
    }

    #[test]
    fn tar_gz_extraction_reproduces_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.tar.gz");
        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();
        write_tar_gz(&archive);

        extract(ArchiveKind::TarGz, &archive, &out).unwrap();
        assert_eq!(files_under(&out), expected_tree());
    }

    #[test]
    fn corrupt_input_is_an_archive_error() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bad.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let zip_err = extract(ArchiveKind::Zip, &archive, tmp.path()).unwrap_err();
        assert!(matches!(zip_err, ShellError::ArchiveFormat { .. }));

        let tgz_err = extract(ArchiveKind::TarGz, &archive, tmp.path()).unwrap_err();
        assert!(matches!(tgz_err, ShellError::ArchiveFormat { .. }));
    }

    #[test]
    fn other_kind_is_not_extracted() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("tool");
        fs::write(&file, b"\x7fELF").unwrap();
        assert!(extract(ArchiveKind::Other, &file, tmp.path()).is_err());
    }
}
