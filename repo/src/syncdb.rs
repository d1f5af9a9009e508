use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;

use crate::{Error, OutputPackage, OutputPackageBase};

/// Which of the two sync databases of a repository is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    /// `<repo>.db`: package descriptions
    Default,
    /// `<repo>.files`: package descriptions and file lists
    Files,
}

/// Compression applied to the sync database tar archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    /// Suffix of a sync database file, e.g. `.db.tar.gz`.
    pub fn db_tar_suffix(self, db_type: DbType) -> &'static str {
        match (db_type, self) {
            (DbType::Default, Compression::None) => ".db.tar",
            (DbType::Default, Compression::Gzip) => ".db.tar.gz",
            (DbType::Files, Compression::None) => ".files.tar",
            (DbType::Files, Compression::Gzip) => ".files.tar.gz",
        }
    }
}

/// Writes one sync database from the pkgbase files of a management repository directory.
#[derive(Debug, Clone)]
pub struct SyncDatabase {
    database: PathBuf,
    db_type: DbType,
    compression: Compression,
}

impl SyncDatabase {
    pub fn new(database: &Path, db_type: DbType, compression: Compression) -> Self {
        Self {
            database: database.to_owned(),
            db_type,
            compression,
        }
    }

    pub fn path(&self) -> &Path {
        &self.database
    }

    /// Read every pkgbase JSON file directly below `dir` and write the database.
    pub fn stream_management_repo(&self, dir: &Path) -> Result<(), Error> {
        if !dir.is_dir() {
            return Err(Error::ManagementDirNotFound(dir.to_owned()));
        }
        let pkgbases = read_pkgbases(dir)?;
        log::debug!(
            "Writing {} pkgbases from {dir:?} to {:?}",
            pkgbases.len(),
            self.database
        );

        let write_err = |e| Error::Write(self.database.clone(), e);
        let file = File::create(&self.database).map_err(write_err)?;
        match self.compression {
            Compression::None => {
                self.write_archive(file, &pkgbases)
                    .and_then(|mut f| f.flush())
                    .map_err(write_err)?;
            }
            Compression::Gzip => {
                let enc = GzEncoder::new(file, flate2::Compression::default());
                self.write_archive(enc, &pkgbases)
                    .and_then(|enc| enc.finish())
                    .map_err(write_err)?;
            }
        }
        Ok(())
    }

    fn write_archive<W: Write>(&self, writer: W, pkgbases: &[OutputPackageBase]) -> io::Result<W> {
        let mut builder = tar::Builder::new(writer);
        let mut strbuf = String::with_capacity(1024);
        for pkgbase in pkgbases {
            for pkg in &pkgbase.packages {
                let entry_dir = format!("{}-{}", pkg.name, pkgbase.version);

                desc(pkgbase, pkg, &mut strbuf);
                append_file(&mut builder, &format!("{entry_dir}/desc"), &strbuf)?;

                if self.db_type == DbType::Files {
                    files(pkg, &mut strbuf);
                    append_file(&mut builder, &format!("{entry_dir}/files"), &strbuf)?;
                }
            }
        }
        builder.into_inner()
    }
}

/// Non-symlink `*.json` files in `dir`, sorted by name.
fn read_pkgbases(dir: &Path) -> Result<Vec<OutputPackageBase>, Error> {
    let read_err = |e| Error::Read(dir.to_owned(), e);
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let is_file = entry.file_type().map_err(read_err)?.is_file();
        let path = entry.path();
        if is_file && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    paths
        .iter()
        .map(|path| OutputPackageBase::from_file(path))
        .collect()
}

fn append_file<W: Write>(builder: &mut tar::Builder<W>, path: &str, text: &str) -> io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(text.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, path, text.as_bytes())
}

fn section(buf: &mut String, key: &str, values: &[&str]) {
    if values.is_empty() {
        return;
    }
    let _ = writeln!(buf, "%{key}%");
    for value in values {
        let _ = writeln!(buf, "{value}");
    }
    buf.push('\n');
}

fn desc(pkgbase: &OutputPackageBase, pkg: &OutputPackage, buf: &mut String) {
    buf.clear();
    let csize = pkg.csize.to_string();
    section(buf, "FILENAME", &[&pkg.filename]);
    section(buf, "NAME", &[&pkg.name]);
    section(buf, "BASE", &[&pkgbase.base]);
    section(buf, "VERSION", &[pkgbase.version.as_str()]);
    if let Some(desc) = &pkg.desc {
        section(buf, "DESC", &[desc]);
    }
    section(buf, "CSIZE", &[&csize]);
    if let Some(url) = &pkg.url {
        section(buf, "URL", &[url]);
    }
    section(buf, "ARCH", &[pkg.arch.as_str()]);
    let depends: Vec<&str> = pkg.depends.iter().map(String::as_str).collect();
    section(buf, "DEPENDS", &depends);
}

fn files(pkg: &OutputPackage, buf: &mut String) {
    buf.clear();
    let files: Vec<&str> = pkg.files.iter().map(String::as_str).collect();
    section(buf, "FILES", &files);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Architecture, BuildInfo, Version};
    use anyhow::Result;
    use std::io::Read;
    use tempfile::tempdir;

    fn write_pkgbase(dir: &Path) -> Result<()> {
        let pkgbase = OutputPackageBase {
            base: "foo".to_owned(),
            version: Version::new("1.0-1")?,
            packages: vec![OutputPackage {
                name: "foo".to_owned(),
                filename: "foo-1.0-1-x86_64.pkg.tar.zst".to_owned(),
                arch: Architecture::X86_64,
                desc: Some("a foo".to_owned()),
                url: None,
                depends: vec!["bar".to_owned()],
                files: vec!["usr/bin/foo".to_owned()],
                csize: 42,
            }],
            buildinfo: BuildInfo::default(),
            source_url: None,
        };
        fs::write(dir.join("foo.json"), pkgbase.to_json(false)?)?;
        // staged files are not part of the database:
        fs::write(dir.join("bar.json.tmp"), "{")?;
        Ok(())
    }

    fn entries(path: &Path, gzip: bool) -> Result<Vec<(String, String)>> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if gzip {
            Box::new(flate2::read::GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let mut archive = tar::Archive::new(reader);
        let mut out = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            out.push((name, text));
        }
        Ok(out)
    }

    #[test]
    fn test_default_db() -> Result<()> {
        let dir = tempdir()?;
        write_pkgbase(dir.path())?;
        let db_path = dir.path().join("core.db.tar.gz");

        SyncDatabase::new(&db_path, DbType::Default, Compression::Gzip)
            .stream_management_repo(dir.path())?;

        let entries = entries(&db_path, true)?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "foo-1.0-1/desc");
        assert!(entries[0].1.starts_with("%FILENAME%\nfoo-1.0-1-x86_64.pkg.tar.zst\n\n"));
        assert!(entries[0].1.contains("%DEPENDS%\nbar\n"));
        Ok(())
    }

    #[test]
    fn test_files_db() -> Result<()> {
        let dir = tempdir()?;
        write_pkgbase(dir.path())?;
        let db_path = dir.path().join("core.files.tar");

        SyncDatabase::new(&db_path, DbType::Files, Compression::None)
            .stream_management_repo(dir.path())?;

        let entries = entries(&db_path, false)?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], ("foo-1.0-1/files".to_owned(), "%FILES%\nusr/bin/foo\n\n".to_owned()));
        Ok(())
    }

    #[test]
    fn test_missing_dir() {
        let db = SyncDatabase::new(Path::new("/nonexistent/core.db.tar.gz"), DbType::Default, Compression::Gzip);
        assert!(matches!(
            db.stream_management_repo(Path::new("/nonexistent/dir")),
            Err(Error::ManagementDirNotFound(_))
        ));
    }
}
