use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use repo::{
    Compression, DbType, OutputPackageBase, SyncDatabase, PKGNAMES_DIR, TMP_SUFFIX,
};

use super::PkgbasesFrom;
use crate::{Check, Error, Task, TaskCore, TaskResult};

/// Remove the given files (and the directories created for them), last first.
fn remove_staged(files: &mut Vec<PathBuf>, created_dirs: &mut Vec<PathBuf>) -> Result<()> {
    while let Some(path) = files.pop() {
        if let Err(e) = util::remove_file_if_exists(&path) {
            files.push(path.clone());
            return Err(e).with_context(|| format!("while removing {path:?}"));
        }
    }
    util::remove_empty_dirs(created_dirs)?;
    created_dirs.clear();
    Ok(())
}

/// Write each pkgbase to `<dir>/<base>.json.tmp`, and for each of its
/// packages a symlink `<dir>/pkgnames/<name>.json.tmp` pointing at
/// `../<base>.json`.
pub struct WriteOutputPackageBasesToTmpFileInDirTask {
    core: TaskCore,
    directory: PathBuf,
    pkgbases: PkgbasesFrom,
    filenames: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
}

impl WriteOutputPackageBasesToTmpFileInDirTask {
    pub fn new(directory: &Path, pkgbases: PkgbasesFrom) -> Result<Self, Error> {
        if !directory.is_absolute() {
            return Err(Error::NotAbsolute(directory.to_owned()));
        }
        let core = TaskCore::new(pkgbases.dependency().into_iter().collect());
        Ok(Self {
            core,
            directory: directory.to_owned(),
            pkgbases,
            filenames: Vec::new(),
            created_dirs: Vec::new(),
        })
    }

    /// Every file and symlink written by the last run, all ending in `.tmp`.
    pub fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }

    fn write(&mut self, pkgbases: &[OutputPackageBase]) -> Result<Vec<Box<dyn Check>>> {
        let pkgnames_dir = self.directory.join(PKGNAMES_DIR);
        self.created_dirs = util::create_dirs(&pkgnames_dir)
            .with_context(|| format!("while creating {pkgnames_dir:?}"))?;

        for pkgbase in pkgbases {
            let json_name = format!("{}.json", pkgbase.base);
            let path = self.directory.join(format!("{json_name}{TMP_SUFFIX}"));
            let json = pkgbase.to_json(true)?;
            fs::write(&path, json).with_context(|| format!("while writing {path:?}"))?;
            self.filenames.push(path);

            let target = Path::new("..").join(&json_name);
            for name in pkgbase.package_names() {
                let link = pkgnames_dir.join(format!("{name}.json{TMP_SUFFIX}"));
                util::symlink(&target, &link)
                    .with_context(|| format!("while linking {link:?}"))?;
                self.filenames.push(link);
            }
        }
        log::debug!("Staged {} files in {:?}", self.filenames.len(), self.directory);
        Ok(Vec::new())
    }
}

impl Task for WriteOutputPackageBasesToTmpFileInDirTask {
    fn name(&self) -> &'static str {
        "WriteOutputPackageBasesToTmpFileInDirTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        let Some(pkgbases) = self.pkgbases.resolve() else {
            return TaskResult::FailedDependency;
        };
        self.filenames.clear();
        self.write(&pkgbases).into()
    }

    fn undo_task(&mut self) -> Result<()> {
        remove_staged(&mut self.filenames, &mut self.created_dirs)
    }
}

/// Write the default and files sync databases of a repository as `.tmp`
/// files, plus `.tmp` symlinks `<repo>.db` and `<repo>.files` pointing at them.
///
/// The databases are built from the pkgbase files in the management repository
/// directory; the repository name is taken from the package repository
/// directory `<package>/<repo-name>/<arch>`.
pub struct WriteSyncDbsToTmpFilesInDirTask {
    core: TaskCore,
    management_repo_dir: PathBuf,
    package_repo_dir: PathBuf,
    compression: Compression,
    default_db: PathBuf,
    default_link: PathBuf,
    files_db: PathBuf,
    files_link: PathBuf,
    written: Vec<PathBuf>,
    created_dirs: Vec<PathBuf>,
}

impl WriteSyncDbsToTmpFilesInDirTask {
    pub fn new(
        management_repo_dir: &Path,
        package_repo_dir: &Path,
        compression: Compression,
    ) -> Result<Self, Error> {
        for dir in [management_repo_dir, package_repo_dir] {
            if !dir.is_absolute() {
                return Err(Error::NotAbsolute(dir.to_owned()));
            }
        }
        let repo_name = package_repo_dir
            .parent()
            .and_then(Path::file_name)
            .ok_or_else(|| Error::InvalidRepoDir(package_repo_dir.to_owned()))?
            .to_str()
            .ok_or(util::PathEncodingError)?;

        let path = |name: String| package_repo_dir.join(format!("{name}{TMP_SUFFIX}"));
        Ok(Self {
            core: TaskCore::default(),
            management_repo_dir: management_repo_dir.to_owned(),
            package_repo_dir: package_repo_dir.to_owned(),
            compression,
            default_db: path(format!("{repo_name}{}", compression.db_tar_suffix(DbType::Default))),
            default_link: path(format!("{repo_name}.db")),
            files_db: path(format!("{repo_name}{}", compression.db_tar_suffix(DbType::Files))),
            files_link: path(format!("{repo_name}.files")),
            written: Vec::new(),
            created_dirs: Vec::new(),
        })
    }

    /// Default database, its symlink, files database and its symlink.
    pub fn filenames(&self) -> [&Path; 4] {
        [
            self.default_db.as_path(),
            self.default_link.as_path(),
            self.files_db.as_path(),
            self.files_link.as_path(),
        ]
    }

    fn write(&mut self) -> Result<Vec<Box<dyn Check>>> {
        self.created_dirs = util::create_dirs(&self.package_repo_dir)
            .with_context(|| format!("while creating {:?}", self.package_repo_dir))?;

        let databases = [
            (self.default_db.clone(), self.default_link.clone(), DbType::Default),
            (self.files_db.clone(), self.files_link.clone(), DbType::Files),
        ];
        for (db, link, db_type) in databases {
            self.written.push(db.clone());
            SyncDatabase::new(&db, db_type, self.compression)
                .stream_management_repo(&self.management_repo_dir)
                .with_context(|| format!("while writing {db:?}"))?;

            // the link points at the database's final name
            let target = db
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(TMP_SUFFIX))
                .ok_or(util::PathEncodingError)?;
            util::symlink(Path::new(target), &link)
                .with_context(|| format!("while linking {link:?}"))?;
            self.written.push(link);
        }
        Ok(Vec::new())
    }
}

impl Task for WriteSyncDbsToTmpFilesInDirTask {
    fn name(&self) -> &'static str {
        "WriteSyncDbsToTmpFilesInDirTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        self.written.clear();
        self.write().into()
    }

    fn undo_task(&mut self) -> Result<()> {
        remove_staged(&mut self.written, &mut self.created_dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{as_ref, pkgbase, tree};
    use crate::{call, shared, undo, ActionState};
    use repo::Architecture;
    use tempfile::tempdir;

    #[test]
    fn test_write_pkgbases() -> Result<()> {
        let dir = tempdir()?;
        let mgmt = dir.path().join("x86_64/core");
        let pkgbases = vec![
            pkgbase("foo", &["foo", "foo-docs"], "1.0-1", Architecture::X86_64)?,
            pkgbase("bar", &["bar"], "1.0-1", Architecture::Any)?,
        ];
        let task = shared(WriteOutputPackageBasesToTmpFileInDirTask::new(
            &mgmt,
            PkgbasesFrom::Given(pkgbases.clone()),
        )?);

        assert_eq!(call(&as_ref(&task)), ActionState::Success);
        assert_eq!(task.borrow().filenames().len(), 5);
        assert_eq!(
            fs::read_link(mgmt.join("pkgnames/foo-docs.json.tmp"))?,
            Path::new("../foo.json")
        );
        assert_eq!(OutputPackageBase::from_file(&mgmt.join("foo.json.tmp"))?, pkgbases[0]);

        assert_eq!(undo(&as_ref(&task)), ActionState::NotStarted);
        assert!(tree(dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_write_sync_dbs() -> Result<()> {
        let dir = tempdir()?;
        let mgmt = dir.path().join("management/x86_64/core");
        fs::create_dir_all(&mgmt)?;
        let foo = pkgbase("foo", &["foo"], "1.0-1", Architecture::Any)?;
        fs::write(mgmt.join("foo.json"), foo.to_json(false)?)?;
        let package_dir = dir.path().join("package/core/x86_64");

        let task = shared(WriteSyncDbsToTmpFilesInDirTask::new(
            &mgmt,
            &package_dir,
            Compression::Gzip,
        )?);
        assert_eq!(
            task.borrow().filenames()[0],
            package_dir.join("core.db.tar.gz.tmp")
        );

        assert_eq!(call(&as_ref(&task)), ActionState::Success);
        assert_eq!(
            tree(&package_dir)?,
            [
                "core.db.tar.gz.tmp",
                "core.db.tmp",
                "core.files.tar.gz.tmp",
                "core.files.tmp"
            ]
        );
        assert_eq!(fs::read_link(package_dir.join("core.files.tmp"))?, Path::new("core.files.tar.gz"));

        assert_eq!(undo(&as_ref(&task)), ActionState::NotStarted);
        assert!(!dir.path().join("package").exists());
        Ok(())
    }

    #[test]
    fn test_write_sync_dbs_missing_management_dir() -> Result<()> {
        let dir = tempdir()?;
        let task = shared(WriteSyncDbsToTmpFilesInDirTask::new(
            &dir.path().join("management/x86_64/core"),
            &dir.path().join("package/core/x86_64"),
            Compression::Gzip,
        )?);
        assert_eq!(call(&as_ref(&task)), ActionState::FailedTask);
        assert_eq!(undo(&as_ref(&task)), ActionState::NotStarted);
        assert!(tree(dir.path())?.is_empty());
        Ok(())
    }
}
