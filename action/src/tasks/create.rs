use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};

use repo::{Architecture, OutputPackageBase, Package, PackageReader, SIG_SUFFIX};
use util::HashMap;

use super::PkgbasesFrom;
use crate::{
    Check, DebugPackagesCheck, Error, MatchingArchitectureCheck, MatchingFilenameCheck,
    SignaturesPresentCheck, Task, TaskCore, TaskResult,
};

/// Read package files and group them into pkgbases.
pub struct CreateOutputPackageBasesTask {
    core: TaskCore,
    reader: Rc<dyn PackageReader>,
    architecture: Architecture,
    packages: Vec<(PathBuf, Option<PathBuf>)>,
    debug_repo: bool,
    source_urls: HashMap<String, String>,
    pkgbases: Vec<OutputPackageBase>,
}

impl CreateOutputPackageBasesTask {
    /// If `with_signature`, every package is expected to have a
    /// `<package>.sig` next to it.
    pub fn new(
        reader: Rc<dyn PackageReader>,
        architecture: Architecture,
        packages: Vec<PathBuf>,
        with_signature: bool,
        debug_repo: bool,
    ) -> Result<Self, Error> {
        if packages.is_empty() {
            return Err(Error::NoInput("CreateOutputPackageBasesTask"));
        }
        let packages: Vec<(PathBuf, Option<PathBuf>)> = packages
            .into_iter()
            .map(|package| {
                let signature = with_signature.then(|| signature_path(&package));
                (package, signature)
            })
            .collect();

        let mut core = TaskCore::default();
        if with_signature {
            core.add_pre_check(Box::new(SignaturesPresentCheck::new(packages.clone())));
        }
        Ok(Self {
            core,
            reader,
            architecture,
            packages,
            debug_repo,
            source_urls: HashMap::default(),
            pkgbases: Vec::new(),
        })
    }

    /// Source URLs to record, by pkgbase name.
    pub fn with_source_urls(mut self, source_urls: HashMap<String, String>) -> Self {
        self.source_urls = source_urls;
        self
    }

    /// Package paths and their signature paths.
    pub fn packages(&self) -> &[(PathBuf, Option<PathBuf>)] {
        &self.packages
    }

    /// Pkgbases in the order their first package was given.
    pub fn pkgbases(&self) -> &[OutputPackageBase] {
        &self.pkgbases
    }

    fn create(&mut self) -> Result<Vec<Box<dyn Check>>> {
        let mut groups: Vec<Vec<Package>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::default();
        for (package, signature) in &self.packages {
            let pkg = self
                .reader
                .read(package, signature.as_deref())
                .with_context(|| format!("while reading package {package:?}"))?;
            let i = *index.entry(pkg.pkginfo.base.clone()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[i].push(pkg);
        }

        let mut pkgbases = Vec::with_capacity(groups.len());
        for packages in groups {
            let mut pkgbase = OutputPackageBase::from_packages(packages)?;
            pkgbase.source_url = self.source_urls.get(&pkgbase.base).cloned();
            pkgbases.push(pkgbase);
        }
        log::debug!("Created {} pkgbases", pkgbases.len());
        self.pkgbases = pkgbases;

        Ok(vec![
            Box::new(DebugPackagesCheck::new(self.pkgbases.clone(), self.debug_repo)),
            Box::new(MatchingArchitectureCheck::new(self.pkgbases.clone(), self.architecture)),
            Box::new(MatchingFilenameCheck::new(self.pkgbases.clone())),
        ])
    }
}

fn signature_path(package: &Path) -> PathBuf {
    let mut path = package.as_os_str().to_owned();
    path.push(SIG_SUFFIX);
    PathBuf::from(path)
}

impl Task for CreateOutputPackageBasesTask {
    fn name(&self) -> &'static str {
        "CreateOutputPackageBasesTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        self.create().into()
    }

    fn undo_task(&mut self) -> Result<()> {
        self.pkgbases.clear();
        Ok(())
    }
}

/// Write pkgbases as JSON, to stdout unless another writer is given.
pub struct PrintOutputPackageBasesTask {
    core: TaskCore,
    pkgbases: PkgbasesFrom,
    writer: Box<dyn Write>,
}

impl PrintOutputPackageBasesTask {
    pub fn new(pkgbases: PkgbasesFrom) -> Self {
        Self::with_writer(pkgbases, Box::new(io::stdout()))
    }

    pub fn with_writer(pkgbases: PkgbasesFrom, writer: Box<dyn Write>) -> Self {
        let core = TaskCore::new(pkgbases.dependency().into_iter().collect());
        Self {
            core,
            pkgbases,
            writer,
        }
    }

    fn print(&mut self, pkgbases: &[OutputPackageBase]) -> Result<Vec<Box<dyn Check>>> {
        serde_json::to_writer_pretty(&mut self.writer, pkgbases)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(Vec::new())
    }
}

impl Task for PrintOutputPackageBasesTask {
    fn name(&self) -> &'static str {
        "PrintOutputPackageBasesTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self.pkgbases.resolve() {
            Some(pkgbases) => self.print(&pkgbases).into(),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        Ok(())
    }
}
