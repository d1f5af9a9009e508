use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use repo::{Architecture, Compression, PackageRepo, RepoLayout, RepoType, UrlValidation};
use util::HashMap;

use crate::args::Args;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid source URL flag '{0}' (should be formatted 'PKGBASE=URL')")]
    InvalidSourceUrlFlag(String),
    #[error("package file not found: {0}")]
    PackageNotFound(String),
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. paths are absolute and the repository is resolved.
#[derive(Debug)]
pub struct Settings {
    pub verbose: u8,
    pub packages: Vec<PathBuf>,
    pub layout: RepoLayout,
    pub repo: PackageRepo,
    pub repo_type: RepoType,
    pub with_signature: bool,
    pub source_urls: HashMap<String, String>,
    pub url_validation: Option<UrlValidation>,
    pub compression: Compression,
    pub print: bool,
}

fn absolute(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        Ok(path.to_owned())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let architecture: Architecture = args.arch.parse()?;
        let mut repo_type: RepoType = args.repo_type.parse()?;
        if args.debug {
            repo_type = repo_type.debug();
        }

        let repositories = match &args.config {
            Some(config) => {
                let bytes = fs::read(config).with_context(|| format!("while reading {config}"))?;
                serde_json::from_slice::<Vec<PackageRepo>>(&bytes)
                    .with_context(|| format!("while parsing {config}"))?
            }
            // without a config file, the target repository has exactly the
            // layers it is asked to add to:
            None => {
                let mut repo = PackageRepo::new(&args.repo, architecture);
                repo.debug = repo_type.is_debug();
                repo.testing = matches!(repo_type, RepoType::Testing | RepoType::TestingDebug);
                repo.staging = matches!(repo_type, RepoType::Staging | RepoType::StagingDebug);
                vec![repo]
            }
        };

        let layout = RepoLayout {
            management_dir: absolute(&args.management_dir)?,
            package_dir: absolute(&args.package_dir)?,
            pool_dir: absolute(&args.pool_dir)?,
            archive_dir: args.archive_dir.as_deref().map(absolute).transpose()?,
            repositories,
        };
        let repo = layout.repo(&args.repo, Some(architecture))?.clone();

        let mut packages = Vec::with_capacity(args.packages.len());
        for package in &args.packages {
            let path = absolute(package)?;
            if !path.is_file() {
                return Err(Error::PackageNotFound(package.to_owned()).into());
            }
            packages.push(path);
        }

        let mut source_urls = HashMap::default();
        for flag in args.source_urls {
            let (pkgbase, url) = flag
                .split_once('=')
                .ok_or_else(|| Error::InvalidSourceUrlFlag(flag.to_owned()))?;
            source_urls.insert(pkgbase.to_owned(), url.to_owned());
        }

        let url_validation = (!args.allowed_urls.is_empty() || args.require_tls).then(|| {
            UrlValidation {
                urls: args.allowed_urls,
                tls_required: args.require_tls,
            }
        });

        let compression = if args.no_compression {
            Compression::None
        } else {
            Compression::Gzip
        };

        Ok(Self {
            verbose: args.verbose,
            packages,
            layout,
            repo,
            repo_type,
            with_signature: args.with_signature,
            source_urls,
            url_validation,
            compression,
            print: args.print,
        })
    }
}
