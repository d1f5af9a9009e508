use clap::Parser;

const CMD_NAME: &str = "repotx";
const DEFAULT_ARCH: &str = "x86_64";
const DEFAULT_REPO_TYPE: &str = "stable";
const DEFAULT_MANAGEMENT_DIR: &str = "/var/lib/repotx/management";
const DEFAULT_PACKAGE_DIR: &str = "/srv/repotx/package";
const DEFAULT_POOL_DIR: &str = "/srv/repotx/pool";

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Package files to add
    #[arg(required = true, value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Name of target repository
    #[arg(short, long, value_name = "NAME")]
    pub repo: String,

    /// Architecture of target repository
    #[arg(short, long, value_name = "ARCH", default_value = DEFAULT_ARCH)]
    pub arch: String,

    /// Stability layer of target repository (stable, testing or staging)
    #[arg(short = 't', long, value_name = "TYPE", default_value = DEFAULT_REPO_TYPE)]
    pub repo_type: String,

    /// Add to the debug repository of the stability layer
    #[arg(short, long)]
    pub debug: bool,

    /// Repository configuration file (JSON list of repositories)
    #[arg(short, long, value_name = "FILE")]
    #[arg(env = "REPOTX_CONFIG")]
    pub config: Option<String>,

    /// Management repository base directory
    #[arg(long, value_name = "DIR", default_value = DEFAULT_MANAGEMENT_DIR)]
    #[arg(env = "REPOTX_MANAGEMENT_DIR")]
    pub management_dir: String,

    /// Package repository base directory
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PACKAGE_DIR)]
    #[arg(env = "REPOTX_PACKAGE_DIR")]
    pub package_dir: String,

    /// Package pool base directory
    #[arg(long, value_name = "DIR", default_value = DEFAULT_POOL_DIR)]
    #[arg(env = "REPOTX_POOL_DIR")]
    pub pool_dir: String,

    /// Archive directory; nothing is archived if not given
    #[arg(long, value_name = "DIR")]
    #[arg(env = "REPOTX_ARCHIVE_DIR")]
    pub archive_dir: Option<String>,

    /// Require a detached '<package>.sig' for every package
    #[arg(short = 's', long)]
    pub with_signature: bool,

    /// Source URL of a pkgbase
    #[arg(short = 'u', long = "source-url", value_name = "PKGBASE=URL")]
    pub source_urls: Vec<String>,

    /// Allowed source URL prefix; enables source URL validation
    #[arg(long = "allowed-url", value_name = "URL")]
    pub allowed_urls: Vec<String>,

    /// Require https source URLs
    #[arg(long)]
    pub require_tls: bool,

    /// Write uncompressed sync databases
    #[arg(long)]
    pub no_compression: bool,

    /// Only print the pkgbases created from the packages
    #[arg(short, long)]
    pub print: bool,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
