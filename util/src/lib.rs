/// Filesystem primitives shared by the repository tasks
mod ops;
pub use ops::{
    copy, create_dirs, exists, relative_link_target, remove_empty_dirs, remove_file_if_exists,
    symlink,
};

mod timer;
pub use timer::Timer;

#[derive(thiserror::Error, Debug)]
#[error("Filesystem path is not valid UTF-8")]
pub struct PathEncodingError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Path is neither file nor symlink: {0}")]
    UnknownPathType(String),
}

pub type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub type HashMap<K, V> = std::collections::HashMap<K, V, Hasher>;
pub type HashSet<T> = std::collections::HashSet<T, Hasher>;
