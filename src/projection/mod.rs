//! Pure derivations of the canonical tree: the sandbox mount descriptor and
//! the zip archive.

pub mod archive;
pub mod mount;

pub use archive::{entries, to_zip_bytes, write_zip, ArchiveEntry, ArchiveOptions};
pub use mount::{project, MountDescriptor, MountEntry};
