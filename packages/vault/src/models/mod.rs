pub mod bundle;
pub mod file;
pub mod instance;
pub mod manifest;

pub use bundle::{BundleMeta, IngestReport};
pub use file::{FileNode, FileOpResponse, FileOpStatus};
pub use instance::{DeleteInstanceReport, InstanceSummary, PaginatedInstances};
pub use manifest::{Manifest, ManifestFile};
