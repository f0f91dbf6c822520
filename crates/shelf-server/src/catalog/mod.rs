//! Coordination between the metadata repository and the blob store.
//!
//! A photo lives in two places: a row in the repository and a blob in the
//! blob store. The services here sequence the calls into both so that a
//! failed operation never leaves one without the other:
//!
//! - [`UploadService`]: blob first, then row; a failed insert removes the blob.
//! - [`DeleteService`]: row first, then blob; a blob that cannot be removed
//!   is logged and left for the [`Sweeper`].
//! - [`Sweeper`]: removes blobs no row references once they are older than a
//!   grace period.

pub mod delete;
pub mod repository;
pub mod sweep;
pub mod upload;

pub use delete::DeleteService;
pub use repository::{PhotoPage, PhotoRepository, SqlitePhotoRepository};
pub use sweep::{SweepReport, Sweeper};
pub use upload::{Payload, UploadForm, UploadService};
