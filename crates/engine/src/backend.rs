use std::path::Path;

use core_types::MediaMetadata;

use crate::thumbnail::ReservedThumbnail;
use crate::Result;

/// One media family (still images, video clips).
pub trait MediaBackend: Send + Sync + 'static {
    /// Read the normalized metadata record for `path`. Touches no other file.
    fn extract_metadata(&self, path: &Path) -> Result<MediaMetadata>;

    /// Render a bounded-size preview of `path` into the reserved thumbnail file.
    fn render_thumbnail(
        &self,
        path: &Path,
        metadata: &MediaMetadata,
        target: &mut ReservedThumbnail,
    ) -> Result<()>;
}
