use std::path::Path;

use core_types::MediaKind;

/// A file whose extension maps to a supported media family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: MediaKind,
    pub mime_type: String,
}

/// Guess the MIME type from the file extension.
///
/// Returns `None` when nothing is guessed or no guess is an image or video type.
pub fn classify(path: &Path) -> Option<Classified> {
    let guess = mime_guess::from_path(path);
    guess.iter().find_map(|mime| {
        MediaKind::from_mime_type(mime.type_().as_str()).map(|kind| Classified {
            kind,
            mime_type: mime.essence_str().to_string(),
        })
    })
}
