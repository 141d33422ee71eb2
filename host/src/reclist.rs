use crate::errors::HandlerError;
use recboard_core::ReclistEntry;
use std::path::Path;
use tracing::debug;

/// Reads a reclist file and turns each `name:text` line into an entry whose
/// path is `<reclist dir>/<name>.wav`.
pub async fn load_reclist(path: &Path) -> Result<Vec<ReclistEntry>, HandlerError> {
    // A symlink is not a reclist file; it is not followed.
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|source| HandlerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if !metadata.is_file() {
        return Err(HandlerError::NotAFile(path.to_path_buf()));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| HandlerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let text = String::from_utf8(bytes).map_err(|_| HandlerError::NotUtf8(path.to_path_buf()))?;

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let entries = parse_reclist(&text, dir);
    debug!(path = %path.display(), entries = entries.len(), "Parsed reclist");
    Ok(entries)
}

/// Splits on `\r\n`, `\n` and `\r`. Lines without a `:` are skipped. The text
/// is the field between the first and second `:`; anything after a second
/// `:` is ignored.
pub fn parse_reclist(text: &str, dir: &Path) -> Vec<ReclistEntry> {
    text.split(['\r', '\n'])
        .filter_map(|line| {
            let mut fields = line.split(':');
            let name = fields.next()?;
            let text = fields.next()?;
            Some(ReclistEntry {
                path: dir.join(format!("{name}.wav")).to_string_lossy().into_owned(),
                text: text.to_string(),
            })
        })
        .collect()
}
