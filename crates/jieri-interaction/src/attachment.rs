//! Local image to data-URL encoding for multimodal questions.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::error::AgentError;

/// Reads a local image file and encodes it as a `data:` URL suitable for a
/// multimodal chat message.
///
/// # Errors
///
/// Returns an execution failure if the file cannot be read.
pub fn image_to_data_url(path: &Path) -> Result<String, AgentError> {
    let bytes = std::fs::read(path).map_err(|err| {
        AgentError::ExecutionFailed(format!(
            "failed to read image at {}: {err}",
            path.display()
        ))
    })?;

    let mime_type = mime_for_extension(path).unwrap_or("image/jpeg");

    Ok(format!(
        "data:{};base64,{}",
        mime_type,
        BASE64_STANDARD.encode(bytes)
    ))
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    match path
        .extension()?
        .to_str()?
        .to_ascii_lowercase()
        .as_str()
    {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_encodes_png_with_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x89, 0x50, 0x4E, 0x47]).unwrap();

        let url = image_to_data_url(&path).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_unknown_extension_falls_back_to_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.bin");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let url = image_to_data_url(&path).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_missing_file_is_execution_failure() {
        let err = image_to_data_url(Path::new("/nonexistent/x.png")).unwrap_err();
        assert!(matches!(err, AgentError::ExecutionFailed(_)));
    }
}
