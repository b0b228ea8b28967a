//! Static extension to MIME type mapping

use std::path::Path;

/// Fallback for unknown or missing extensions
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Get the MIME type for a file extension (case-insensitive, without the dot)
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        "ktx2" => "image/ktx2",
        "hdr" => "image/vnd.radiance",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "gltf" => "model/gltf+json",
        "glb" => "model/gltf-binary",
        "obj" => "model/obj",
        "npy" | "bin" => "application/octet-stream",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime)
}

/// Infer the content type of a path from its extension
pub fn content_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_for_extension)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
