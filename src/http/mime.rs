//! Content types by file extension.

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";
pub const APP_JSON: &str = "application/json";
pub const APP_WWW_FORM: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM: &str = "multipart/form-data";
pub const OCTET_STREAM: &str = "application/octet-stream";

const EXTENSIONS: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("gif", "image/gif"),
    ("html", TEXT_HTML),
    ("ico", "image/vnd.microsoft.icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", APP_JSON),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("txt", TEXT_PLAIN),
];

/// Looks up a known extension, ignoring ASCII case.
pub fn lookup(extension: &str) -> Option<&'static str> {
    EXTENSIONS
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, content_type)| *content_type)
}

/// Content type for a file name, `application/octet-stream` when unknown.
pub fn from_path(path: &str) -> &'static str {
    path.rsplit_once('.')
        .and_then(|(_, ext)| lookup(ext))
        .unwrap_or(OCTET_STREAM)
}
