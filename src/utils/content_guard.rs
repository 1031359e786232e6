/// Content-Type fragments accepted as "probably a PDF".
///
/// Generic octet-stream types are admitted on purpose: many file hosts (Drive included)
/// serve PDFs that way. Non-PDF binaries slip through and fail later in extraction.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/octet-stream",
    "binary/octet-stream",
];

/// Returns true if the declared Content-Type contains one of [`ACCEPTED_CONTENT_TYPES`]
/// (case-insensitive substring match). A missing header is rejected.
pub fn is_accepted_pdf_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let ct = ct.to_ascii_lowercase();
    ACCEPTED_CONTENT_TYPES
        .iter()
        .any(|accepted| ct.contains(accepted))
}
