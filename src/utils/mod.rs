pub mod content_guard;
pub mod drive_url;
pub mod fetcher;
pub mod pdf;
