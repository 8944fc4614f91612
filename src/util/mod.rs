pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{chat_url, extract_chat_id, extract_resume_id, is_valid_url};
