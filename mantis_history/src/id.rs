use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::time::local_now;

const ID_PREFIX: &str = "conv";
const RANDOM_SUFFIX_LEN: usize = 8;

/// Fresh conversation id: `conv_<YYYYMMDD_HHMMSS>_<8 hex>`.
#[must_use]
pub fn generate_conversation_id() -> String {
    generate_conversation_id_at(local_now())
}

#[must_use]
pub fn generate_conversation_id_at(at: NaiveDateTime) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!(
        "{ID_PREFIX}_{}_{}",
        at.format("%Y%m%d_%H%M%S"),
        &random[..RANDOM_SUFFIX_LEN]
    )
}
