use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::SessionStoreError;

pub(crate) fn now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)
}

pub(crate) fn is_rfc3339(value: &str) -> bool {
    OffsetDateTime::parse(value, &Rfc3339).is_ok()
}

/// Accepts RFC3339 as is and rewrites the naive UTC `YYYY-MM-DD HH:MM:SS[.ffffff]`
/// values older catalogs stored. Anything else yields `None`.
pub(crate) fn normalize_record_timestamp(value: &str) -> Option<String> {
    if is_rfc3339(value) {
        return Some(value.to_string());
    }

    let legacy = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    PrimitiveDateTime::parse(value, legacy)
        .ok()?
        .assume_utc()
        .format(&Rfc3339)
        .ok()
}

/// Display name given to sessions created without one, e.g. `Chat 2026-02-14 09:30:00`.
#[must_use]
pub fn default_session_name(at: OffsetDateTime) -> String {
    format!(
        "Chat {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}
