use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current wall-clock time as an RFC 3339 string.
///
/// Timestamps are carried as strings end to end: they are stamped into
/// object annotations at creation and copied back verbatim on query.
pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_utc_timestamp() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }
}
