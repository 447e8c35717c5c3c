use std::time::Duration;

pub(crate) mod colors;
mod error;
#[cfg(feature = "metrics")]
pub mod metrics;

pub use error::*;

/// Default reconcile tick period, used when `UPDATE_INTERVAL` is absent, unparseable, or zero.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Name of the kubernetes resource manager recorded on every create/apply.
pub(crate) const MANAGER_NAME: &str = "warden-operator";

/// Parses the `UPDATE_INTERVAL` env value. A successful parse always wins; only a parse
/// failure, a missing value, or an explicit zero falls back to [`DEFAULT_UPDATE_INTERVAL`].
///
/// This is the corrected reading of the source's duration-parsing conditional (see
/// `SPEC_FULL.md` §9): the source only applied the override when parsing *failed*.
pub fn parse_update_interval(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_UPDATE_INTERVAL;
    };
    match parse_duration::parse(raw) {
        Ok(d) if d.is_zero() => DEFAULT_UPDATE_INTERVAL,
        Ok(d) => d,
        Err(_) => DEFAULT_UPDATE_INTERVAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_value_uses_default() {
        assert_eq!(parse_update_interval(None), DEFAULT_UPDATE_INTERVAL);
    }

    #[test]
    fn zero_clamps_to_default() {
        assert_eq!(parse_update_interval(Some("0")), DEFAULT_UPDATE_INTERVAL);
        assert_eq!(parse_update_interval(Some("0s")), DEFAULT_UPDATE_INTERVAL);
    }

    #[test]
    fn bare_seconds_are_honored() {
        assert_eq!(parse_update_interval(Some("90")), Duration::from_secs(90));
    }

    #[test]
    fn duration_strings_are_honored() {
        assert_eq!(parse_update_interval(Some("2m")), Duration::from_secs(120));
    }

    #[test]
    fn unparseable_value_falls_back_to_default() {
        assert_eq!(
            parse_update_interval(Some("not-a-duration")),
            DEFAULT_UPDATE_INTERVAL
        );
    }
}
