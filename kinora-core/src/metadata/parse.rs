//! Lenient parsers for numeric fields that ffprobe and tag blocks hand back
//! as strings. Anything unparsable becomes `None`; none of these fail a file.

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Integer such as a bit rate (`"320000"`). Decimal input is truncated.
pub fn parse_int(raw: Option<&str>) -> Option<i64> {
    let s = non_empty(raw)?;
    if let Ok(value) = s.parse::<i64>() {
        return Some(value);
    }
    let value = s.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(value.trunc() as i64)
}

/// Non-negative integer that fits in an `i32`, e.g. a sample rate.
pub fn parse_count(raw: Option<&str>) -> Option<i32> {
    parse_int(raw)
        .filter(|v| *v >= 0)
        .and_then(|v| i32::try_from(v).ok())
}

/// Seconds with an optional fraction (`"5421.376000"`).
pub fn parse_seconds(raw: Option<&str>) -> Option<f64> {
    non_empty(raw)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Frame rate as `num/den` (`"24000/1001"`) or a plain decimal (`"25"`).
/// `"0/0"` is what ffprobe reports for streams without a rate.
pub fn parse_frame_rate(raw: Option<&str>) -> Option<f64> {
    let s = non_empty(raw)?;
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Slash-delimited position such as a track tag `"3/12"` or a bare `"3"`.
/// Each half degrades independently.
pub fn parse_position(raw: Option<&str>) -> (Option<i32>, Option<i32>) {
    let Some(s) = non_empty(raw) else {
        return (None, None);
    };
    match s.split_once('/') {
        Some((number, total)) => (
            parse_count(Some(number)).filter(|n| *n > 0),
            parse_count(Some(total)).filter(|n| *n > 0),
        ),
        None => (parse_count(Some(s)).filter(|n| *n > 0), None),
    }
}

/// Leading four-digit year of a date-ish tag (`"2019"`, `"2019-03-01"`,
/// `"2019-03-01T00:00:00Z"`).
pub fn parse_year(raw: Option<&str>) -> Option<i32> {
    let s = non_empty(raw)?;
    let digits: String = s.chars().take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if s.chars().nth(4).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i32>().ok().filter(|y| (1000..=2999).contains(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_tolerate_whitespace_and_fractions() {
        assert_eq!(parse_int(Some(" 320000 ")), Some(320_000));
        assert_eq!(parse_int(Some("1411.2")), Some(1411));
        assert_eq!(parse_int(Some("N/A")), None);
        assert_eq!(parse_int(None), None);
        assert_eq!(parse_count(Some("-1")), None);
        assert_eq!(parse_count(Some("44100")), Some(44_100));
    }

    #[test]
    fn frame_rates_accept_ratios_and_decimals() {
        let ntsc = parse_frame_rate(Some("24000/1001")).unwrap();
        assert!((ntsc - 23.976).abs() < 0.001);
        assert_eq!(parse_frame_rate(Some("25")), Some(25.0));
        assert_eq!(parse_frame_rate(Some("29.97")), Some(29.97));
        assert_eq!(parse_frame_rate(Some("0/0")), None);
        assert_eq!(parse_frame_rate(Some("abc/1")), None);
    }

    #[test]
    fn positions_split_number_and_total() {
        assert_eq!(parse_position(Some("3/12")), (Some(3), Some(12)));
        assert_eq!(parse_position(Some("07")), (Some(7), None));
        assert_eq!(parse_position(Some("x/12")), (None, Some(12)));
        assert_eq!(parse_position(Some("")), (None, None));
        assert_eq!(parse_position(Some("0/0")), (None, None));
    }

    #[test]
    fn seconds_reject_garbage() {
        assert_eq!(parse_seconds(Some("5421.376000")), Some(5421.376));
        assert_eq!(parse_seconds(Some("-3")), None);
        assert_eq!(parse_seconds(Some("NaN")), None);
    }

    #[test]
    fn years_come_from_date_prefixes() {
        assert_eq!(parse_year(Some("2019-03-01")), Some(2019));
        assert_eq!(parse_year(Some("1999")), Some(1999));
        assert_eq!(parse_year(Some("20190301")), None);
        assert_eq!(parse_year(Some("19")), None);
    }
}
