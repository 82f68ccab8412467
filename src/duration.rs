//! Human time expressions, e.g. `10m`, `1h30m`, `10:00`

use std::sync::LazyLock;

use crate::error::{Error, Result};

/// How long the server stays up without requests unless told otherwise
pub const DEFAULT_TIME_EXPR: &str = "10m";

const MILLIS_PER_SECOND: u128 = 1000;

static SECONDS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^(?:\d+(?:\.\d*)?|\.\d+)$").unwrap());
static CLOCK: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^(?:(\d+):)?(\d+):([0-5]\d(?:\.\d+)?)$").unwrap()
});
static UNITS: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^(?:(?:\d+(?:\.\d*)?|\.\d+)\s*[a-zA-Z]+[\s,]*)+$").unwrap()
});
static UNIT: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(\d+(?:\.\d*)?|\.\d+)\s*([a-zA-Z]+)").unwrap()
});

/// Parse a time expression into seconds
///
/// Accepts bare seconds (`600`), clocks (`MM:SS`, `H:MM:SS`) and sequences of amounts with
/// units (`1h30m`, `2 hours, 5 mins`). Amounts may be decimal (`1.5h`, `.5m`); the total is
/// rounded to the nearest second.
pub fn parse_time_expr(expr: &str) -> Result<u64> {
    let invalid = |reason| Error::InvalidTimeExpression {
        expr: expr.to_owned(),
        reason,
    };
    let trimmed = expr.trim();

    let millis = if SECONDS.is_match(trimmed) {
        parse_millis(trimmed)
    } else if let Some(captures) = CLOCK.captures(trimmed) {
        let field = |i| {
            captures
                .get(i)
                .map_or(Some(0), |m: regex::Match<'_>| parse_millis(m.as_str()))
        };
        field(1)
            .zip(field(2))
            .zip(field(3))
            .and_then(|((hours, minutes), seconds)| {
                hours
                    .checked_mul(60)?
                    .checked_add(minutes)?
                    .checked_mul(60)?
                    .checked_add(seconds)
            })
    } else if UNITS.is_match(trimmed) {
        let mut total = Some(0_u128);
        for captures in UNIT.captures_iter(trimmed) {
            let unit = unit_seconds(&captures[2]).ok_or_else(|| invalid("unknown unit"))?;
            total = total
                .zip(parse_millis(&captures[1]))
                .and_then(|(total, amount)| total.checked_add(amount.checked_mul(unit)?));
        }
        total
    } else {
        return Err(invalid("expected e.g. `600`, `10:00`, `10m` or `1h30m`"));
    };

    millis
        .and_then(|millis| millis.checked_add(MILLIS_PER_SECOND / 2))
        .and_then(|millis| u64::try_from(millis / MILLIS_PER_SECOND).ok())
        .ok_or_else(|| invalid("too large"))
}

/// Parse a decimal amount into thousandths, dropping any finer digits
fn parse_millis(amount: &str) -> Option<u128> {
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let whole = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().ok()?
    };
    let fraction = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0, |acc, digit| acc * 10 + u128::from(digit - b'0'));
    whole.checked_mul(MILLIS_PER_SECOND)?.checked_add(fraction)
}

fn unit_seconds(unit: &str) -> Option<u128> {
    let seconds = match unit.to_ascii_lowercase().as_str() {
        "w" | "wk" | "wks" | "week" | "weeks" => 7 * 24 * 60 * 60,
        "d" | "day" | "days" => 24 * 60 * 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60 * 60,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        _ => return None,
    };
    Some(seconds)
}

/// Render seconds as `H:MM:SS`, prefixed with the number of days when there are any
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / (24 * 60 * 60);
    let hours = seconds / (60 * 60) % 24;
    let minutes = seconds / 60 % 60;
    let seconds = seconds % 60;
    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        _ => format!("{days} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}
