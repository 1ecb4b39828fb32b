use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use nom::bytes::complete::take_while;
use nom::character::complete::{digit1, multispace0, one_of};
use nom::combinator::{all_consuming, map_res};
use nom::multi::many0;
use nom::sequence::{pair, preceded, terminated};
use nom::IResult;

use crate::error::WatchdogError;

/// Check period split into additive components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Period {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Period {
    pub fn new(days: u64, hours: u64, minutes: u64, seconds: u64) -> Self {
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    /// Parse a compact duration such as `10m`, `1d-2h` or `2h 30m 15s`.
    ///
    /// Tokens are `<integer><unit>` with unit one of `d h m s`, in any order,
    /// separated by whitespace, `-`, `,` or `+`. Absent units are 0. When a
    /// unit repeats, its first occurrence wins. A string with no tokens at all
    /// is a zero period; [`Period::interval`] rejects that later.
    pub fn parse(input: &str) -> Result<Self, WatchdogError> {
        let (_, components) = p_period(input).map_err(|e| WatchdogError::InvalidFormat {
            input: input.to_owned(),
            details: describe(e),
        })?;

        let mut slots: [Option<u64>; 4] = [None; 4];
        for (value, unit) in components {
            let slot = match unit {
                'd' => &mut slots[0],
                'h' => &mut slots[1],
                'm' => &mut slots[2],
                _ => &mut slots[3],
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        let [days, hours, minutes, seconds] = slots.map(|s| s.unwrap_or(0));
        Ok(Self::new(days, hours, minutes, seconds))
    }

    /// Parse a check frequency that must describe a real pause. A zero
    /// period is reported against `input` as typed.
    pub fn parse_nonzero(input: &str) -> Result<Self, WatchdogError> {
        let period = Self::parse(input)?;
        if period.is_zero() {
            return Err(WatchdogError::ZeroPeriod {
                input: input.to_owned(),
            });
        }
        Ok(period)
    }

    pub fn is_zero(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    /// Total length. Saturates instead of overflowing on absurd inputs.
    pub fn as_duration(&self) -> Duration {
        let secs = self
            .days
            .saturating_mul(86_400)
            .saturating_add(self.hours.saturating_mul(3_600))
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds);
        Duration::from_secs(secs)
    }

    /// Schedule interval for this period; a zero period would fire with no pause.
    pub fn interval(&self) -> Result<Duration, WatchdogError> {
        if self.is_zero() {
            return Err(WatchdogError::ZeroPeriod {
                input: self.to_string(),
            });
        }
        Ok(self.as_duration())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d-{}h-{}m-{}s",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

impl FromStr for Period {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn p_separator(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace() || matches!(c, '-' | ',' | '+'))(input)
}

fn p_component(input: &str) -> IResult<&str, (u64, char)> {
    pair(
        map_res(digit1, |digits: &str| digits.parse::<u64>()),
        preceded(multispace0, one_of("dhms")),
    )(input)
}

fn p_period(input: &str) -> IResult<&str, Vec<(u64, char)>> {
    all_consuming(preceded(
        p_separator,
        many0(terminated(p_component, p_separator)),
    ))(input)
}

fn describe(error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            format!("expected <integer><d|h|m|s> tokens, stuck at {:?}", e.input)
        }
        nom::Err::Incomplete(_) => "incomplete input".to_owned(),
    }
}
