use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::Error;
use crate::error::Error::Config;

const DATE_FORMAT: &str = "%Y-%m-%d";

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-([0-2][1-9]|[1-3]0|3[01])$").expect("valid date pattern")
});

/// Grid resolution of the archive, in degrees (0.05 or 0.25).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precision {
    #[default]
    P05,
    P25,
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "p05" => Ok(Precision::P05),
            "p25" => Ok(Precision::P25),
            invalid => Err(Config(format!("invalid precision: {invalid}"))),
        }
    }
}

impl Display for Precision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Precision::P05 => f.write_str("p05"),
            Precision::P25 => f.write_str("p25"),
        }
    }
}

/// What the user asked for: one day, or every day of an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelection {
    Single(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

impl DateSelection {
    pub fn is_range(&self) -> bool {
        matches!(self, DateSelection::Range { .. })
    }

    /// Every selected date, ascending, each exactly once.
    pub fn dates(&self) -> Vec<NaiveDate> {
        match *self {
            DateSelection::Single(date) => vec![date],
            DateSelection::Range { start, end } => {
                start.iter_days().take_while(|date| *date <= end).collect()
            }
        }
    }
}

impl FromStr for DateSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Config("no date defined".to_string()));
        }

        match s.split_once("..") {
            None => parse_date(s).map(DateSelection::Single),
            Some((start, end)) => {
                let (start, end) = (parse_date(start)?, parse_date(end)?);
                if start > end {
                    return Err(Config(format!(
                        "the start date {start} is after the end date {end}"
                    )));
                }
                Ok(DateSelection::Range { start, end })
            }
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, Error> {
    if !DATE.is_match(s) {
        return Err(Config(format!("invalid date format: {s}")));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| Config(format!("invalid date {s}: {e}")))
}

/// Terminal state of one successfully handled date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Saved { bytes: u64 },
    Missing,
}

/// `2022-01-01.tif`, or `2022-01-01.tif.gz` when the raw archive bytes are kept.
pub fn file_name(date: NaiveDate, compressed: bool) -> String {
    let mut name = format!("{}.tif", date.format(DATE_FORMAT));
    if compressed {
        name.push_str(".gz");
    }
    name
}
