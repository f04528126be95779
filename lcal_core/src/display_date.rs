//! Parsing of human readable dates such as "Tuesday, 15th July".

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::{Error, Result};

static DATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn date_regex() -> Result<&'static Regex> {
    if let Some(regex) = DATE_REGEX.get() {
        return Ok(regex);
    }
    let regex = Regex::new(
        r"(?xi)
            ^
            (?:[a-z]+day,?\s+)? # the day of the week, optionally followed by a comma
            (?P<day>\d{1,2})
            (?:st|nd|rd|th)?\s+ # an ordinal suffix
            (?P<month>[a-z]+)
            (?:\s+(?P<year>\d{4}))?
            $
        ",
    )?;
    Ok(DATE_REGEX.get_or_init(|| regex))
}

/// Parse a displayed date, resolving a missing year against `today`.
///
/// A date without a year lies in the current year unless that day has already passed,
/// then it lies in the next year.
pub fn parse_display_date(text: &str, today: NaiveDate) -> Result<NaiveDate> {
    let date_regex = date_regex()?;
    let cleaned = clean(text);
    let captures = date_regex
        .captures(&cleaned)
        .ok_or_else(|| Error::Parse(format!("unrecognised date {text:?}")))?;
    let day = &captures["day"];
    let month = &captures["month"];
    let parse = |year: i32| NaiveDate::parse_from_str(&format!("{day} {month} {year}"), "%d %B %Y");
    if let Some(year) = captures.name("year") {
        let year: i32 = year
            .as_str()
            .parse()
            .map_err(|_| Error::Parse(format!("invalid year in {text:?}")))?;
        return parse(year).map_err(|err| Error::Parse(format!("{text:?}: {err}")));
    }
    match parse(today.year()) {
        Ok(date) if date >= today => Ok(date),
        _ => parse(today.year() + 1).map_err(|err| Error::Parse(format!("{text:?}: {err}"))),
    }
}

/// Strip the notes the council appends to a date.
fn clean(text: &str) -> String {
    let mut text = text.trim();
    if let Some((date, _)) = text.split_once(" at ") {
        text = date;
    }
    if let Some((date, _)) = text.split_once('(') {
        text = date;
    }
    text.trim().trim_end_matches(',').trim().to_string()
}
