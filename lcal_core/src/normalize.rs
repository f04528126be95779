//! Turns extracted entries into calendar events.

use std::{collections::HashSet, sync::OnceLock};

use chrono::NaiveDate;
use regex::Regex;

use crate::{
    model::{CalendarEvent, EventTime, ExtractedEntry},
    Result,
};

static WASTE_CATEGORY: &str = "Waste Collection";
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Build one all-day event per waste collection.
pub fn normalize_waste(entries: &[ExtractedEntry], domain: &str) -> Result<Vec<CalendarEvent>> {
    let events = entries
        .iter()
        .map(|entry| -> Result<CalendarEvent> {
            let category = entry.category.trim();
            let title = collection_title(category);
            let date = entry.date();
            Ok(CalendarEvent {
                uid: uid(&title, &date, domain)?,
                title,
                start: EventTime::AllDay(date),
                end: None,
                description: Some(format!("Waste collection: {category}")),
                location: None,
                categories: Some(String::from(WASTE_CATEGORY)),
                url: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(dedup(events))
}

/// Build one event per programme entry, keeping its published times.
pub fn normalize_events(entries: &[ExtractedEntry], domain: &str) -> Result<Vec<CalendarEvent>> {
    let events = entries
        .iter()
        .map(|entry| -> Result<CalendarEvent> {
            let title = entry.category.trim().to_string();
            Ok(CalendarEvent {
                uid: uid(&title, &entry.date(), domain)?,
                title,
                start: entry.start,
                end: entry.end,
                description: entry.description.clone(),
                location: entry.location.clone(),
                categories: None,
                url: entry.url.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(dedup(events))
}

fn collection_title(category: &str) -> String {
    if category.to_lowercase().ends_with("collection") {
        category.to_string()
    } else {
        format!("{category} collection")
    }
}

/// Keep the first event of every uid.
fn dedup(events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.uid.clone()))
        .collect()
}

fn whitespace_regex() -> Result<&'static Regex> {
    if let Some(regex) = WHITESPACE_REGEX.get() {
        return Ok(regex);
    }
    let regex = Regex::new(r"\s+")?;
    Ok(WHITESPACE_REGEX.get_or_init(|| regex))
}

/// Get a unique id for an event with a title on a date.
///
/// Changing this function is a breaking change!
pub fn uid(title: &str, date: &NaiveDate, domain: &str) -> Result<String> {
    let whitespace_regex = whitespace_regex()?;
    // characters reserved in iCalendar text never reach the uid
    let title = title
        .trim()
        .to_lowercase()
        .replace(|c: char| matches!(c, ',' | ';' | '\\'), "");
    let slug = whitespace_regex.replace_all(&title, "-");
    Ok(format!("{slug}_{}@{domain}", date.format("%Y%m%d")))
}
