//! The records flowing through the pipeline.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// The start or end of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// A whole day without a time.
    AllDay(NaiveDate),
    /// A wall clock time in the calendar's time zone.
    Local(NaiveDateTime),
    /// A time in UTC.
    Utc(NaiveDateTime),
}

impl EventTime {
    pub fn date(&self) -> NaiveDate {
        match self {
            EventTime::AllDay(date) => *date,
            EventTime::Local(date_time) | EventTime::Utc(date_time) => date_time.date(),
        }
    }

    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            EventTime::AllDay(_) => None,
            EventTime::Local(date_time) | EventTime::Utc(date_time) => Some(date_time.time()),
        }
    }

    /// The instant used to order two event times, all-day values count from midnight.
    pub fn sort_key(&self) -> NaiveDateTime {
        match self {
            EventTime::AllDay(date) => date.and_time(NaiveTime::MIN),
            EventTime::Local(date_time) | EventTime::Utc(date_time) => *date_time,
        }
    }
}

/// A raw page as returned by a source.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: String,
    pub content_type: Option<String>,
}

/// A date found on a source page, labelled with what happens on that date.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntry {
    /// The collection type or the event name.
    pub category: String,
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
}

impl ExtractedEntry {
    /// An entry covering a whole day.
    pub fn all_day(category: impl Into<String>, date: NaiveDate) -> Self {
        ExtractedEntry {
            category: category.into(),
            start: EventTime::AllDay(date),
            end: None,
            description: None,
            location: None,
            url: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.start.time()
    }
}

/// One event of the generated calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: EventTime,
    pub end: Option<EventTime>,
    /// Stable across runs for the same title and date.
    pub uid: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub categories: Option<String>,
    pub url: Option<String>,
}
