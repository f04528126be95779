//! This client fetches the London Natural History Society's programme.
//!
//! The month calendar pages link every event, each event is downloaded as its own iCalendar
//! document and the events of all documents are merged into one calendar.

use std::{
    collections::BTreeSet,
    io::{BufReader, Cursor},
    time::Duration,
};

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use ical::{
    generator::{IcalCalendar, IcalEvent},
    IcalParser,
};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::{
    encode::{encode, unescape_text},
    model::{EventTime, ExtractedEntry},
    normalize::normalize_events,
    response_cache::ResponseCache,
    source_client::SourceClient,
    Error, Result,
};

pub static URL: &str = "https://www.lnhs.org.uk";
static PROD_ID: &str = "-//LNHS Calendar Scraper//EN";
static DOMAIN: &str = "lnhs.org.uk";
static PROGRAMME_PATH: &str = "/index.php/activities/full-programme";
/// Month pages change as events are added, event documents hardly ever do.
static MONTH_PAGE_MAX_AGE: Duration = Duration::from_secs(3600);

/// Which months of the programme to fetch and how.
#[derive(Debug, Clone)]
pub struct EventConfig {
    pub base_url: String,
    /// The first month is the current month of this year, the current year if unset.
    pub year: Option<i32>,
    pub months: u32,
    /// Pause between two event downloads.
    pub request_delay: Duration,
}

impl Default for EventConfig {
    fn default() -> Self {
        EventConfig {
            base_url: String::from(URL),
            year: None,
            months: 2,
            request_delay: Duration::from_millis(500),
        }
    }
}

impl EventConfig {
    fn month_url(&self, month: NaiveDate) -> String {
        format!(
            "{}{PROGRAMME_PATH}/monthcalendar/{}/{}/-",
            self.base_url.trim_end_matches('/'),
            month.year(),
            month.month()
        )
    }

    fn event_url(&self, event_id: u64) -> String {
        format!(
            "{}{PROGRAMME_PATH}/icals.icalevent/-?tmpl=component&evid={event_id}",
            self.base_url.trim_end_matches('/'),
        )
    }
}

/// Get the merged calendar of all events in the configured months.
pub async fn get(
    client: &SourceClient,
    cache: &ResponseCache,
    config: &EventConfig,
    today: NaiveDate,
) -> Result<IcalCalendar> {
    let mut event_ids = BTreeSet::new();
    for month in month_window(config.year, today, config.months)? {
        let url = config.month_url(month);
        let key = format!("calendar_{}_{:02}.html", month.year(), month.month());
        let html = cache
            .get_or_fetch(&key, Some(MONTH_PAGE_MAX_AGE), || async {
                client.get(&url, &[]).await.map(|response| response.body)
            })
            .await?;
        let ids = extract_event_ids(&html)?;
        info!(year = month.year(), month = month.month(), events = ids.len(), "scraped month");
        event_ids.extend(ids);
    }
    if event_ids.is_empty() {
        return Err(Error::Parse(String::from(
            "no event links found in the programme, the page layout may have changed",
        )));
    }
    info!(events = event_ids.len(), "downloading events");
    let mut entries = vec![];
    for (index, event_id) in event_ids.into_iter().enumerate() {
        if index > 0 && !config.request_delay.is_zero() {
            tokio::time::sleep(config.request_delay).await;
        }
        let url = config.event_url(event_id);
        let ics = cache
            .get_or_fetch(&format!("event_{event_id}.ics"), None, || async {
                client.get(&url, &[]).await.map(|response| response.body)
            })
            .await?;
        let found = parse(&ics)?;
        debug!(event_id, entries = found.len(), "parsed event");
        entries.extend(found);
    }
    if entries.is_empty() {
        return Err(Error::Parse(String::from(
            "none of the linked event documents holds an event with a summary and a start",
        )));
    }
    let events = normalize_events(&entries, DOMAIN)?;
    info!(events = events.len(), "merged events");
    encode(PROD_ID, &events)
}

/// The first day of each month to scrape, starting with the current month.
fn month_window(year: Option<i32>, today: NaiveDate, months: u32) -> Result<Vec<NaiveDate>> {
    let year = year.unwrap_or(today.year());
    let first = NaiveDate::from_ymd_opt(year, today.month(), 1)
        .ok_or_else(|| Error::Parse(format!("invalid start month {year}-{}", today.month())))?;
    (0..months)
        .map(|offset| {
            first
                .checked_add_months(Months::new(offset))
                .ok_or_else(|| Error::Parse(format!("month {offset} after {first} is out of range")))
        })
        .collect()
}

/// Extract the ids of all linked events, sorted and without duplicates.
fn extract_event_ids(html: &str) -> Result<BTreeSet<u64>> {
    let dom = Html::parse_document(html);
    let link_selector =
        Selector::parse("a[href]").map_err(|err| Error::Pattern(format!("a[href]: {err}")))?;
    let id_regex = Regex::new(r"/eventdetail/(?P<id>\d+)/")?;
    let ids = dom
        .select(&link_selector)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| id_regex.captures(href))
        .filter_map(|captures| captures["id"].parse().ok())
        .collect();
    Ok(ids)
}

trait GetIcalProperty {
    fn get_ical_property_value(&self, name: &str) -> Option<&String>;
}

impl GetIcalProperty for IcalEvent {
    fn get_ical_property_value(&self, name: &str) -> Option<&String> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .and_then(|property| property.value.as_ref())
    }
}

/// Parse an `DATE` or `DATE-TIME` value, a trailing `Z` marks UTC.
fn parse_event_time(value: &str) -> Option<EventTime> {
    let value = value.trim();
    if value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .map(EventTime::AllDay);
    }
    match value.strip_suffix('Z') {
        Some(utc) => NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(EventTime::Utc),
        None => NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
            .ok()
            .map(EventTime::Local),
    }
}

/// Parse an event's iCalendar document to its entries.
fn parse(ics: &str) -> Result<Vec<ExtractedEntry>> {
    let parser = IcalParser::new(BufReader::new(Cursor::new(ics)));
    let mut entries = vec![];
    let mut calendars = 0;
    for ical_calendar_result in parser {
        let ical_calendar = ical_calendar_result.map_err(|err| Error::Parse(err.to_string()))?;
        calendars += 1;
        for ical_event in ical_calendar.events {
            let summary_option = ical_event.get_ical_property_value("SUMMARY");
            let start_option = ical_event
                .get_ical_property_value("DTSTART")
                .and_then(|dt_start| parse_event_time(dt_start));
            let (Some(summary), Some(start)) = (summary_option, start_option) else {
                debug!("skipping event without summary or start");
                continue;
            };
            let text = |name: &str| {
                ical_event
                    .get_ical_property_value(name)
                    .map(|value| unescape_text(value))
                    .filter(|value| !value.trim().is_empty())
            };
            entries.push(ExtractedEntry {
                category: unescape_text(summary),
                start,
                end: ical_event
                    .get_ical_property_value("DTEND")
                    .and_then(|dt_end| parse_event_time(dt_end)),
                description: text("DESCRIPTION"),
                location: text("LOCATION"),
                url: text("URL"),
            });
        }
    }
    if calendars == 0 {
        return Err(Error::Parse(String::from("event document holds no calendar")));
    }
    Ok(entries)
}
