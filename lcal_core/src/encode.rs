//! Encodes calendar events as an iCalendar document.

use ical::{
    generator::{IcalCalendar, IcalCalendarBuilder, IcalEvent, Property},
    ical_param, ical_property,
};

use crate::{
    model::{CalendarEvent, EventTime},
    Error, Result,
};

static TIMEZONE: &str = "Europe/London";
static DATE_FORMAT: &str = "%Y%m%d";
static DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
static LINE_BREAK: &str = "\r\n";
/// The longest content line in octets, without the line break.
const MAX_LINE_OCTETS: usize = 75;

/// A date or date-time property named `$name` holding an [`EventTime`].
macro_rules! time_property {
    ($name:literal, $time:expr) => {
        match $time {
            EventTime::AllDay(date) => ical_property!(
                $name,
                date.format(DATE_FORMAT).to_string(),
                ical_param!("VALUE", "DATE")
            ),
            EventTime::Local(date_time) => ical_property!(
                $name,
                date_time.format(DATE_TIME_FORMAT).to_string(),
                ical_param!("TZID", TIMEZONE)
            ),
            EventTime::Utc(date_time) => ical_property!(
                $name,
                format!("{}Z", date_time.format(DATE_TIME_FORMAT))
            ),
        }
    };
}

/// Build the calendar holding `events` in the given order.
pub fn encode(prod_id: &str, events: &[CalendarEvent]) -> Result<IcalCalendar> {
    let mut calendar = IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(prod_id)
        .build();
    calendar.properties.push(ical_property!("METHOD", "PUBLISH"));
    for event in events {
        calendar.events.push(encode_event(event)?);
    }
    Ok(calendar)
}

/// Render the calendar as the bytes of an `.ics` file.
///
/// Lines end in CRLF and are folded at 75 octets without splitting a character.
pub fn to_bytes(calendar: &IcalCalendar) -> Vec<u8> {
    let mut text = String::new();
    write_component(&mut text, "VCALENDAR", &calendar.properties);
    for event in &calendar.events {
        write_component(&mut text, "VEVENT", &event.properties);
        for alarm in &event.alarms {
            write_component(&mut text, "VALARM", &alarm.properties);
            write_line(&mut text, "END:VALARM");
        }
        write_line(&mut text, "END:VEVENT");
    }
    write_line(&mut text, "END:VCALENDAR");
    text.into_bytes()
}

/// Open a component and write its properties.
fn write_component(text: &mut String, name: &str, properties: &[Property]) {
    write_line(text, &format!("BEGIN:{name}"));
    for property in properties {
        write_line(text, &content_line(property));
    }
}

fn content_line(property: &Property) -> String {
    let mut line = property.name.clone();
    for (name, values) in property.params.iter().flatten() {
        line.push(';');
        line.push_str(name);
        line.push('=');
        line.push_str(&values.join(","));
    }
    line.push(':');
    line.push_str(property.value.as_deref().unwrap_or_default());
    line
}

/// Append `line` folded into chunks of at most [`MAX_LINE_OCTETS`].
fn write_line(text: &mut String, line: &str) {
    let mut rest = line;
    let mut limit = MAX_LINE_OCTETS;
    while rest.len() > limit {
        let boundary = (0..=limit)
            .rev()
            .find(|&at| rest.is_char_boundary(at))
            .unwrap_or(0);
        // readers trim the end of every physical line, so a fold never follows whitespace
        let at = match rest[..boundary].trim_end().len() {
            0 => boundary,
            at => at,
        };
        text.push_str(&rest[..at]);
        text.push_str(LINE_BREAK);
        text.push(' ');
        rest = &rest[at..];
        // the leading space of a continuation counts
        limit = MAX_LINE_OCTETS - 1;
    }
    text.push_str(rest);
    text.push_str(LINE_BREAK);
}

fn encode_event(event: &CalendarEvent) -> Result<IcalEvent> {
    if event.title.trim().is_empty() {
        return Err(Error::Encode(format!("event {:?} has no title", event.uid)));
    }
    if event.uid.trim().is_empty() {
        return Err(Error::Encode(format!("event {:?} has no uid", event.title)));
    }
    if let Some(end) = event.end {
        if end.sort_key() < event.start.sort_key() {
            return Err(Error::Encode(format!(
                "event {:?} ends before it starts",
                event.uid
            )));
        }
    }
    let mut ical_event = IcalEvent::new();
    let properties = &mut ical_event.properties;
    properties.push(ical_property!("UID", event.uid.as_str()));
    // midnight UTC of the start date so that regenerating yields identical bytes
    properties.push(ical_property!(
        "DTSTAMP",
        format!("{}T000000Z", event.start.date().format(DATE_FORMAT))
    ));
    properties.push(time_property!("DTSTART", event.start));
    if let Some(end) = event.end {
        properties.push(time_property!("DTEND", end));
    }
    properties.push(ical_property!("SUMMARY", escape_text(&event.title)));
    if let Some(description) = &event.description {
        properties.push(ical_property!("DESCRIPTION", escape_text(description)));
    }
    if let Some(location) = &event.location {
        properties.push(ical_property!("LOCATION", escape_text(location)));
    }
    if let Some(categories) = &event.categories {
        properties.push(ical_property!("CATEGORIES", escape_text(categories)));
    }
    if let Some(url) = &event.url {
        properties.push(ical_property!("URL", url.as_str()));
    }
    if let EventTime::AllDay(_) = event.start {
        properties.push(ical_property!("TRANSP", "TRANSPARENT"));
    }
    Ok(ical_event)
}

/// Escape the characters reserved in iCalendar text values.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Undo [`escape_text`].
pub fn unescape_text(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => unescaped.push('\n'),
            Some(other) => unescaped.push(other),
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor};

    use chrono::{NaiveDate, NaiveDateTime};
    use ical::{generator::IcalEvent, IcalParser};

    use crate::{
        encode::{encode, escape_text, to_bytes, unescape_text},
        model::{CalendarEvent, EventTime},
        Error,
    };

    fn waste_event(title: &str, date: NaiveDate) -> CalendarEvent {
        CalendarEvent {
            title: title.to_string(),
            start: EventTime::AllDay(date),
            end: None,
            uid: format!("{}_{}@brent.gov.uk", title, date.format("%Y%m%d")),
            description: Some(format!("Waste collection: {title}")),
            location: None,
            categories: Some(String::from("Waste Collection")),
            url: None,
        }
    }

    fn property_value<'a>(event: &'a IcalEvent, name: &str) -> Option<&'a String> {
        event
            .properties
            .iter()
            .find(|property| property.name == name)
            .and_then(|property| property.value.as_ref())
    }

    fn decode(bytes: &[u8]) -> Vec<IcalEvent> {
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let mut parser = IcalParser::new(BufReader::new(Cursor::new(text)));
        parser.next().unwrap().unwrap().events
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a, b; c\\d"), "a\\, b\\; c\\\\d");
        assert_eq!(escape_text("line\r\nnext\nlast"), "line\\nnext\\nlast");
        assert_eq!(unescape_text("a\\, b\\; c\\\\d\\nnext"), "a, b; c\\d\nnext");
    }

    #[test]
    fn test_encode_envelope_and_fields() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        let calendar = encode(
            "-//lcal//Brent waste collections//EN",
            &[waste_event("Recycling collection", date)],
        )
        .unwrap();
        let text = String::from_utf8(to_bytes(&calendar)).unwrap();
        assert!(text.starts_with("BEGIN:VCALENDAR"));
        assert!(text.contains("VERSION:2.0"));
        assert!(text.contains("PRODID:-//lcal//Brent waste collections//EN"));
        assert!(text.contains("METHOD:PUBLISH"));
        assert!(text.contains("DTSTART;VALUE=DATE:20250715"));
        assert!(text.contains("DTSTAMP:20250715T000000Z"));
        assert!(text.contains("SUMMARY:Recycling collection"));
        assert!(text.trim_end().ends_with("END:VCALENDAR"));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let events = vec![
            waste_event(
                "Food waste collection",
                NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            ),
            waste_event(
                "Rubbish collection",
                NaiveDate::from_ymd_opt(2025, 7, 22).unwrap(),
            ),
        ];
        let first = to_bytes(&encode("-//lcal//test//EN", &events).unwrap());
        let second = to_bytes(&encode("-//lcal//test//EN", &events).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        let start =
            NaiveDateTime::parse_from_str("20251012T103000", "%Y%m%dT%H%M%S").unwrap();
        let end = NaiveDateTime::parse_from_str("20251012T130000", "%Y%m%dT%H%M%S").unwrap();
        let walk = CalendarEvent {
            title: String::from("Bird walk, Brent Reservoir; members only"),
            start: EventTime::Local(start),
            end: Some(EventTime::Local(end)),
            uid: String::from("bird-walk_20251012@lnhs.org.uk"),
            description: Some(String::from("Leader: J. Smith\nBring binoculars")),
            location: Some(String::from("Welsh Harp")),
            categories: None,
            url: None,
        };
        let events = vec![waste_event("Garden waste collection", date), walk];
        let decoded = decode(&to_bytes(&encode("-//lcal//test//EN", &events).unwrap()));
        assert_eq!(decoded.len(), 2);

        assert_eq!(
            unescape_text(property_value(&decoded[0], "SUMMARY").unwrap()),
            "Garden waste collection"
        );
        assert_eq!(property_value(&decoded[0], "DTSTART").unwrap(), "20250105");
        assert_eq!(
            property_value(&decoded[0], "UID").unwrap(),
            "Garden waste collection_20250105@brent.gov.uk"
        );

        assert_eq!(
            unescape_text(property_value(&decoded[1], "SUMMARY").unwrap()),
            "Bird walk, Brent Reservoir; members only"
        );
        assert_eq!(
            unescape_text(property_value(&decoded[1], "DESCRIPTION").unwrap()),
            "Leader: J. Smith\nBring binoculars"
        );
        assert_eq!(
            property_value(&decoded[1], "DTSTART").unwrap(),
            "20251012T103000"
        );
        assert_eq!(property_value(&decoded[1], "DTEND").unwrap(), "20251012T130000");
        assert_eq!(
            property_value(&decoded[1], "UID").unwrap(),
            "bird-walk_20251012@lnhs.org.uk"
        );
    }

    #[test]
    fn test_lines_end_in_crlf() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        let calendar = encode("-//lcal//test//EN", &[waste_event("Rubbish collection", date)])
            .unwrap();
        let text = String::from_utf8(to_bytes(&calendar)).unwrap();
        assert!(text.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(text.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
        assert!(!text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn test_long_non_ascii_text_is_folded_on_char_boundaries() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 12).unwrap();
        // the apostrophe occupies octets 74 to 76 of the DESCRIPTION line
        let description = format!(
            "{}\u{2019}s moth records \u{2026} caf\u{e9} night \u{2013} {}",
            "A".repeat(62),
            "Brent Reservoir, Welsh Harp and the Society\u{2019}s garden ".repeat(3)
        )
        .trim_end()
        .to_string();
        let mut event = waste_event("Moth night", date);
        event.description = Some(description.clone());
        let text = String::from_utf8(to_bytes(
            &encode("-//lcal//test//EN", &[event]).unwrap(),
        ))
        .unwrap();

        let lines: Vec<&str> = text.split_terminator("\r\n").collect();
        assert!(lines.iter().all(|line| line.len() <= 75));
        assert!(lines.contains(&format!("DESCRIPTION:{}", "A".repeat(62)).as_str()));
        let decoded = decode(text.as_bytes());
        assert_eq!(
            unescape_text(property_value(&decoded[0], "DESCRIPTION").unwrap()),
            description
        );
    }

    #[test]
    fn test_timed_event_is_stamped_at_midnight_utc() {
        let start = NaiveDateTime::parse_from_str("20251012T103000", "%Y%m%dT%H%M%S").unwrap();
        let mut event = waste_event("Bird walk", start.date());
        event.start = EventTime::Local(start);
        let text =
            String::from_utf8(to_bytes(&encode("-//lcal//test//EN", &[event]).unwrap())).unwrap();
        assert!(text.contains("DTSTAMP:20251012T000000Z\r\n"));
        assert!(text.contains("DTSTART;TZID=Europe/London:20251012T103000\r\n"));
    }

    #[test]
    fn test_encode_rejects_incomplete_events() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        let mut untitled = waste_event("Rubbish collection", date);
        untitled.title = String::from("  ");
        assert!(matches!(
            encode("-//lcal//test//EN", &[untitled]),
            Err(Error::Encode(_))
        ));

        let mut backwards = waste_event("Rubbish collection", date);
        backwards.end = Some(EventTime::AllDay(date.pred_opt().unwrap()));
        assert!(matches!(
            encode("-//lcal//test//EN", &[backwards]),
            Err(Error::Encode(_))
        ));
    }
}
