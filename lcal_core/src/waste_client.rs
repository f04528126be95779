//! This client fetches Brent Council's bin days and parses them into collection dates.

use std::time::Duration;

use chrono::NaiveDate;
use ical::generator::IcalCalendar;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::{
    display_date::parse_display_date, encode::encode, model::ExtractedEntry,
    normalize::normalize_waste, source_client::SourceClient, Error, FetchError, Result,
};

pub static URL: &str = "https://recyclingservices.brent.gov.uk/waste";
static PROD_ID: &str = "-//Brent Council//Waste Collection Schedule//EN";
static DOMAIN: &str = "brent.gov.uk";
static LOADING_MARKER: &str = "Loading your bin days...";
static LABEL_NEXT: &str = "Next collection";
static LABEL_LAST: &str = "Last collection";

/// Where and how to fetch the bin days of one property.
#[derive(Debug, Clone)]
pub struct WasteConfig {
    pub property_id: String,
    pub base_url: String,
    /// How often the page is requested while it is still loading.
    pub max_attempts: u32,
    pub poll_delay: Duration,
}

impl WasteConfig {
    pub fn new(property_id: impl Into<String>) -> Self {
        WasteConfig {
            property_id: property_id.into(),
            base_url: String::from(URL),
            max_attempts: 10,
            poll_delay: Duration::from_secs(3),
        }
    }

    fn page_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.property_id
        )
    }
}

/// Get the calendar of upcoming collections for a property.
pub async fn get(
    client: &SourceClient,
    config: &WasteConfig,
    today: NaiveDate,
) -> Result<IcalCalendar> {
    let html = get_page(client, config).await?;
    let entries = parse(&html, today)?;
    info!(
        property_id = %config.property_id,
        collections = entries.len(),
        "extracted collection dates"
    );
    let events = normalize_waste(&entries, DOMAIN)?;
    encode(PROD_ID, &events)
}

/// Get the bin days page, asking again while the council is still loading it.
async fn get_page(client: &SourceClient, config: &WasteConfig) -> Result<String> {
    let page_url = config.page_url();
    let url = format!("{page_url}?page_loading=1");
    for attempt in 1..=config.max_attempts {
        debug!(attempt, max_attempts = config.max_attempts, %url, "fetching bin days");
        let response = client.get(&url, &[("Referer", page_url.as_str())]).await?;
        if !response.body.contains(LOADING_MARKER) {
            return Ok(response.body);
        }
        warn!(attempt, "bin days are still loading");
        if attempt < config.max_attempts {
            tokio::time::sleep(config.poll_delay).await;
        }
    }
    Err(FetchError::StillLoading {
        url,
        attempts: config.max_attempts,
    }
    .into())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| Error::Pattern(format!("{css}: {err}")))
}

fn text_of(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the bin days HTML to the next collection of every service.
fn parse(html: &str, today: NaiveDate) -> Result<Vec<ExtractedEntry>> {
    let dom = Html::parse_document(html);
    let service_selector = selector("h3.waste-service-name")?;
    let term_selector = selector("dt, dd")?;
    let mut services = 0;
    let mut entries = vec![];
    for service in dom.select(&service_selector) {
        services += 1;
        let service_name = text_of(service);
        let Some(details) = service
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|sibling| sibling.value().name() != "h3")
            .find(|sibling| {
                sibling.value().name() == "div"
                    && sibling.value().classes().any(|class| class == "govuk-grid-row")
            })
        else {
            debug!(service = %service_name, "service without details");
            continue;
        };
        let mut label: Option<String> = None;
        for term in details.select(&term_selector) {
            let text = text_of(term);
            if term.value().name() == "dt" {
                label = Some(text);
                continue;
            }
            match label.take().as_deref() {
                Some(l) if l == LABEL_NEXT && !text.is_empty() => {
                    let date = parse_display_date(&text, today)?;
                    entries.push(ExtractedEntry::all_day(service_name.as_str(), date));
                }
                Some(l) if l == LABEL_LAST => {
                    debug!(service = %service_name, last = %text, "skipping last collection");
                }
                _ => {}
            }
        }
    }
    if services == 0 {
        return Err(Error::Parse(String::from(
            "no waste services found, the page layout may have changed",
        )));
    }
    if entries.is_empty() {
        return Err(Error::Parse(format!(
            "none of the {services} waste services lists a next collection"
        )));
    }
    Ok(entries)
}
