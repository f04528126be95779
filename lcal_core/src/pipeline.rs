//! Runs a calendar source behind the cache gate and writes its result.

use std::{future::Future, path::Path, time::SystemTime};

use ical::generator::IcalCalendar;
use tracing::info;

use crate::{cache_gate::CacheGate, encode::to_bytes, output::write_atomically, Result};

/// What a run did to the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The existing file was kept, nothing was fetched.
    Skipped,
    Written { events: usize },
}

/// Build the calendar with `build` unless the gate keeps the file at `path`, then replace the file.
///
/// A failing `build` leaves the file at `path` untouched.
pub async fn generate<F, Fut>(gate: &CacheGate, path: &Path, build: F) -> Result<Outcome>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<IcalCalendar>>,
{
    let decision = gate.check(path, SystemTime::now());
    if !decision.should_generate() {
        info!(path = %path.display(), "calendar exists, skipping generation");
        return Ok(Outcome::Skipped);
    }
    info!(path = %path.display(), ?decision, "generating calendar");
    let calendar = build().await?;
    let events = calendar.events.len();
    write_atomically(path, &to_bytes(&calendar))?;
    info!(path = %path.display(), events, "calendar written");
    Ok(Outcome::Written { events })
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use chrono::NaiveDate;

    use crate::{
        cache_gate::CacheGate,
        pipeline::{generate, Outcome},
        source_client::SourceClient,
        waste_client::{self, WasteConfig},
        Error,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 10).unwrap()
    }

    #[tokio::test]
    async fn test_existing_calendar_is_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.ics");
        fs::write(&path, "previous").unwrap();
        let outcome = generate(&CacheGate::default(), &path, || async {
            Err(Error::Parse(String::from("must not build")))
        })
        .await
        .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
    }

    #[tokio::test]
    async fn test_failed_run_keeps_previous_calendar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.ics");
        fs::write(&path, "previous").unwrap();
        let gate = CacheGate {
            force: true,
            max_age: None,
        };
        let result = generate(&gate, &path, || async {
            Err(Error::Parse(String::from("layout changed")))
        })
        .await;
        assert!(matches!(result, Err(Error::Parse(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "previous");
    }

    #[tokio::test]
    async fn test_regeneration_is_byte_identical() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/waste/12345678")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(include_str!("waste_client/tests/response.html"))
            .create_async()
            .await;
        let client = SourceClient::new().unwrap();
        let config = WasteConfig {
            base_url: format!("{}/waste", server.url()),
            poll_delay: Duration::ZERO,
            ..WasteConfig::new("12345678")
        };
        let gate = CacheGate {
            force: true,
            max_age: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.ics");

        let outcome = generate(&gate, &path, || waste_client::get(&client, &config, today()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Written { events: 4 });
        let first = fs::read(&path).unwrap();
        generate(&gate, &path, || waste_client::get(&client, &config, today()))
            .await
            .unwrap();
        let second = fs::read(&path).unwrap();
        assert_eq!(first, second);
    }
}
