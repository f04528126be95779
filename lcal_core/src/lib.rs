//! This crate turns Brent Council's waste collection dates and the London Natural History
//! Society's programme into iCalendar files.
//!
//! The waste dates are read from <https://recyclingservices.brent.gov.uk/waste/>.
//! The programme is read from <https://www.lnhs.org.uk/index.php/activities/full-programme>.

pub use ical;

pub mod cache_gate;
pub mod display_date;
pub mod encode;
pub mod error;
pub mod event_client;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod response_cache;
pub mod source_client;
pub mod waste_client;

pub use error::{Error, FetchError, Result};
