pub mod night;
pub mod timezone;

pub use night::{group_sessions, night_key, NightSession};
pub use timezone::{lookup_for, FixedTimezone, NauticalTimezone, TimezoneLookup, ZoneTimezone};
