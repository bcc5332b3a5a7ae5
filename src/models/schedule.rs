use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::services::availability::{TimeOfDay, TimeRange};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkingSlot {
    pub day: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// An artist's recurring working hours.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeeklySchedule {
    pub slots: Vec<WorkingSlot>,
}

impl WeeklySchedule {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let schedule: WeeklySchedule = serde_json::from_str(s)?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for slot in &self.slots {
            parse_weekday(&slot.day)?;
            if slot.start >= slot.end {
                anyhow::bail!("slot on {} ends before it starts: {}-{}", slot.day, slot.start, slot.end);
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when `range` lies entirely inside one slot for the weekday of `date`.
    pub fn fits(&self, date: NaiveDate, range: &TimeRange) -> bool {
        let weekday = date.weekday();
        self.slots.iter().any(|slot| {
            parse_weekday(&slot.day).is_ok_and(|d| d == weekday)
                && range.start >= slot.start
                && range.end <= slot.end
        })
    }

    pub fn to_human_readable(&self) -> String {
        let mut sorted_slots = self.slots.clone();
        sorted_slots.sort_by_key(|s| {
            (
                parse_weekday(&s.day).map(|d| d.num_days_from_monday()).unwrap_or(7),
                s.start,
            )
        });

        sorted_slots
            .iter()
            .map(|s| format!("{}: {}-{}", capitalize(&s.day), s.start, s.end))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

/// Accepts "mon" or "monday" in any case.
fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("invalid weekday: {s}"))
}
