use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AppointmentStatus, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarViewKind {
    Day,
    Week,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEntryKind {
    Availability,
    Appointment,
    Event,
}

/// Something that occupies time on the calendar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEntry {
    pub id: Uuid,
    pub kind: CalendarEntryKind,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CalendarEntry {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.starts_at, self.ends_at)
    }
}

/// Entry placed on a day column of the grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedEntry {
    #[serde(flatten)]
    pub entry: CalendarEntry,
    /// Minutes from the top of the visible grid
    pub top_offset_minutes: i64,
    /// Visible duration, clipped to the grid
    pub duration_minutes: i64,
    /// Side-by-side column inside the overlap cluster
    pub column: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarCell {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub entry_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub entries: Vec<PositionedEntry>,
    pub cells: Vec<CalendarCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarView {
    pub kind: CalendarViewKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub slot_minutes: u32,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub date: NaiveDate,
    #[serde(default)]
    pub include_cancelled: bool,
}
