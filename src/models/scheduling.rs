use std::fmt;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;
use validator::Validate;

/// `#rgb` or `#rrggbb`
static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid color pattern"));

/// Half-open `[start, end)` interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Intersection of two windows, if any
    pub fn clip(&self, bounds: &TimeWindow) -> Option<TimeWindow> {
        let clipped = TimeWindow::new(self.start.max(bounds.start), self.end.min(bounds.end));
        clipped.is_valid().then_some(clipped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// `pending -> confirmed | cancelled`, `confirmed -> completed | cancelled`.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    /// Whether the appointment still occupies the trainer's time
    pub fn blocks_time(self) -> bool {
        self != AppointmentStatus::Cancelled
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.starts_at, self.ends_at)
    }

    /// Concrete occurrences of this slot overlapping `range`.
    ///
    /// Recurring slots repeat weekly from their first occurrence onwards.
    pub fn occurrences_within(&self, range: &TimeWindow) -> Vec<TimeWindow> {
        let base = self.window();
        if !self.is_recurring {
            return if base.overlaps(range) { vec![base] } else { vec![] };
        }

        let week = Duration::weeks(1);
        let mut weeks_ahead = if range.start > base.end {
            (range.start - base.end).num_seconds() / week.num_seconds()
        } else {
            0
        };

        let mut occurrences = Vec::new();
        loop {
            let shift = week * weeks_ahead as i32;
            let (Some(start), Some(end)) = (base.start.checked_add_signed(shift), base.end.checked_add_signed(shift))
            else {
                break;
            };
            let occurrence = TimeWindow::new(start, end);
            if occurrence.start >= range.end {
                break;
            }
            if occurrence.overlaps(range) {
                occurrences.push(occurrence);
            }
            weeks_ahead += 1;
        }

        occurrences
    }
}

/// Availability occurrence as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityOccurrence {
    pub slot_id: Uuid,
    pub personal_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_recurring: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlotQuery {
    pub personal_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub student_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.starts_at, self.ends_at)
    }
}

/// Appointment joined with both parties' names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppointmentView {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub personal_name: String,
    pub student_id: Uuid,
    pub student_name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookAppointmentRequest {
    /// Required when a student books
    pub personal_id: Option<Uuid>,
    /// Required when a personal schedules one of their students
    pub student_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PersonalEvent {
    pub id: Uuid,
    pub personal_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePersonalEventRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[validate(regex(path = *HEX_COLOR, message = "must be a hex color like #1e90ff"))]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePersonalEventRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[validate(regex(path = *HEX_COLOR, message = "must be a hex color like #1e90ff"))]
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
