use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AppointmentStatus, AppointmentView, AvailabilitySlot, CalendarCell, CalendarDay, CalendarEntry,
    CalendarEntryKind, CalendarQuery, CalendarView, CalendarViewKind, PersonalEvent, PositionedEntry, TimeWindow,
};
use crate::services::profile_service::{personal_for_user, student_for_user};
use crate::services::scheduling_service::expand_availability;
use crate::services::SchedulingService;

/// Visible hours and cell size of the calendar grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarGrid {
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub slot_minutes: u32,
}

impl Default for CalendarGrid {
    fn default() -> Self {
        Self {
            day_start_hour: 6,
            day_end_hour: 22,
            slot_minutes: 30,
        }
    }
}

impl CalendarGrid {
    /// Visible part of `date`, `None` at the edge of the representable range
    pub fn bounds(&self, date: NaiveDate) -> Option<TimeWindow> {
        Some(TimeWindow::new(
            at_hour(date, self.day_start_hour)?,
            at_hour(date, self.day_end_hour)?,
        ))
    }

    pub fn cells_per_day(&self) -> usize {
        ((self.day_end_hour - self.day_start_hour) * 60 / self.slot_minutes) as usize
    }
}

fn at_hour(date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    midnight.checked_add_signed(Duration::hours(hour as i64))
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))
}

/// Dates covered by a view anchored on `date`, `None` when a week runs off the calendar
pub fn view_dates(kind: CalendarViewKind, date: NaiveDate) -> Option<Vec<NaiveDate>> {
    match kind {
        CalendarViewKind::Day => Some(vec![date]),
        CalendarViewKind::Week => {
            let monday = week_start(date)?;
            (0..7)
                .map(|offset| monday.checked_add_signed(Duration::days(offset)))
                .collect()
        }
    }
}

/// Full-day UTC range covered by a set of consecutive dates
fn dates_range(dates: &[NaiveDate]) -> Option<TimeWindow> {
    let first = dates.first()?;
    let last = dates.last()?;
    Some(TimeWindow::new(at_hour(*first, 0)?, at_hour(*last, 24)?))
}

fn out_of_range() -> AppError {
    AppError::bad_request("Date is out of range")
}

/// Dates and full-day UTC range of a view, rejecting anchors too close to the calendar edge
pub fn view_range(kind: CalendarViewKind, date: NaiveDate) -> AppResult<(Vec<NaiveDate>, TimeWindow)> {
    let dates = view_dates(kind, date).ok_or_else(out_of_range)?;
    let range = dates_range(&dates).ok_or_else(out_of_range)?;
    Ok((dates, range))
}

/// Place one day's entries.
///
/// Availability sits in the background and always takes the full width.
/// Other entries are grouped into clusters of transitively overlapping
/// entries and packed greedily into the first free column of their cluster.
pub fn layout_day(entries: &[CalendarEntry], bounds: &TimeWindow) -> Vec<PositionedEntry> {
    let mut background = Vec::new();
    let mut foreground: Vec<(TimeWindow, &CalendarEntry)> = Vec::new();

    for entry in entries {
        let Some(visible) = entry.window().clip(bounds) else {
            continue;
        };
        if entry.kind == CalendarEntryKind::Availability {
            background.push(position(entry, &visible, bounds, 0, 1));
        } else {
            foreground.push((visible, entry));
        }
    }

    background.sort_by_key(|p| p.top_offset_minutes);
    foreground.sort_by(|(a, _), (b, _)| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut positioned = background;
    let mut cluster: Vec<(TimeWindow, &CalendarEntry, usize)> = Vec::new();
    let mut column_ends: Vec<DateTime<Utc>> = Vec::new();
    let mut cluster_end: Option<DateTime<Utc>> = None;

    for (visible, entry) in foreground {
        if cluster_end.is_some_and(|end| visible.start >= end) {
            flush_cluster(&mut positioned, &mut cluster, column_ends.len(), bounds);
            column_ends.clear();
        }

        let column = match column_ends.iter().position(|end| *end <= visible.start) {
            Some(free) => {
                column_ends[free] = visible.end;
                free
            }
            None => {
                column_ends.push(visible.end);
                column_ends.len() - 1
            }
        };

        cluster_end = Some(cluster_end.map_or(visible.end, |end| end.max(visible.end)));
        cluster.push((visible, entry, column));
    }
    flush_cluster(&mut positioned, &mut cluster, column_ends.len(), bounds);

    positioned
}

fn flush_cluster(
    positioned: &mut Vec<PositionedEntry>,
    cluster: &mut Vec<(TimeWindow, &CalendarEntry, usize)>,
    column_count: usize,
    bounds: &TimeWindow,
) {
    for (visible, entry, column) in cluster.drain(..) {
        positioned.push(position(entry, &visible, bounds, column, column_count));
    }
}

fn position(
    entry: &CalendarEntry,
    visible: &TimeWindow,
    bounds: &TimeWindow,
    column: usize,
    column_count: usize,
) -> PositionedEntry {
    PositionedEntry {
        entry: entry.clone(),
        top_offset_minutes: (visible.start - bounds.start).num_minutes(),
        duration_minutes: visible.duration_minutes(),
        column,
        column_count,
    }
}

/// Grid cells of one day, each listing the entries that overlap it
pub fn build_cells(entries: &[PositionedEntry], bounds: &TimeWindow, grid: &CalendarGrid) -> Vec<CalendarCell> {
    let step = Duration::minutes(grid.slot_minutes as i64);

    (0..grid.cells_per_day())
        .map(|index| {
            let start = bounds.start + step * index as i32;
            let cell = TimeWindow::new(start, start + step);
            CalendarCell {
                starts_at: cell.start,
                ends_at: cell.end,
                entry_ids: entries
                    .iter()
                    .filter(|p| p.entry.window().overlaps(&cell))
                    .map(|p| p.entry.id)
                    .collect(),
            }
        })
        .collect()
}

/// Lay out entries over a day or week anchored on `date`
pub fn build_view(
    kind: CalendarViewKind,
    date: NaiveDate,
    entries: &[CalendarEntry],
    grid: &CalendarGrid,
) -> AppResult<CalendarView> {
    let dates = view_dates(kind, date).ok_or_else(out_of_range)?;

    let days = dates
        .iter()
        .map(|day| {
            let bounds = grid.bounds(*day).ok_or_else(out_of_range)?;
            let positioned = layout_day(entries, &bounds);
            let cells = build_cells(&positioned, &bounds, grid);
            Ok(CalendarDay {
                date: *day,
                entries: positioned,
                cells,
            })
        })
        .collect::<AppResult<Vec<CalendarDay>>>()?;

    Ok(CalendarView {
        kind,
        start_date: dates[0],
        end_date: dates[dates.len() - 1],
        day_start_hour: grid.day_start_hour,
        day_end_hour: grid.day_end_hour,
        slot_minutes: grid.slot_minutes,
        days,
    })
}

pub fn availability_entries(slots: &[AvailabilitySlot], range: &TimeWindow) -> Vec<CalendarEntry> {
    expand_availability(slots, range)
        .into_iter()
        .map(|occurrence| CalendarEntry {
            id: occurrence.slot_id,
            kind: CalendarEntryKind::Availability,
            title: "Available".to_string(),
            starts_at: occurrence.starts_at,
            ends_at: occurrence.ends_at,
            status: None,
            color: None,
        })
        .collect()
}

/// Appointments titled after the other party
pub fn appointment_entries(
    appointments: &[AppointmentView],
    viewer: UserRole,
    include_cancelled: bool,
) -> Vec<CalendarEntry> {
    appointments
        .iter()
        .filter(|a| include_cancelled || a.status != AppointmentStatus::Cancelled)
        .map(|a| {
            let counterpart = if viewer == UserRole::Student {
                &a.personal_name
            } else {
                &a.student_name
            };
            CalendarEntry {
                id: a.id,
                kind: CalendarEntryKind::Appointment,
                title: format!("Session with {counterpart}"),
                starts_at: a.starts_at,
                ends_at: a.ends_at,
                status: Some(a.status),
                color: None,
            }
        })
        .collect()
}

pub fn event_entries(events: &[PersonalEvent]) -> Vec<CalendarEntry> {
    events
        .iter()
        .map(|event| CalendarEntry {
            id: event.id,
            kind: CalendarEntryKind::Event,
            title: event.title.clone(),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            status: None,
            color: event.color.clone(),
        })
        .collect()
}

#[derive(Clone)]
pub struct CalendarService {
    scheduling: SchedulingService,
    db: sqlx::PgPool,
    grid: CalendarGrid,
}

impl CalendarService {
    pub fn new(db: sqlx::PgPool, scheduling: SchedulingService) -> Self {
        Self {
            scheduling,
            db,
            grid: CalendarGrid::default(),
        }
    }

    #[tracing::instrument(skip(self), fields(user_id = %session.user_id))]
    pub async fn view(
        &self,
        session: &UserSession,
        kind: CalendarViewKind,
        query: &CalendarQuery,
    ) -> AppResult<CalendarView> {
        let (_, range) = view_range(kind, query.date)?;

        let entries = match session.role {
            UserRole::Personal => {
                let personal = personal_for_user(&self.db, session.user_id).await?;
                self.personal_entries(personal.id, &range, query.include_cancelled).await?
            }
            UserRole::Student => {
                let student = student_for_user(&self.db, session.user_id).await?;
                self.student_entries(student.id, student.personal_id, &range, query.include_cancelled)
                    .await?
            }
            UserRole::Admin => return Err(AppError::forbidden("Calendars belong to personals and students")),
        };

        tracing::debug!(entries = entries.len(), "building calendar view");
        build_view(kind, query.date, &entries, &self.grid)
    }

    async fn personal_entries(
        &self,
        personal_id: Uuid,
        range: &TimeWindow,
        include_cancelled: bool,
    ) -> AppResult<Vec<CalendarEntry>> {
        let slots = self.scheduling.slots_for_personal(personal_id).await?;
        let appointments = self
            .scheduling
            .appointments_in_range(Some(personal_id), None, range)
            .await?;
        let events = self.scheduling.events_in_range(personal_id, range).await?;

        let mut entries = availability_entries(&slots, range);
        entries.extend(appointment_entries(&appointments, UserRole::Personal, include_cancelled));
        entries.extend(event_entries(&events));
        Ok(entries)
    }

    async fn student_entries(
        &self,
        student_id: Uuid,
        personal_id: Option<Uuid>,
        range: &TimeWindow,
        include_cancelled: bool,
    ) -> AppResult<Vec<CalendarEntry>> {
        let appointments = self
            .scheduling
            .appointments_in_range(None, Some(student_id), range)
            .await?;

        let mut entries = match personal_id {
            Some(personal_id) => {
                let slots = self.scheduling.slots_for_personal(personal_id).await?;
                availability_entries(&slots, range)
            }
            None => Vec::new(),
        };
        entries.extend(appointment_entries(&appointments, UserRole::Student, include_cancelled));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn entry(kind: CalendarEntryKind, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEntry {
        CalendarEntry {
            id: Uuid::new_v4(),
            kind,
            title: "entry".to_string(),
            starts_at: start,
            ends_at: end,
            status: None,
            color: None,
        }
    }

    fn appointment(start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEntry {
        entry(CalendarEntryKind::Appointment, start, end)
    }

    fn find(positioned: &[PositionedEntry], id: Uuid) -> &PositionedEntry {
        positioned.iter().find(|p| p.entry.id == id).unwrap()
    }

    #[test]
    fn test_week_start_is_monday() {
        // 7 March 2024 is a Thursday
        assert_eq!(week_start(date(7)), Some(date(4)));
        assert_eq!(week_start(date(4)), Some(date(4)));
        assert_eq!(week_start(date(10)), Some(date(4)));
        assert_eq!(view_dates(CalendarViewKind::Week, date(7)).map(|d| d.len()), Some(7));
        assert_eq!(view_dates(CalendarViewKind::Day, date(7)), Some(vec![date(7)]));
    }

    #[test]
    fn test_dates_at_the_calendar_edge_are_rejected() {
        assert_eq!(dates_range(&[NaiveDate::MAX]), None);

        assert_matches!(view_range(CalendarViewKind::Day, NaiveDate::MAX), Err(AppError::BadRequest(_)));
        assert_matches!(view_range(CalendarViewKind::Week, NaiveDate::MAX), Err(AppError::BadRequest(_)));

        let (dates, range) = view_range(CalendarViewKind::Week, date(7)).unwrap();
        assert_eq!(dates.len(), 7);
        assert_eq!(range.start, at(4, 0, 0));
        assert_eq!(range.end, at(11, 0, 0));
    }

    #[test]
    fn test_grid_has_thirty_two_cells() {
        let grid = CalendarGrid::default();
        let bounds = grid.bounds(date(4)).unwrap();
        let cells = build_cells(&[], &bounds, &grid);

        assert_eq!(cells.len(), 32);
        assert_eq!(cells[0].starts_at, at(4, 6, 0));
        assert_eq!(cells[31].ends_at, at(4, 22, 0));
    }

    #[test]
    fn test_cells_use_half_open_overlap() {
        let grid = CalendarGrid::default();
        let bounds = grid.bounds(date(4)).unwrap();
        let session = appointment(at(4, 9, 0), at(4, 10, 0));
        let positioned = layout_day(&[session.clone()], &bounds);
        let cells = build_cells(&positioned, &bounds, &grid);

        let occupied: Vec<_> = cells
            .iter()
            .filter(|c| c.entry_ids.contains(&session.id))
            .map(|c| c.starts_at)
            .collect();

        assert_eq!(occupied, vec![at(4, 9, 0), at(4, 9, 30)]);
    }

    #[test]
    fn test_offsets_and_clipping() {
        let bounds = CalendarGrid::default().bounds(date(4)).unwrap();
        let early = appointment(at(4, 5, 0), at(4, 7, 0));
        let late = appointment(at(4, 21, 30), at(4, 23, 0));
        let hidden = appointment(at(4, 23, 0), at(4, 23, 30));

        let positioned = layout_day(&[early.clone(), late.clone(), hidden.clone()], &bounds);

        assert_eq!(positioned.len(), 2);
        let early = find(&positioned, early.id);
        assert_eq!((early.top_offset_minutes, early.duration_minutes), (0, 60));
        let late = find(&positioned, late.id);
        assert_eq!((late.top_offset_minutes, late.duration_minutes), (930, 30));
    }

    #[test]
    fn test_overlapping_entries_share_a_cluster() {
        let bounds = CalendarGrid::default().bounds(date(4)).unwrap();
        let a = appointment(at(4, 9, 0), at(4, 10, 0));
        let b = appointment(at(4, 9, 30), at(4, 11, 0));
        let c = entry(CalendarEntryKind::Event, at(4, 10, 0), at(4, 10, 30));
        let alone = appointment(at(4, 14, 0), at(4, 15, 0));

        let positioned = layout_day(&[a.clone(), b.clone(), c.clone(), alone.clone()], &bounds);

        let a = find(&positioned, a.id);
        let b = find(&positioned, b.id);
        let c = find(&positioned, c.id);
        let alone = find(&positioned, alone.id);

        assert_eq!((a.column, b.column, c.column), (0, 1, 0));
        assert_eq!((a.column_count, b.column_count, c.column_count), (2, 2, 2));
        assert_eq!((alone.column, alone.column_count), (0, 1));
    }

    #[test]
    fn test_transitive_overlap_extends_cluster() {
        let bounds = CalendarGrid::default().bounds(date(4)).unwrap();
        let first = appointment(at(4, 8, 0), at(4, 9, 0));
        let bridge = appointment(at(4, 8, 30), at(4, 9, 30));
        let last = appointment(at(4, 9, 0), at(4, 10, 0));

        let positioned = layout_day(&[last.clone(), first.clone(), bridge.clone()], &bounds);

        // `first` and `last` never overlap but are joined through `bridge`
        assert!(positioned.iter().all(|p| p.column_count == 2));
        assert_eq!(find(&positioned, first.id).column, 0);
        assert_eq!(find(&positioned, bridge.id).column, 1);
        assert_eq!(find(&positioned, last.id).column, 0);
    }

    #[test]
    fn test_adjacent_entries_do_not_overlap() {
        let bounds = CalendarGrid::default().bounds(date(4)).unwrap();
        let a = appointment(at(4, 9, 0), at(4, 10, 0));
        let b = appointment(at(4, 10, 0), at(4, 11, 0));

        let positioned = layout_day(&[a, b], &bounds);
        assert!(positioned.iter().all(|p| p.column == 0 && p.column_count == 1));
    }

    #[test]
    fn test_availability_stays_in_background() {
        let bounds = CalendarGrid::default().bounds(date(4)).unwrap();
        let window = entry(CalendarEntryKind::Availability, at(4, 8, 0), at(4, 12, 0));
        let session = appointment(at(4, 9, 0), at(4, 10, 0));

        let positioned = layout_day(&[session.clone(), window.clone()], &bounds);

        assert_eq!(positioned[0].entry.id, window.id);
        let session = find(&positioned, session.id);
        assert_eq!((session.column, session.column_count), (0, 1));
    }

    #[test]
    fn test_week_view_places_entries_on_their_day() {
        let grid = CalendarGrid::default();
        let tuesday = appointment(at(5, 9, 0), at(5, 10, 0));
        let sunday_event = entry(CalendarEntryKind::Event, at(10, 18, 0), at(10, 19, 0));

        let view = build_view(CalendarViewKind::Week, date(7), &[tuesday.clone(), sunday_event.clone()], &grid).unwrap();

        assert_eq!(view.start_date, date(4));
        assert_eq!(view.end_date, date(10));
        assert_eq!(view.days.len(), 7);
        assert_eq!(view.days[1].entries.len(), 1);
        assert_eq!(view.days[1].entries[0].entry.id, tuesday.id);
        assert_eq!(view.days[6].entries[0].entry.id, sunday_event.id);
        assert!(view.days[0].entries.is_empty());
    }

    #[test]
    fn test_appointment_entries_filter_cancelled() {
        let base = AppointmentView {
            id: Uuid::new_v4(),
            personal_id: Uuid::new_v4(),
            personal_name: "Coach Ana".to_string(),
            student_id: Uuid::new_v4(),
            student_name: "Bruno".to_string(),
            starts_at: at(4, 9, 0),
            ends_at: at(4, 10, 0),
            status: AppointmentStatus::Confirmed,
            notes: None,
            created_at: at(1, 0, 0),
            updated_at: at(1, 0, 0),
        };
        let cancelled = AppointmentView {
            id: Uuid::new_v4(),
            status: AppointmentStatus::Cancelled,
            ..base.clone()
        };
        let appointments = vec![base, cancelled];

        let visible = appointment_entries(&appointments, UserRole::Personal, false);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Session with Bruno");

        let all = appointment_entries(&appointments, UserRole::Student, true);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Session with Coach Ana");
    }

    #[test]
    fn test_recurring_availability_appears_every_week() {
        let slot = AvailabilitySlot {
            id: Uuid::new_v4(),
            personal_id: Uuid::new_v4(),
            starts_at: at(4, 9, 0),
            ends_at: at(4, 12, 0),
            is_recurring: true,
            created_at: at(1, 0, 0),
        };

        let dates = view_dates(CalendarViewKind::Week, date(20)).unwrap();
        let range = dates_range(&dates).unwrap();
        let entries = availability_entries(&[slot], &range);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].starts_at, at(18, 9, 0));
    }
}
