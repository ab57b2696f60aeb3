use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, AppointmentView, AvailabilityOccurrence, AvailabilitySlot,
    BookAppointmentRequest, CreatePersonalEventRequest, CreateSlotRequest, EventRangeQuery, NotificationKind,
    PersonalEvent, SlotQuery, TimeWindow, UpdatePersonalEventRequest,
};
use crate::services::profile_service::{
    personal_by_id, personal_for_user, student_by_id, student_for_user, student_of_personal,
};
use crate::services::NotificationService;

const SLOT_COLUMNS: &str = "id, personal_id, starts_at, ends_at, is_recurring, created_at";

const APPOINTMENT_COLUMNS: &str =
    "id, personal_id, student_id, starts_at, ends_at, status, notes, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, personal_id, title, description, starts_at, ends_at, color, created_at, updated_at";

const APPOINTMENT_VIEW_SELECT: &str = "SELECT a.id, a.personal_id, p.display_name AS personal_name, \
     a.student_id, s.name AS student_name, a.starts_at, a.ends_at, a.status, a.notes, a.created_at, a.updated_at \
     FROM appointments a \
     JOIN personal_profiles p ON p.id = a.personal_id \
     JOIN students s ON s.id = a.student_id";

/// Longest single availability slot, appointment or event
pub const MAX_BLOCK_HOURS: i64 = 12;

/// Range used when a listing does not bound itself
const DEFAULT_RANGE_DAYS: i64 = 28;

/// Widest `[from, to)` a listing may ask for
pub const MAX_RANGE_DAYS: i64 = 92;

pub fn validate_window(window: &TimeWindow) -> AppResult<()> {
    if !window.is_valid() {
        return Err(AppError::bad_request("Start must be before end"));
    }
    if window.end - window.start > Duration::hours(MAX_BLOCK_HOURS) {
        return Err(AppError::bad_request(format!(
            "A single block cannot exceed {MAX_BLOCK_HOURS} hours"
        )));
    }
    Ok(())
}

/// Resolve an optional `[from, to)` pair, defaulting to the next four weeks
pub fn resolve_range(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> AppResult<TimeWindow> {
    let start = from.unwrap_or_else(Utc::now);
    let end = match to {
        Some(end) => end,
        None => start
            .checked_add_signed(Duration::days(DEFAULT_RANGE_DAYS))
            .ok_or_else(|| AppError::bad_request("`from` is out of range"))?,
    };
    let range = TimeWindow::new(start, end);

    if !range.is_valid() {
        return Err(AppError::bad_request("`from` must be before `to`"));
    }
    if range.end - range.start > Duration::days(MAX_RANGE_DAYS) {
        return Err(AppError::bad_request(format!(
            "A listing range cannot exceed {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(range)
}

/// Concrete availability inside `range`, recurring slots expanded, sorted by start
pub fn expand_availability(slots: &[AvailabilitySlot], range: &TimeWindow) -> Vec<AvailabilityOccurrence> {
    let mut occurrences: Vec<AvailabilityOccurrence> = slots
        .iter()
        .flat_map(|slot| {
            slot.occurrences_within(range)
                .into_iter()
                .map(move |window| AvailabilityOccurrence {
                    slot_id: slot.id,
                    personal_id: slot.personal_id,
                    starts_at: window.start,
                    ends_at: window.end,
                    is_recurring: slot.is_recurring,
                })
        })
        .collect();

    occurrences.sort_by_key(|o| (o.starts_at, o.ends_at));
    occurrences
}

/// Whether a booking lies entirely inside one availability occurrence
pub fn fits_availability(slots: &[AvailabilitySlot], window: &TimeWindow) -> bool {
    slots
        .iter()
        .flat_map(|slot| slot.occurrences_within(window))
        .any(|occurrence| occurrence.contains(window))
}

/// First time-blocking appointment overlapping `window`
pub fn find_conflict<'a>(appointments: &'a [Appointment], window: &TimeWindow) -> Option<&'a Appointment> {
    appointments
        .iter()
        .find(|a| a.status.blocks_time() && a.window().overlaps(window))
}

/// Who may move an appointment into `next`
pub fn can_actor_set_status(role: UserRole, next: AppointmentStatus) -> bool {
    match next {
        AppointmentStatus::Confirmed | AppointmentStatus::Completed => role == UserRole::Personal,
        AppointmentStatus::Cancelled => matches!(role, UserRole::Personal | UserRole::Student),
        AppointmentStatus::Pending => false,
    }
}

#[derive(Clone)]
pub struct SchedulingService {
    db: PgPool,
    notifications: NotificationService,
}

impl SchedulingService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    // Availability

    #[tracing::instrument(skip(self))]
    pub async fn create_slot(&self, user_id: Uuid, request: CreateSlotRequest) -> AppResult<AvailabilitySlot> {
        validate_window(&TimeWindow::new(request.starts_at, request.ends_at))?;
        let personal = personal_for_user(&self.db, user_id).await?;

        let slot = sqlx::query_as::<_, AvailabilitySlot>(&format!(
            "INSERT INTO availability_slots (id, personal_id, starts_at, ends_at, is_recurring, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.is_recurring)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(slot)
    }

    /// Availability of `query.personal_id`, or of the caller when omitted
    pub async fn list_availability(
        &self,
        session: &UserSession,
        query: &SlotQuery,
    ) -> AppResult<Vec<AvailabilityOccurrence>> {
        match query.personal_id {
            Some(_) => self.public_availability(query).await,
            None if session.is_personal() => {
                let personal = personal_for_user(&self.db, session.user_id).await?;
                let range = resolve_range(query.from, query.to)?;
                let slots = self.slots_for_personal(personal.id).await?;
                Ok(expand_availability(&slots, &range))
            }
            None => Err(AppError::bad_request("personal_id is required")),
        }
    }

    /// Availability of a given personal, visible without signing in
    pub async fn public_availability(&self, query: &SlotQuery) -> AppResult<Vec<AvailabilityOccurrence>> {
        let personal_id = query
            .personal_id
            .ok_or_else(|| AppError::bad_request("personal_id is required"))?;
        let range = resolve_range(query.from, query.to)?;

        let personal = personal_by_id(&self.db, personal_id).await?;
        let slots = self.slots_for_personal(personal.id).await?;
        Ok(expand_availability(&slots, &range))
    }

    pub async fn delete_slot(&self, user_id: Uuid, slot_id: Uuid) -> AppResult<()> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let result = sqlx::query("DELETE FROM availability_slots WHERE id = $1 AND personal_id = $2")
            .bind(slot_id)
            .bind(personal.id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Availability slot"));
        }
        Ok(())
    }

    pub(crate) async fn slots_for_personal(&self, personal_id: Uuid) -> AppResult<Vec<AvailabilitySlot>> {
        let slots = sqlx::query_as::<_, AvailabilitySlot>(&format!(
            "SELECT {SLOT_COLUMNS} FROM availability_slots WHERE personal_id = $1 ORDER BY starts_at ASC"
        ))
        .bind(personal_id)
        .fetch_all(&self.db)
        .await?;

        Ok(slots)
    }

    // Appointments

    /// Students book inside their personal's availability; personals schedule
    /// their own students at any time. Both are rejected on double-booking.
    #[tracing::instrument(skip(self, request), fields(user_id = %session.user_id))]
    pub async fn book_appointment(
        &self,
        session: &UserSession,
        request: BookAppointmentRequest,
    ) -> AppResult<Appointment> {
        request.validate()?;
        let window = TimeWindow::new(request.starts_at, request.ends_at);
        validate_window(&window)?;

        let (personal, student) = match session.role {
            UserRole::Student => {
                let personal_id = request
                    .personal_id
                    .ok_or_else(|| AppError::bad_request("personal_id is required"))?;
                let student = student_for_user(&self.db, session.user_id).await?;
                let personal = personal_by_id(&self.db, personal_id).await?;

                let slots = self.slots_for_personal(personal.id).await?;
                if !fits_availability(&slots, &window) {
                    return Err(AppError::conflict("Requested time is outside the personal's availability"));
                }
                (personal, student)
            }
            UserRole::Personal => {
                let student_id = request
                    .student_id
                    .ok_or_else(|| AppError::bad_request("student_id is required"))?;
                let personal = personal_for_user(&self.db, session.user_id).await?;
                let student = student_of_personal(&self.db, personal.id, student_id).await?;
                (personal, student)
            }
            UserRole::Admin => return Err(AppError::forbidden("Admins cannot book appointments")),
        };

        let mut tx = self.db.begin().await?;

        // Serialize bookings per personal so the overlap check stays valid
        sqlx::query("SELECT id FROM personal_profiles WHERE id = $1 FOR UPDATE")
            .bind(personal.id)
            .execute(&mut *tx)
            .await?;

        let overlapping = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE personal_id = $1 AND status <> 'cancelled'
               AND starts_at < $3 AND ends_at > $2"
        ))
        .bind(personal.id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&mut *tx)
        .await?;

        if let Some(conflict) = find_conflict(&overlapping, &window) {
            tracing::info!(conflict_id = %conflict.id, "rejected double booking");
            return Err(AppError::conflict("The personal already has an appointment at that time"));
        }

        // A personal scheduling directly has already agreed to the time
        let status = if session.role == UserRole::Personal {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Pending
        };

        let now = Utc::now();
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "INSERT INTO appointments (id, personal_id, student_id, starts_at, ends_at, status, notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(student.id)
        .bind(window.start)
        .bind(window.end)
        .bind(status)
        .bind(request.notes)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let (recipient, message) = match session.role {
            UserRole::Personal => (
                student.user_id,
                format!("{} scheduled a session on {}", personal.display_name, appointment.starts_at.format("%Y-%m-%d %H:%M")),
            ),
            _ => (
                personal.user_id,
                format!("{} requested a session on {}", student.name, appointment.starts_at.format("%Y-%m-%d %H:%M")),
            ),
        };
        self.notifications
            .notify(
                recipient,
                NotificationKind::AppointmentRequested,
                "New appointment",
                message,
                Some(serde_json::json!({ "appointment_id": appointment.id })),
            )
            .await;

        Ok(appointment)
    }

    pub async fn list_appointments(
        &self,
        session: &UserSession,
        query: &AppointmentQuery,
    ) -> AppResult<Vec<AppointmentView>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(APPOINTMENT_VIEW_SELECT);

        match session.role {
            UserRole::Personal => {
                let personal = personal_for_user(&self.db, session.user_id).await?;
                builder.push(" WHERE a.personal_id = ").push_bind(personal.id);
            }
            UserRole::Student => {
                let student = student_for_user(&self.db, session.user_id).await?;
                builder.push(" WHERE a.student_id = ").push_bind(student.id);
            }
            UserRole::Admin => {
                builder.push(" WHERE 1 = 1");
            }
        }

        if let Some(from) = query.from {
            builder.push(" AND a.ends_at > ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND a.starts_at < ").push_bind(to);
        }
        if let Some(status) = query.status {
            builder.push(" AND a.status = ").push_bind(status);
        }
        builder.push(" ORDER BY a.starts_at ASC");

        let appointments = builder
            .build_query_as::<AppointmentView>()
            .fetch_all(&self.db)
            .await?;

        Ok(appointments)
    }

    #[tracing::instrument(skip(self), fields(user_id = %session.user_id))]
    pub async fn update_appointment_status(
        &self,
        session: &UserSession,
        appointment_id: Uuid,
        next: AppointmentStatus,
    ) -> AppResult<Appointment> {
        let appointment = self.appointment_for_participant(session, appointment_id).await?;

        if !appointment.status.can_transition_to(next) {
            return Err(AppError::invalid_transition(appointment.status, next));
        }
        if !can_actor_set_status(session.role, next) {
            return Err(AppError::forbidden(format!("You cannot mark this appointment as {next}")));
        }

        let updated = sqlx::query_as::<_, Appointment>(&format!(
            "UPDATE appointments SET status = $3, updated_at = $4
             WHERE id = $1 AND status = $2
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(appointment.id)
        .bind(appointment.status)
        .bind(next)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::conflict("Appointment changed concurrently"))?;

        tracing::info!(
            appointment_id = %updated.id,
            from = %appointment.status,
            to = %next,
            "appointment status changed"
        );

        let recipient = if session.role == UserRole::Student {
            personal_by_id(&self.db, updated.personal_id).await?.user_id
        } else {
            student_by_id(&self.db, updated.student_id).await?.user_id
        };
        self.notifications
            .notify(
                recipient,
                NotificationKind::AppointmentStatusChanged,
                "Appointment updated",
                format!(
                    "Appointment on {} is now {}",
                    updated.starts_at.format("%Y-%m-%d %H:%M"),
                    next
                ),
                Some(serde_json::json!({
                    "appointment_id": updated.id,
                    "status": next,
                })),
            )
            .await;

        Ok(updated)
    }

    async fn appointment_for_participant(&self, session: &UserSession, appointment_id: Uuid) -> AppResult<Appointment> {
        let appointment = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(appointment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Appointment"))?;

        let is_participant = match session.role {
            UserRole::Personal => personal_for_user(&self.db, session.user_id).await?.id == appointment.personal_id,
            UserRole::Student => student_for_user(&self.db, session.user_id).await?.id == appointment.student_id,
            UserRole::Admin => false,
        };

        if !is_participant {
            return Err(AppError::NotFound("Appointment"));
        }
        Ok(appointment)
    }

    /// Appointments of a personal or a student overlapping `range`
    pub(crate) async fn appointments_in_range(
        &self,
        personal_id: Option<Uuid>,
        student_id: Option<Uuid>,
        range: &TimeWindow,
    ) -> AppResult<Vec<AppointmentView>> {
        let appointments = sqlx::query_as::<_, AppointmentView>(&format!(
            "{APPOINTMENT_VIEW_SELECT}
             WHERE ($1::uuid IS NULL OR a.personal_id = $1)
               AND ($2::uuid IS NULL OR a.student_id = $2)
               AND a.starts_at < $4 AND a.ends_at > $3
             ORDER BY a.starts_at ASC"
        ))
        .bind(personal_id)
        .bind(student_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(appointments)
    }

    // Personal events

    pub async fn create_event(&self, user_id: Uuid, request: CreatePersonalEventRequest) -> AppResult<PersonalEvent> {
        request.validate()?;
        validate_window(&TimeWindow::new(request.starts_at, request.ends_at))?;
        let personal = personal_for_user(&self.db, user_id).await?;

        let now = Utc::now();
        let event = sqlx::query_as::<_, PersonalEvent>(&format!(
            "INSERT INTO personal_events (id, personal_id, title, description, starts_at, ends_at, color, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.color)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(event)
    }

    pub async fn list_events(&self, user_id: Uuid, query: &EventRangeQuery) -> AppResult<Vec<PersonalEvent>> {
        let personal = personal_for_user(&self.db, user_id).await?;
        let range = resolve_range(query.from, query.to)?;
        self.events_in_range(personal.id, &range).await
    }

    pub async fn update_event(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        request: UpdatePersonalEventRequest,
    ) -> AppResult<PersonalEvent> {
        request.validate()?;
        let personal = personal_for_user(&self.db, user_id).await?;
        let current = self.owned_event(personal.id, event_id).await?;

        let window = TimeWindow::new(
            request.starts_at.unwrap_or(current.starts_at),
            request.ends_at.unwrap_or(current.ends_at),
        );
        validate_window(&window)?;

        let event = sqlx::query_as::<_, PersonalEvent>(&format!(
            "UPDATE personal_events
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 starts_at = $4,
                 ends_at = $5,
                 color = COALESCE($6, color),
                 updated_at = $7
             WHERE id = $1
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(current.id)
        .bind(request.title)
        .bind(request.description)
        .bind(window.start)
        .bind(window.end)
        .bind(request.color)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(event)
    }

    pub async fn delete_event(&self, user_id: Uuid, event_id: Uuid) -> AppResult<()> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let result = sqlx::query("DELETE FROM personal_events WHERE id = $1 AND personal_id = $2")
            .bind(event_id)
            .bind(personal.id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Event"));
        }
        Ok(())
    }

    async fn owned_event(&self, personal_id: Uuid, event_id: Uuid) -> AppResult<PersonalEvent> {
        sqlx::query_as::<_, PersonalEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM personal_events WHERE id = $1 AND personal_id = $2"
        ))
        .bind(event_id)
        .bind(personal_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Event"))
    }

    pub(crate) async fn events_in_range(&self, personal_id: Uuid, range: &TimeWindow) -> AppResult<Vec<PersonalEvent>> {
        let events = sqlx::query_as::<_, PersonalEvent>(&format!(
            "SELECT {EVENT_COLUMNS} FROM personal_events
             WHERE personal_id = $1 AND starts_at < $3 AND ends_at > $2
             ORDER BY starts_at ASC"
        ))
        .bind(personal_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(events)
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

    fn slot(personal_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>, is_recurring: bool) -> AvailabilitySlot {
        AvailabilitySlot {
            id: Uuid::new_v4(),
            personal_id,
            starts_at: start,
            ends_at: end,
            is_recurring,
            created_at: start,
        }
    }

    fn appointment(start: DateTime<Utc>, end: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            personal_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            starts_at: start,
            ends_at: end,
            status,
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window(&TimeWindow::new(at(4, 9, 0), at(4, 10, 0))).is_ok());
        assert_matches!(
            validate_window(&TimeWindow::new(at(4, 10, 0), at(4, 10, 0))),
            Err(AppError::BadRequest(_))
        );
        assert_matches!(
            validate_window(&TimeWindow::new(at(4, 6, 0), at(4, 19, 0))),
            Err(AppError::BadRequest(_))
        );
    }

    #[test]
    fn test_resolve_range_rejects_inverted_bounds() {
        let range = resolve_range(Some(at(4, 0, 0)), None).unwrap();
        assert_eq!(range.end, at(4, 0, 0) + Duration::days(DEFAULT_RANGE_DAYS));

        assert!(resolve_range(Some(at(5, 0, 0)), Some(at(4, 0, 0))).is_err());
    }

    #[test]
    fn test_resolve_range_caps_the_width() {
        let start = at(4, 0, 0);

        let widest = resolve_range(Some(start), Some(start + Duration::days(MAX_RANGE_DAYS))).unwrap();
        assert_eq!(widest.end - widest.start, Duration::days(MAX_RANGE_DAYS));

        let far_future = Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap();
        assert_matches!(resolve_range(Some(start), Some(far_future)), Err(AppError::BadRequest(_)));
        assert_matches!(
            resolve_range(Some(DateTime::<Utc>::MAX_UTC), None),
            Err(AppError::BadRequest(_))
        );
    }

    #[test]
    fn test_expand_availability_sorts_occurrences() {
        let personal_id = Uuid::new_v4();
        let slots = vec![
            slot(personal_id, at(6, 14, 0), at(6, 16, 0), false),
            slot(personal_id, at(4, 9, 0), at(4, 12, 0), true),
        ];

        let range = TimeWindow::new(at(4, 0, 0), at(12, 0, 0));
        let occurrences = expand_availability(&slots, &range);
        let starts: Vec<_> = occurrences.iter().map(|o| o.starts_at).collect();

        assert_eq!(starts, vec![at(4, 9, 0), at(6, 14, 0), at(11, 9, 0)]);
        assert!(occurrences[2].is_recurring);
    }

    #[test]
    fn test_booking_must_fit_inside_one_occurrence() {
        let personal_id = Uuid::new_v4();
        let slots = vec![slot(personal_id, at(4, 9, 0), at(4, 12, 0), true)];

        assert!(fits_availability(&slots, &TimeWindow::new(at(4, 9, 0), at(4, 10, 0))));
        assert!(fits_availability(&slots, &TimeWindow::new(at(18, 11, 0), at(18, 12, 0))));
        assert!(!fits_availability(&slots, &TimeWindow::new(at(4, 11, 30), at(4, 12, 30))));
        assert!(!fits_availability(&slots, &TimeWindow::new(at(5, 9, 0), at(5, 10, 0))));
    }

    #[test]
    fn test_find_conflict_ignores_cancelled_and_adjacent() {
        let existing = vec![
            appointment(at(4, 9, 0), at(4, 10, 0), AppointmentStatus::Confirmed),
            appointment(at(4, 10, 0), at(4, 11, 0), AppointmentStatus::Cancelled),
        ];

        assert!(find_conflict(&existing, &TimeWindow::new(at(4, 10, 0), at(4, 11, 0))).is_none());
        assert!(find_conflict(&existing, &TimeWindow::new(at(4, 8, 0), at(4, 9, 0))).is_none());

        let conflict = find_conflict(&existing, &TimeWindow::new(at(4, 9, 30), at(4, 10, 30)));
        assert_eq!(conflict.map(|a| a.id), Some(existing[0].id));
    }

    #[test]
    fn test_actor_permissions() {
        assert!(can_actor_set_status(UserRole::Personal, AppointmentStatus::Confirmed));
        assert!(can_actor_set_status(UserRole::Personal, AppointmentStatus::Completed));
        assert!(can_actor_set_status(UserRole::Student, AppointmentStatus::Cancelled));

        assert!(!can_actor_set_status(UserRole::Student, AppointmentStatus::Confirmed));
        assert!(!can_actor_set_status(UserRole::Student, AppointmentStatus::Completed));
        assert!(!can_actor_set_status(UserRole::Admin, AppointmentStatus::Cancelled));
        assert!(!can_actor_set_status(UserRole::Personal, AppointmentStatus::Pending));
    }
}
