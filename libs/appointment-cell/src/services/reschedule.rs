use chrono::{NaiveDate, NaiveTime};

use crate::models::AppointmentError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where a reschedule request asks to move an appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleTarget {
    /// Combined `YYYY-MM-DDTHH:MM[...]` value; anything after the minutes is ignored.
    Slot { date: NaiveDate, time: NaiveTime },
    /// Value without a `T` separator. Kept as its own path: the literal is
    /// used as both the date and the time, which in practice matches no slot.
    BareValue(String),
}

impl RescheduleTarget {
    pub fn parse(value: &str) -> Result<Self, AppointmentError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppointmentError::ValidationError("new_date_time is required".to_string()));
        }

        let Some((date_part, time_part)) = value.split_once('T') else {
            return Ok(RescheduleTarget::BareValue(value.to_string()));
        };

        let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|_| {
            AppointmentError::ValidationError(format!("Invalid date in '{}'", value))
        })?;

        let minutes: String = time_part.chars().take(5).collect();
        let time = NaiveTime::parse_from_str(&minutes, "%H:%M").map_err(|_| {
            AppointmentError::ValidationError(format!("Invalid time in '{}'", value))
        })?;

        Ok(RescheduleTarget::Slot { date, time })
    }

    /// The `(date, time)` this target points at, if it can name a slot at all.
    pub fn slot(&self) -> Option<(NaiveDate, NaiveTime)> {
        match self {
            RescheduleTarget::Slot { date, time } => Some((*date, *time)),
            RescheduleTarget::BareValue(raw) => {
                let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()?;
                let time = shared_models::time::parse_time(raw)?;
                Some((date, time))
            }
        }
    }
}
