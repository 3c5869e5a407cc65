use chrono::{DateTime, NaiveDate, Utc};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Deadline as shown in chat messages, `dd.mm.yyyy`.
pub fn format_deadline(deadline: Option<NaiveDate>) -> String {
    deadline
        .map(|date| date.format("%d.%m.%Y").to_string())
        .unwrap_or_default()
}
