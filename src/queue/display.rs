use chrono_tz::Tz;

use crate::clock::to_local_date_string;
use crate::models::{DisplayView, RawDisplayRow};

/// Flattens the serving-ticket join for public screens. `None` in, `None` out,
/// so callers can show "nobody is being served" without a special case.
pub fn render(raw: Option<RawDisplayRow>, tz: Tz) -> Option<DisplayView> {
    let raw = raw?;
    Some(DisplayView {
        order_num: raw.order_num,
        patient_name: format!("{} {}", raw.first_name, raw.last_name),
        birth_date: raw.birth_date.map(|at| to_local_date_string(tz, at)),
        room_name: raw.room_name,
    })
}
