use crate::config::HOURS_PER_DAY;
use chrono::FixedOffset;

pub type HourlyAverages = [f64; HOURS_PER_DAY];

/// Rotate left by `shift` hours: `out[i] == values[(i + shift) mod 24]`.
pub fn rotate_hours(values: &HourlyAverages, shift: i32) -> HourlyAverages {
    let mut out = *values;
    out.rotate_left(shift.rem_euclid(HOURS_PER_DAY as i32) as usize);
    out
}

/// Whole hours local time is ahead of UTC. Half-hour zones truncate toward zero.
pub fn utc_offset_hours(offset: &FixedOffset) -> i32 {
    offset.local_minus_utc() / 3600
}

/// Re-index averages recorded per UTC hour so that index `h` is local hour `h`.
pub fn to_local_hours(utc_values: &HourlyAverages, utc_offset_hours: i32) -> HourlyAverages {
    rotate_hours(utc_values, -utc_offset_hours)
}
