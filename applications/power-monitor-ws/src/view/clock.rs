use chrono::NaiveTime;

/// Wall-clock text for `#time-text`, e.g. `3:07:09 PM`.
pub fn clock_text(time: NaiveTime) -> String {
    time.format("%-I:%M:%S %p").to_string()
}
