use chrono::{DateTime, Datelike, Local};

const MONTH_FORMAT: &str = "%Y-%m";

/// `2024-03` style stamp used for the monthly log file.
pub fn month_stamp(dt: &DateTime<Local>) -> String {
    dt.format(MONTH_FORMAT).to_string()
}

/// `2024-W09` style stamp of the ISO week containing `dt`.
///
/// The ISO week-year is used, so the last days of December can belong to
/// week 1 of the following year and vice versa.
pub fn week_stamp(dt: &DateTime<Local>) -> String {
    let week = dt.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}
