use bdays::{calendars::WeekendsOnly, HolidayCalendar};
use chrono::{Duration, NaiveDate};

/// Weekdays between two inclusive bounds, in ascending order.
///
/// Market holidays are not consulted; a closed weekday is still yielded and shows up
/// downstream as a day without bars.
#[derive(Clone, Debug)]
pub struct TradingDays {
    next: NaiveDate,
    end: NaiveDate,
}

impl TradingDays {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        let mut next = start;
        while !WeekendsOnly.is_bday(next) {
            next = next + Duration::days(1);
        }
        Self { next, end }
    }
}

impl Iterator for TradingDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.next > self.end {
            return None;
        }
        let day = self.next;
        self.next = WeekendsOnly.advance_bdays(day, 1);
        Some(day)
    }
}
