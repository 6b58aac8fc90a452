use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{CatalogError, FieldError};

/// Longest range (in calendar dates) an experience may declare.
pub const MAX_RANGE_DATES: i64 = 366;

/// Number of months a monthly rule is projected across.
pub const MONTHLY_HORIZON: u32 = 12;

/// How a monthly rule treats a day that does not exist in a month
/// (day 31 in April, day 30 in February).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonthOverflow {
    /// The month contributes no date.
    #[default]
    Skip,
    /// Surplus days spill into the following month (April 31 becomes May 1).
    RollForward,
    /// The last day of the month is used instead.
    Clamp,
}

/// Declarative rule for the dates an event or experience is available on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DateConfiguration {
    /// Explicit list of dates.
    Selected { dates: Vec<NaiveDate> },
    /// Every date from `start` to `end`, both inclusive.
    Range { start: NaiveDate, end: NaiveDate },
    /// The same day of month across the next twelve months, starting with the current one.
    Monthly {
        day: u32,
        #[serde(default)]
        overflow: MonthOverflow,
    },
}

impl DateConfiguration {
    /// Expand the rule into an ordered, duplicate-free set of dates.
    ///
    /// `today` anchors monthly rules; selected and range rules ignore it.
    pub fn expand(&self, today: NaiveDate) -> BTreeSet<NaiveDate> {
        match self {
            DateConfiguration::Selected { dates } => dates.iter().copied().collect(),
            DateConfiguration::Range { start, end } => {
                if end < start {
                    return BTreeSet::new();
                }
                start.iter_days().take_while(|d| d <= end).collect()
            }
            DateConfiguration::Monthly { day, overflow } => expand_monthly(*day, *overflow, today),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DateConfiguration::Selected { .. } => "selected",
            DateConfiguration::Range { .. } => "range",
            DateConfiguration::Monthly { .. } => "monthly",
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut errors = Vec::new();

        match self {
            DateConfiguration::Selected { dates } => {
                if dates.is_empty() {
                    errors.push(FieldError::new(
                        "date_configuration.dates",
                        "at least one date is required",
                    ));
                }
            }
            DateConfiguration::Range { start, end } => {
                if end < start {
                    errors.push(FieldError::new(
                        "date_configuration.end",
                        "end date must not be before start date",
                    ));
                } else if (*end - *start).num_days() + 1 > MAX_RANGE_DATES {
                    errors.push(FieldError::new(
                        "date_configuration.end",
                        format!("range may span at most {} dates", MAX_RANGE_DATES),
                    ));
                }
            }
            DateConfiguration::Monthly { day, .. } => {
                if !(1..=31).contains(day) {
                    errors.push(FieldError::new(
                        "date_configuration.day",
                        "day of month must be between 1 and 31",
                    ));
                }
            }
        }

        CatalogError::from_fields(errors)
    }
}

fn expand_monthly(day: u32, overflow: MonthOverflow, today: NaiveDate) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    if day == 0 {
        return dates;
    }

    let Some(first_of_current) = today.with_day(1) else {
        return dates;
    };

    for offset in 0..MONTHLY_HORIZON {
        let Some(month_start) = first_of_current.checked_add_months(Months::new(offset)) else {
            break;
        };

        if let Some(date) = NaiveDate::from_ymd_opt(month_start.year(), month_start.month(), day) {
            dates.insert(date);
            continue;
        }

        let resolved = match overflow {
            MonthOverflow::Skip => None,
            MonthOverflow::RollForward => month_start.checked_add_days(Days::new(u64::from(day - 1))),
            MonthOverflow::Clamp => last_day_of_month(month_start),
        };

        if let Some(date) = resolved {
            dates.insert(date);
        }
    }

    dates
}

pub(crate) fn last_day_of_month(month_start: NaiveDate) -> Option<NaiveDate> {
    month_start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_is_inclusive_without_gaps() {
        let config = DateConfiguration::Range {
            start: date(2025, 2, 26),
            end: date(2025, 3, 3),
        };
        let dates: Vec<_> = config.expand(date(2025, 1, 1)).into_iter().collect();

        assert_eq!(dates.len(), 6);
        assert_eq!(dates.first(), Some(&date(2025, 2, 26)));
        assert_eq!(dates.last(), Some(&date(2025, 3, 3)));
        for pair in dates.windows(2) {
            assert_eq!(pair[0].succ_opt(), Some(pair[1]));
        }
    }

    #[test]
    fn test_range_single_day() {
        let config = DateConfiguration::Range {
            start: date(2025, 6, 2),
            end: date(2025, 6, 2),
        };
        assert_eq!(config.expand(date(2025, 1, 1)).len(), 1);
    }

    #[test]
    fn test_range_end_before_start_is_empty() {
        let config = DateConfiguration::Range {
            start: date(2025, 6, 3),
            end: date(2025, 6, 2),
        };
        assert!(config.expand(date(2025, 1, 1)).is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_selected_dedups_and_sorts() {
        let config = DateConfiguration::Selected {
            dates: vec![date(2025, 6, 2), date(2025, 6, 1), date(2025, 6, 2)],
        };
        let dates: Vec<_> = config.expand(date(2025, 1, 1)).into_iter().collect();
        assert_eq!(dates, vec![date(2025, 6, 1), date(2025, 6, 2)]);
    }

    #[test]
    fn test_monthly_produces_twelve_dates_from_current_month() {
        let config = DateConfiguration::Monthly {
            day: 15,
            overflow: MonthOverflow::Skip,
        };
        let today = date(2025, 11, 20);
        let dates: Vec<_> = config.expand(today).into_iter().collect();

        assert_eq!(dates.len(), 12);
        // Current month is included even though the 15th has passed.
        assert_eq!(dates[0], date(2025, 11, 15));
        assert_eq!(dates[1], date(2025, 12, 15));
        assert_eq!(dates[2], date(2026, 1, 15));
        assert_eq!(dates[11], date(2026, 10, 15));
        assert!(dates.iter().all(|d| d.day() == 15));
    }

    #[test]
    fn test_monthly_day_31_skip() {
        let config = DateConfiguration::Monthly {
            day: 31,
            overflow: MonthOverflow::Skip,
        };
        let dates = config.expand(date(2025, 1, 10));
        // Jan, Mar, May, Jul, Aug, Oct, Dec
        assert_eq!(dates.len(), 7);
        assert!(dates.iter().all(|d| d.day() == 31));
    }

    #[test]
    fn test_monthly_day_31_roll_forward() {
        let config = DateConfiguration::Monthly {
            day: 31,
            overflow: MonthOverflow::RollForward,
        };
        let dates = config.expand(date(2025, 1, 10));

        assert_eq!(dates.len(), 12);
        // February 31st 2025 lands on March 3rd.
        assert!(dates.contains(&date(2025, 3, 3)));
        // April 31st lands on May 1st.
        assert!(dates.contains(&date(2025, 5, 1)));
        assert!(dates.contains(&date(2025, 3, 31)));
    }

    #[test]
    fn test_monthly_day_30_clamp_in_leap_february() {
        let config = DateConfiguration::Monthly {
            day: 30,
            overflow: MonthOverflow::Clamp,
        };
        let dates = config.expand(date(2028, 2, 1));
        assert_eq!(dates.len(), 12);
        assert!(dates.contains(&date(2028, 2, 29)));
    }

    #[test]
    fn test_validate_rejects_bad_day_and_empty_list() {
        let bad_day = DateConfiguration::Monthly {
            day: 0,
            overflow: MonthOverflow::Skip,
        };
        let err = bad_day.validate().unwrap_err();
        assert_eq!(err.fields()[0].field, "date_configuration.day");

        let empty = DateConfiguration::Selected { dates: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_range() {
        let config = DateConfiguration::Range {
            start: date(2025, 1, 1),
            end: date(2026, 1, 2),
        };
        assert!(config.validate().is_err());

        let max = DateConfiguration::Range {
            start: date(2024, 1, 1),
            end: date(2024, 12, 31),
        };
        assert!(max.validate().is_ok());
    }

    #[test]
    fn test_deserialize_tagged_configuration() {
        let json = r#"{ "type": "monthly", "day": 5 }"#;
        let config: DateConfiguration = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(
            config,
            DateConfiguration::Monthly {
                day: 5,
                overflow: MonthOverflow::Skip
            }
        );

        let json = r#"{ "type": "range", "start": "2025-06-02", "end": "2025-06-03" }"#;
        let config: DateConfiguration = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(config.kind(), "range");
    }
}
