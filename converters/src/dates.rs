// converters/src/dates.rs
//! Date parsing boundaries.
//!
//! Graph properties keep dates as month/day/year display strings; the
//! grammars here turn external representations into that form or into a
//! comment-friendly partial value. Nothing is ever silently dropped; a
//! date that does not parse is kept verbatim by the caller.

use once_cell::sync::Lazy;
use regex::Regex;

use models::properties::LifeStatus;

// FHIR date: YYYY, YYYY-MM or YYYY-MM-DD, year 1001-9999.
static FHIR_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)(-(0[1-9]|1[0-2]|[1-9])(-(0[1-9]|[1-2][0-9]|3[0-1]|[1-9]))?)?",
    )
    .unwrap()
});

static DECEASED_STRING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(stillborn|miscarriage|aborted|unborn)( ([1-9][0-9]?) weeks)?").unwrap());

static YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1]))?)?$",
    )
    .unwrap()
});

static DMY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(((0?[1-9]|[1-2][0-9]|3[0-1])-)?(0?[1-9]|1[0-2])-)?([0-9]([0-9]([0-9][1-9]|[1-9]0)|[1-9]00)|[1-9]000)$",
    )
    .unwrap()
});

static YEARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^([0-9]{1,3})\s*(y|yrs|years)$").unwrap());
static MONTHS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^([0-9]{1,2})\s*(m|mths|months)$").unwrap());
static WEEKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^([0-9]{1,2})\s*(w|wks|weeks)$").unwrap());

/// Parses a FHIR date string into the month/day/year display form,
/// defaulting missing month and day to "01".
pub fn parse_fhir_date(input: &str) -> Option<String> {
    let caps = FHIR_DATE.captures(input)?;
    let year = caps.get(1)?.as_str();
    let month = caps.get(5).map_or("01", |m| m.as_str());
    let day = caps.get(7).map_or("01", |m| m.as_str());
    Some(format!("{}/{}/{}", month, day, year))
}

/// Parses a FHIR `deceasedString` into a life status plus gestation age.
/// Free text that is not understood means plainly deceased.
pub fn parse_deceased_string(input: &str) -> (LifeStatus, Option<String>) {
    match DECEASED_STRING.captures(input) {
        None => (LifeStatus::Deceased, None),
        Some(caps) => {
            let status = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(LifeStatus::Deceased);
            let weeks = caps.get(3).map(|m| m.as_str().to_string());
            (status, weeks)
        }
    }
}

/// Result of parsing a free-form questionnaire date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitDate {
    Full { year: u32, month: u32, day: u32 },
    Month { year: u32, month: u32 },
    Year { year: u32 },
    /// An age expression like "43y" or "18 m".
    Age(String),
}

/// Parses a questionnaire date: `YYYY[-MM[-DD]]`, `[[D-]M-]YYYY`, or an
/// age in years/months/weeks. `None` means free text the caller should
/// keep as a comment.
pub fn split_date(input: &str) -> Option<SplitDate> {
    if let Some(caps) = YMD.captures(input) {
        let year: u32 = caps.get(1)?.as_str().parse().ok()?;
        let month = caps
            .get(5)
            .filter(|m| m.as_str().len() == 2)
            .and_then(|m| m.as_str().parse::<u32>().ok());
        let day = caps
            .get(7)
            .filter(|m| m.as_str().len() == 2)
            .and_then(|m| m.as_str().parse::<u32>().ok());
        return Some(match (month, day) {
            (Some(month), Some(day)) => SplitDate::Full { year, month, day },
            (Some(month), None) => SplitDate::Month { year, month },
            _ => SplitDate::Year { year },
        });
    }
    if let Some(caps) = DMY.captures(input) {
        let year: u32 = caps.get(5)?.as_str().parse().ok()?;
        let month = caps.get(4).and_then(|m| m.as_str().parse::<u32>().ok());
        let day = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok());
        return Some(match (month, day) {
            (Some(month), Some(day)) => SplitDate::Full { year, month, day },
            (Some(month), None) => SplitDate::Month { year, month },
            _ => SplitDate::Year { year },
        });
    }
    for (re, unit) in [(&YEARS, "y"), (&MONTHS, "m"), (&WEEKS, "w")] {
        if let Some(caps) = re.captures(input) {
            return Some(SplitDate::Age(format!("{}{}", &caps[1], unit)));
        }
    }
    None
}

/// Splits a stored month/day/year display string back into numbers.
pub fn mdy_parts(mdy: &str) -> Option<(u32, u32, u32)> {
    let mut parts = mdy.split('/');
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year: u32 = parts.next()?.parse().ok()?;
    Some((year, month, day))
}

/// Renders a stored month/day/year string as a FHIR YYYY-MM-DD date.
pub fn mdy_to_fhir(mdy: &str) -> Option<String> {
    let (year, month, day) = mdy_parts(mdy)?;
    Some(format!("{}-{:02}-{:02}", year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_full_and_partial_fhir_dates() {
        assert_eq!(parse_fhir_date("1968-03-14"), Some("03/14/1968".to_string()));
        assert_eq!(parse_fhir_date("1968-03"), Some("03/01/1968".to_string()));
        assert_eq!(parse_fhir_date("1968"), Some("01/01/1968".to_string()));
        assert_eq!(parse_fhir_date("no date here"), None);
    }

    #[test]
    fn should_parse_deceased_strings() {
        assert_eq!(
            parse_deceased_string("stillborn 32 weeks"),
            (LifeStatus::Stillborn, Some("32".to_string()))
        );
        assert_eq!(parse_deceased_string("miscarriage"), (LifeStatus::Miscarriage, None));
        assert_eq!(parse_deceased_string("passed away"), (LifeStatus::Deceased, None));
    }

    #[test]
    fn should_split_questionnaire_dates() {
        assert_eq!(
            split_date("1967-11-13"),
            Some(SplitDate::Full { year: 1967, month: 11, day: 13 })
        );
        assert_eq!(split_date("1967-11"), Some(SplitDate::Month { year: 1967, month: 11 }));
        assert_eq!(split_date("1967"), Some(SplitDate::Year { year: 1967 }));
        assert_eq!(
            split_date("13-11-1967"),
            Some(SplitDate::Full { year: 1967, month: 11, day: 13 })
        );
        assert_eq!(split_date("43 yrs"), Some(SplitDate::Age("43y".to_string())));
        assert_eq!(split_date("18m"), Some(SplitDate::Age("18m".to_string())));
        assert_eq!(split_date("6 weeks"), Some(SplitDate::Age("6w".to_string())));
        assert_eq!(split_date("around 1970?"), None);
    }

    #[test]
    fn mdy_round_trips_to_fhir() {
        assert_eq!(mdy_to_fhir("3/14/1968"), Some("1968-03-14".to_string()));
        assert_eq!(mdy_parts("11/13/1967"), Some((1967, 11, 13)));
        assert_eq!(mdy_to_fhir("not a date"), None);
    }
}
