use cadence_rfc::rfc::ical::expand::{Horizon, RecurrenceExpander, TimeZoneResolver};
use cadence_rfc::rfc::ical::parse::{EventRecord, TimeProperty, ingest};
use chrono::{TimeZone, Utc};
use rrule::RRuleSet;

pub struct RRuleCase {
    pub name: &'static str,
    pub rruleset: &'static str,
    pub limit: u16,
}

pub fn rrule_cases() -> Vec<RRuleCase> {
    vec![
        RRuleCase {
            name: "daily_count",
            rruleset: "DTSTART:20260105T090000Z\nRRULE:FREQ=DAILY;COUNT=10",
            limit: 100,
        },
        RRuleCase {
            name: "weekly_byday",
            rruleset: "DTSTART:20260105T090000Z\nRRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=9",
            limit: 100,
        },
        RRuleCase {
            name: "monthly_last_day",
            rruleset: "DTSTART:20260131T090000Z\nRRULE:FREQ=MONTHLY;BYMONTHDAY=-1;COUNT=6",
            limit: 100,
        },
        RRuleCase {
            name: "monthly_last_friday",
            rruleset: "DTSTART:20260130T090000Z\nRRULE:FREQ=MONTHLY;BYDAY=-1FR;COUNT=6",
            limit: 100,
        },
        RRuleCase {
            name: "monthly_first_friday",
            rruleset: "DTSTART:19970905T090000Z\nRRULE:FREQ=MONTHLY;BYDAY=1FR;COUNT=4",
            limit: 100,
        },
        RRuleCase {
            name: "leap_day",
            rruleset: "DTSTART:20280229T120000Z\nRRULE:FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=29;COUNT=2",
            limit: 100,
        },
        RRuleCase {
            name: "last_workday_of_month",
            rruleset: "DTSTART:20260130T170000Z\nRRULE:FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1;COUNT=6",
            limit: 100,
        },
        RRuleCase {
            name: "yearly_first_listed_month",
            rruleset: "DTSTART:20260115T090000Z\nRRULE:FREQ=YEARLY;BYMONTH=1,6;BYSETPOS=1;COUNT=3",
            limit: 100,
        },
        RRuleCase {
            name: "biweekly_tue_thu",
            rruleset: "DTSTART:20260106T100000Z\nRRULE:FREQ=WEEKLY;INTERVAL=2;BYDAY=TU,TH;COUNT=8",
            limit: 100,
        },
        RRuleCase {
            name: "monthday_31",
            rruleset: "DTSTART:20260131T090000Z\nRRULE:FREQ=MONTHLY;BYMONTHDAY=31;COUNT=5",
            limit: 100,
        },
        RRuleCase {
            name: "wkst_monday",
            rruleset: "DTSTART:19970805T090000Z\nRRULE:FREQ=WEEKLY;INTERVAL=2;COUNT=4;BYDAY=TU,SU;WKST=MO",
            limit: 100,
        },
        RRuleCase {
            name: "wkst_sunday",
            rruleset: "DTSTART:19970805T090000Z\nRRULE:FREQ=WEEKLY;INTERVAL=2;COUNT=4;BYDAY=TU,SU;WKST=SU",
            limit: 100,
        },
        RRuleCase {
            name: "yearly_20th_monday",
            rruleset: "DTSTART:19970519T090000Z\nRRULE:FREQ=YEARLY;BYDAY=20MO;COUNT=3",
            limit: 100,
        },
        RRuleCase {
            name: "weekly_until",
            rruleset: "DTSTART:20260101T090000Z\nRRULE:FREQ=WEEKLY;UNTIL=20260301T090000Z",
            limit: 100,
        },
        RRuleCase {
            name: "daily_across_dst",
            rruleset: "DTSTART;TZID=America/New_York:20260306T090000\nRRULE:FREQ=DAILY;COUNT=5",
            limit: 100,
        },
        RRuleCase {
            name: "rfc_every_day_in_jan",
            rruleset: "DTSTART;TZID=America/New_York:19980101T090000\nRRULE:FREQ=YEARLY;UNTIL=20000131T140000Z;BYMONTH=1;BYDAY=SU,MO,TU,WE,TH,FR,SA",
            limit: 200,
        },
    ]
}

/// Splits `DTSTART[;TZID=..]:value\nRRULE:rule` into an event record.
fn record(case: &RRuleCase) -> EventRecord {
    let mut record = EventRecord {
        uid: case.name.to_string(),
        ..EventRecord::default()
    };
    for line in case.rruleset.lines() {
        let (name, value) = line
            .split_once(':')
            .unwrap_or_else(|| panic!("Bad line in {}: {line}", case.name));
        if let Some(params) = name.strip_prefix("DTSTART") {
            let tzid = params.strip_prefix(";TZID=").map(str::to_string);
            record.dtstart = Some(TimeProperty {
                value: value.to_string(),
                tzid,
            });
        } else if name == "RRULE" {
            record.rrule = Some(value.to_string());
        } else {
            panic!("Unexpected line in {}: {line}", case.name);
        }
    }
    record
}

pub fn assert_case(case: &RRuleCase) {
    let rrule_set: RRuleSet = case
        .rruleset
        .parse()
        .unwrap_or_else(|err| panic!("Failed to parse {}: {}", case.name, err));
    let oracle: Vec<i64> = rrule_set
        .all(case.limit)
        .dates
        .iter()
        .map(chrono::DateTime::timestamp)
        .collect();

    let mut resolver = TimeZoneResolver::new();
    let report = ingest([record(case)], &mut resolver);
    assert!(report.warnings.is_empty(), "Case {}: {:?}", case.name, report.warnings);
    let event = &report.events[0];

    let horizon = Horizon::from_now(Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap())
        .with_range_start(None)
        .with_range_end(Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap())
        .with_max_instances(usize::from(case.limit));
    let expansion = RecurrenceExpander::new(&resolver).expand(event, &horizon);
    assert!(expansion.warnings.is_empty(), "Case {}", case.name);

    let actual: Vec<i64> = expansion
        .occurrences
        .iter()
        .map(|occ| resolver.instant(&occ.start).timestamp())
        .collect();

    assert_eq!(actual, oracle, "Case {} did not match", case.name);
}
