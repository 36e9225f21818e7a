//! Static weekly timetable
//!
//! Three divisions, six teaching days, eleven fixed slots per day. The table is
//! loaded once and shared read-only; nothing mutates it at runtime.

use thiserror::Error;

/// Marker for a slot with no class
pub const BLANK: &str = "—";

/// Number of slots in every day
pub const SLOT_COUNT: usize = 11;

/// Slot intervals, written on a 12-hour clock face without am/pm
pub const TIME_SLOTS: [&str; SLOT_COUNT] = [
    "10:20–11:00",
    "11:00–11:40",
    "11:40–12:20",
    "12:20–1:00",
    "1:00–1:40",
    "1:40–2:20",
    "2:20–3:00",
    "3:00–3:40",
    "3:40–4:20",
    "4:20–5:00",
    "5:00–5:40",
];

/// Days that carry a schedule, in display order
pub const TEACHING_DAYS: [&str; 6] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Error, PartialEq)]
pub enum TimetableError {
    #[error("timetable has no divisions")]
    Empty,
    #[error("division '{0}' appears more than once")]
    DuplicateDivision(String),
    #[error("{division} {day} has {found} entries, expected {expected}")]
    WrongLength {
        division: String,
        day: String,
        found: usize,
        expected: usize,
    },
}

/// Returns true for entries that mean "no class"
pub fn is_blank(label: &str) -> bool {
    let label = label.trim();
    label.is_empty() || label == BLANK
}

/// One day's labels, indexed by slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySchedule {
    labels: Vec<String>,
}

impl DaySchedule {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The schedule of a day without classes (Sunday)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, slot: usize) -> Option<&str> {
        self.labels.get(slot).map(String::as_str)
    }

    /// Label of a slot that actually holds a class
    pub fn class_at(&self, slot: usize) -> Option<&str> {
        self.label(slot).filter(|label| !is_blank(label))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A division's week
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionSchedule {
    pub name: String,
    pub days: Vec<(String, DaySchedule)>,
}

impl DivisionSchedule {
    pub fn day(&self, weekday: &str) -> Option<&DaySchedule> {
        self.days
            .iter()
            .find(|(name, _)| name == weekday)
            .map(|(_, schedule)| schedule)
    }
}

#[derive(Debug, Clone)]
pub struct Timetable {
    time_slots: Vec<String>,
    divisions: Vec<DivisionSchedule>,
}

impl Timetable {
    /// Build a timetable, checking every day has one entry per time slot
    pub fn new(
        time_slots: Vec<String>,
        divisions: Vec<DivisionSchedule>,
    ) -> Result<Self, TimetableError> {
        if divisions.is_empty() {
            return Err(TimetableError::Empty);
        }

        for (i, division) in divisions.iter().enumerate() {
            if divisions[..i].iter().any(|d| d.name == division.name) {
                return Err(TimetableError::DuplicateDivision(division.name.clone()));
            }
            for (day, schedule) in &division.days {
                if schedule.len() != time_slots.len() {
                    return Err(TimetableError::WrongLength {
                        division: division.name.clone(),
                        day: day.clone(),
                        found: schedule.len(),
                        expected: time_slots.len(),
                    });
                }
            }
        }

        Ok(Self {
            time_slots,
            divisions,
        })
    }

    /// The Academic Year 2025–26 FYJC timetable
    pub fn builtin() -> Self {
        let divisions = BUILTIN
            .iter()
            .map(|(name, days)| DivisionSchedule {
                name: name.to_string(),
                days: TEACHING_DAYS
                    .iter()
                    .zip(days.iter())
                    .map(|(day, labels)| (day.to_string(), DaySchedule::new(labels.iter().copied())))
                    .collect(),
            })
            .collect();

        Self {
            time_slots: TIME_SLOTS.iter().map(|s| s.to_string()).collect(),
            divisions,
        }
    }

    pub fn time_slots(&self) -> &[String] {
        &self.time_slots
    }

    pub fn division_names(&self) -> impl Iterator<Item = &str> {
        self.divisions.iter().map(|d| d.name.as_str())
    }

    pub fn default_division(&self) -> &str {
        // `new` rejects empty tables
        self.divisions.first().map(|d| d.name.as_str()).unwrap_or_default()
    }

    pub fn division(&self, name: &str) -> Option<&DivisionSchedule> {
        self.divisions.iter().find(|d| d.name == name)
    }

    /// Resolve user input to a division name.
    ///
    /// Accepts the exact name in any case, or the trailing numeral alone
    /// ("ii", "2", "Division 2").
    pub fn find_division(&self, query: &str) -> Option<&str> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(d) = self
            .divisions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(query))
        {
            return Some(d.name.as_str());
        }

        let wanted = numeral_value(query.rsplit(' ').next().unwrap_or(query))?;
        self.divisions
            .iter()
            .find(|d| {
                d.name
                    .rsplit(' ')
                    .next()
                    .and_then(numeral_value)
                    .is_some_and(|n| n == wanted)
            })
            .map(|d| d.name.as_str())
    }

    /// Labels for a division on a weekday; unknown divisions and days without
    /// classes resolve to an empty schedule
    pub fn day(&self, division: &str, weekday: &str) -> DaySchedule {
        self.division(division)
            .and_then(|d| d.day(weekday))
            .cloned()
            .unwrap_or_default()
    }
}

/// Value of an arabic or (small) roman numeral
fn numeral_value(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    match s.to_ascii_lowercase().as_str() {
        "i" => Some(1),
        "ii" => Some(2),
        "iii" => Some(3),
        "iv" => Some(4),
        "v" => Some(5),
        "vi" => Some(6),
        _ => None,
    }
}

type WeekTable = [[&'static str; SLOT_COUNT]; 6];

const B: &str = BLANK;

const DIVISION_I: WeekTable = [
    [
        "COMP.SC. PR / BIOLOGY PR",
        "COMP.SC. PR / BIOLOGY PR",
        "COMP.SC. PR / BIOLOGY PR",
        "COMP.SC. PR / BIOLOGY PR",
        "MATHS-102",
        "PHY-102",
        "BIO-224 / CS-102",
        "GEO-224 / CS-102",
        "ENG-102",
        "EVS-102",
        "EVS-102",
    ],
    [
        B,
        B,
        B,
        B,
        "CHEM-102",
        "MATHS-102",
        "PHY-102",
        "ENG-102",
        "HPE-102",
        "HPE-102",
        B,
    ],
    [
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        "GEO-224 / CS-102",
        "HIN-102 / MAR-224 / CS-LAB",
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        "A1 & A2 : PHYSICS PR / A3 & A4 : CHEMISTRY PR",
        B,
    ],
    [
        B,
        B,
        B,
        B,
        "PHY-102",
        "HIN-102 / MAR-224 / CS-LAB",
        "CHEM-102",
        "BIO-224",
        "GEO-224",
        "MATHS-102",
        B,
    ],
    [
        "GEO PR-224",
        "GEO PR-224",
        "GEO PR-224",
        "GEO PR-224",
        "CHEM-102",
        "HIN-102 / MAR-224 / CS-LAB",
        "BIO-224 / CS-LAB",
        "MATHS-102",
        "ENG-102",
        "EVS-102",
        "EVS-102",
    ],
    [
        "MATHS PR-224",
        "MATHS PR-224",
        "MATHS PR-224",
        "MATHS PR-224",
        "PHY-102",
        "HIN-102 / MAR-224 / EL-LAB",
        "CHEM-102",
        "BIO-224",
        "GEO-224",
        "ENG-102",
        B,
    ],
];

const DIVISION_II: WeekTable = [
    [
        "B1 & B2: PHYSICS PR / B3 & B4: CHEMISTRY PR",
        "B1 & B2: PHYSICS PR / B3 & B4: CHEMISTRY PR",
        "B1 & B2: PHYSICS PR / B3 & B4: CHEMISTRY PR",
        "B3 & B4: PHYSICS PR / B1 & B2: CHEMISTRY PR",
        "PHY-211",
        "CHEM-211",
        "B3 & B4: PHYSICS PR / B1 & B2: CHEMISTRY PR",
        "B3 & B4: PHYSICS PR / B1 & B2: CHEMISTRY PR",
        "B3 & B4: PHYSICS PR / B1 & B2: CHEMISTRY PR",
        "B3 & B4: PHYSICS PR / B1 & B2: CHEMISTRY PR",
        B,
    ],
    [
        "BIOLOGY PR",
        "BIOLOGY PR",
        "BIOLOGY PR",
        "BIOLOGY PR",
        "CHEM-211",
        "PHY-211",
        "BIO-211 / EL-LAB",
        "MATHS-211",
        "MATHS-211",
        B,
        B,
    ],
    [
        "ELECTRONICS PR",
        "ELECTRONICS PR",
        "ELECTRONICS PR",
        "ELECTRONICS PR",
        "BIO-211 / EL-LAB",
        "HIN-102 / MAR-224 / EL-LAB",
        "PHY-211",
        "ENG-211",
        "HPE-211",
        "HPE-211",
        B,
    ],
    [
        "ELECTRONICS PR",
        "ELECTRONICS PR",
        "ELECTRONICS PR",
        "ELECTRONICS PR",
        "BIO-211 / EL-LAB",
        "HIN-102 / MAR-224 / EL-LAB",
        "MATHS PR-211",
        "MATHS PR-211",
        "ENG-211",
        "EVS-211",
        "EVS-211",
    ],
    [
        B,
        B,
        B,
        B,
        "CHEM-211",
        "HIN-102 / MAR-224 / EL-LAB",
        "MATHS PR-211",
        "MATHS PR-211",
        "ENG-211",
        B,
        B,
    ],
    [
        B,
        B,
        B,
        B,
        "BIO-211 / EL-LAB",
        "HIN-102 / MAR-224 / EL-LAB",
        "PHY-211",
        "MATHS-211",
        "MATHS-211",
        "ENG-211",
        B,
    ],
];

const DIVISION_III: WeekTable = [
    [
        B,
        B,
        B,
        B,
        "MATHS-102",
        "CHEM-224",
        "BIO-224",
        "GEO-224",
        "ENG-224",
        "HPE-224",
        "HPE-224",
    ],
    [
        "C1 & C2: PHYSICS PR / C3 & C4: CHEMISTRY PR",
        "C1 & C2: PHYSICS PR / C3 & C4: CHEMISTRY PR",
        "C1 & C2: PHYSICS PR / C3 & C4: CHEMISTRY PR",
        "C1 & C2: PHYSICS PR / C3 & C4: CHEMISTRY PR",
        "PHY-224",
        "MATHS-102",
        "C4 & C3: PHYSICS PR / C2 & C1: CHEMISTRY PR",
        "C4 & C3: PHYSICS PR / C2 & C1: CHEMISTRY PR",
        "C4 & C3: PHYSICS PR / C2 & C1: CHEMISTRY PR",
        "C4 & C3: PHYSICS PR / C2 & C1: CHEMISTRY PR",
        B,
    ],
    [
        "BIOLOGY PR",
        "BIOLOGY PR",
        "BIOLOGY PR",
        "BIOLOGY PR",
        "GEO-224",
        "HIN-102 / MAR-224",
        "CHEM-224",
        "ENG-224",
        "EVS-224",
        "EVS-224",
        B,
    ],
    [
        B,
        B,
        B,
        B,
        "CHEM-211",
        "HIN-102 / MAR-224",
        "PHY-224",
        "BIO-224",
        "GEO-224",
        "MATHS-102",
        B,
    ],
    [
        "GEO PR-224",
        "GEO PR-224",
        "GEO PR-224",
        "GEO PR-224",
        "PHY-224",
        "HIN-102 / MAR-224",
        "BIO-224",
        "MATHS-102",
        "CHEM-224",
        "ENG-224",
        B,
    ],
    [
        "MATHS PR-224",
        "MATHS PR-224",
        "MATHS PR-224",
        "MATHS PR-224",
        "PHY-224",
        "HIN-102 / MAR-224",
        "CHEM-224",
        "BIO-224",
        "GEO-224",
        "ENG-224",
        B,
    ],
];

const BUILTIN: [(&str, &WeekTable); 3] = [
    ("Division I", &DIVISION_I),
    ("Division II", &DIVISION_II),
    ("Division III", &DIVISION_III),
];
