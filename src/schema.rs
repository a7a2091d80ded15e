use std::fmt::Display;
use std::num::ParseIntError;
use std::ops::RangeInclusive;
use std::str::FromStr;

use enum_map::{Enum, EnumMap};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use strum::EnumIter;
use thiserror::Error;
use typed_builder::TypedBuilder;

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    Enum,
    EnumIter,
    strum::EnumString,
    strum::Display,
    clap::ValueEnum,
)]
#[strum(ascii_case_insensitive)]
pub enum Sport {
    #[serde(rename = "mbb", alias = "men")]
    #[strum(to_string = "mbb", serialize = "men")]
    #[value(name = "mbb", alias = "men")]
    MensBasketball,
    #[serde(rename = "wbb", alias = "women")]
    #[strum(to_string = "wbb", serialize = "women")]
    #[value(name = "wbb", alias = "women")]
    WomensBasketball,
    #[serde(rename = "football", alias = "cfb")]
    #[strum(to_string = "football", serialize = "cfb")]
    #[value(name = "football", alias = "cfb")]
    Football,
}
impl Sport {
    pub fn is_basketball(self) -> bool {
        !matches!(self, Sport::Football)
    }

    /// Path of the roster page, relative to the site root.
    pub fn roster_path(self, slug: &SchoolSlug, season: Season) -> String {
        use Sport::*;
        match self {
            MensBasketball => format!("cbb/schools/{slug}/men/{season}.html"),
            WomensBasketball => format!("cbb/schools/{slug}/women/{season}.html"),
            Football => format!("cfb/schools/{slug}/{season}-roster.html"),
        }
    }

    /// Path of the page listing every school that fielded a team in `season`.
    pub fn school_index_path(self, season: Season) -> String {
        use Sport::*;
        match self {
            MensBasketball => format!("cbb/seasons/men/{season}-school-stats.html"),
            WomensBasketball => format!("cbb/seasons/women/{season}-school-stats.html"),
            Football => format!("cfb/years/{season}-standings.html"),
        }
    }
}

/// A season, identified by the calendar year in which it ends.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
pub struct Season(u16);
impl Season {
    pub const DEFAULT_FIRST: Season = Season(2017);
    pub const DEFAULT_LAST: Season = Season(2021);

    pub const fn new(year: u16) -> Self {
        Self(year)
    }

    /// Years a season may end in, as accepted from text.
    pub const YEARS: RangeInclusive<u16> = 1000..=9999;

    pub fn year(self) -> u16 {
        self.0
    }

    pub fn defaults() -> Vec<Season> {
        (Self::DEFAULT_FIRST.0..=Self::DEFAULT_LAST.0)
            .map(Season)
            .collect()
    }

    /// `2020-21` for basketball, `2020` for football.
    pub fn label(self, sport: Sport) -> String {
        if sport.is_basketball() {
            format!("{}-{:02}", self.0.saturating_sub(1), self.0 % 100)
        } else {
            self.0.to_string()
        }
    }
}

#[derive(PartialEq, Eq, Debug, Error)]
pub enum SeasonParseError {
    #[error("Value cannot be parsed as a year: {0}")]
    ParseIntError(#[from] ParseIntError),
    #[error("The two halves of {0:?} are not consecutive years")]
    NotConsecutive(String),
    #[error("{0} is not a four-digit season year")]
    OutOfRange(u16),
}
impl FromStr for Season {
    type Err = SeasonParseError;

    /// Accepts both `2021` and the two-year form `2020-21`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let year = match s.split_once('-') {
            Some((start, end)) => {
                let start: u16 = start.parse()?;
                let end: u16 = end.parse()?;
                let next = start
                    .checked_add(1)
                    .ok_or(SeasonParseError::OutOfRange(start))?;
                if end != next && end != next % 100 {
                    return Err(SeasonParseError::NotConsecutive(s.to_owned()));
                }
                next
            }
            None => s.parse()?,
        };
        if !Self::YEARS.contains(&year) {
            return Err(SeasonParseError::OutOfRange(year));
        }
        Ok(Season(year))
    }
}

#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    derive_more::From,
    derive_more::AsRef,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[as_ref(forward)]
pub struct SchoolSlug(String);

#[derive(
    Clone,
    PartialEq,
    Eq,
    Debug,
    derive_more::From,
    derive_more::AsRef,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[as_ref(forward)]
pub struct SchoolName(String);

#[derive(
    Clone,
    PartialEq,
    Eq,
    Debug,
    derive_more::From,
    derive_more::AsRef,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[as_ref(forward)]
pub struct Conference(String);

/// One row of a school file.
#[derive(Clone, PartialEq, Eq, Debug, TypedBuilder, Getters, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct School {
    school_slug: SchoolSlug,
    school_name: SchoolName,
    conference: Conference,
}

/// Identity of a work unit.
#[derive(Clone, PartialEq, Eq, Hash, Debug, TypedBuilder, Serialize, Deserialize)]
pub struct UnitKey {
    school_slug: SchoolSlug,
    season: Season,
    sport: Sport,
}
impl Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.school_slug,
            self.season.label(self.sport),
            self.sport
        )
    }
}

/// One (school, season, sport) combination to be scraped.
#[derive(Clone, PartialEq, Eq, Debug, Getters, CopyGetters)]
pub struct WorkUnit {
    #[getset(get = "pub")]
    school: School,
    #[getset(get_copy = "pub")]
    season: Season,
    #[getset(get_copy = "pub")]
    sport: Sport,
}
impl WorkUnit {
    pub fn new(school: School, season: Season, sport: Sport) -> Self {
        Self {
            school,
            season,
            sport,
        }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey {
            school_slug: self.school.school_slug.clone(),
            season: self.season,
            sport: self.sport,
        }
    }
}

/// Fields a roster page may expose for a player.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter)]
pub enum RosterField {
    PlayerName,
    Number,
    Position,
    ClassYear,
    Height,
    Weight,
    Hometown,
    HighSchool,
}

#[derive(Clone, PartialEq, Eq, Debug, Getters, CopyGetters)]
pub struct PlayerRecord {
    #[getset(get = "pub")]
    school: School,
    #[getset(get_copy = "pub")]
    season: Season,
    #[getset(get_copy = "pub")]
    sport: Sport,
    #[getset(get = "pub")]
    fields: EnumMap<RosterField, String>,
}
impl PlayerRecord {
    pub fn new(unit: &WorkUnit, fields: EnumMap<RosterField, String>) -> Self {
        Self {
            school: unit.school.clone(),
            season: unit.season,
            sport: unit.sport,
            fields,
        }
    }

    pub fn player_name(&self) -> &str {
        &self.fields[RosterField::PlayerName]
    }
}
