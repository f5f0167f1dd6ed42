//! Filter selections for a report run

use chrono::NaiveDate;

use crate::constants;
use crate::reference::PrincipalMap;

/// Top-N customer tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Top10,
    Top25,
    Top50,
}

impl Tier {
    pub fn limit(self) -> usize {
        match self {
            Tier::Top10 => 10,
            Tier::Top25 => 25,
            Tier::Top50 => 50,
        }
    }

    /// Short code used in run tags
    pub fn code(self) -> &'static str {
        match self {
            Tier::Top10 => "T10",
            Tier::Top25 => "T25",
            Tier::Top50 => "T50",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Top {}", self.limit())
    }
}

/// Which customers the report covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CustomerSelector {
    #[default]
    All,
    Tier(Tier),
    ExactName(String),
}

impl CustomerSelector {
    /// Tier applied after ranking, if any
    pub fn tier(&self) -> Option<Tier> {
        match self {
            CustomerSelector::Tier(tier) => Some(*tier),
            _ => None,
        }
    }
}

impl std::fmt::Display for CustomerSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustomerSelector::All => write!(f, "ALL"),
            CustomerSelector::Tier(tier) => write!(f, "{}", tier),
            CustomerSelector::ExactName(name) => write!(f, "{}", name),
        }
    }
}

/// Which principal the report covers, by full name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PrincipalSelector {
    #[default]
    All,
    Named(String),
}

impl std::fmt::Display for PrincipalSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrincipalSelector::All => write!(f, "ALL"),
            PrincipalSelector::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Date column used for the time-period filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateBasis {
    Paid,
    Invoice,
    #[default]
    NotApplicable,
}

impl DateBasis {
    /// Report column compared against the date range
    pub fn column(self) -> Option<&'static str> {
        match self {
            DateBasis::Paid => Some(constants::PAID_DATE_COLUMN),
            DateBasis::Invoice => Some(constants::INVOICE_DATE_COLUMN),
            DateBasis::NotApplicable => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            DateBasis::Paid => "PAID",
            DateBasis::Invoice => "INVOICE",
            DateBasis::NotApplicable => "NA",
        }
    }
}

impl std::fmt::Display for DateBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateBasis::Paid => write!(f, "Paid Date"),
            DateBasis::Invoice => write!(f, "Invoice Date"),
            DateBasis::NotApplicable => write!(f, "N/A"),
        }
    }
}

/// Inclusive date range. `start > end` is allowed and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Complete query intent for one report run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub customer: CustomerSelector,
    pub principal: PrincipalSelector,
    pub date_basis: DateBasis,
    /// Only meaningful when `date_basis` is not `NotApplicable`
    pub date_range: DateRange,
}

impl FilterSpec {
    /// Everything, no date filter
    pub fn all(date_range: DateRange) -> Self {
        Self {
            customer: CustomerSelector::All,
            principal: PrincipalSelector::All,
            date_basis: DateBasis::NotApplicable,
            date_range,
        }
    }

    /// Unique tag for output naming, e.g. `{T10-ACM-PAID-01.01.24-06.30.24}`
    pub fn run_tag(&self, principals: &PrincipalMap) -> String {
        let customer = match &self.customer {
            CustomerSelector::All => "ALL".to_string(),
            CustomerSelector::Tier(tier) => tier.code().to_string(),
            CustomerSelector::ExactName(name) => name.chars().take(3).collect(),
        };

        let principal = match &self.principal {
            PrincipalSelector::All => "ALL",
            PrincipalSelector::Named(name) => principals
                .to_abbreviation(name)
                .unwrap_or(constants::UNMAPPED_PRINCIPAL_TAG),
        };

        let mut tag = format!("{{{}-{}-{}", customer, principal, self.date_basis.code());
        if self.date_basis != DateBasis::NotApplicable {
            tag.push_str(&format!(
                "-{}-{}",
                self.date_range.start.format(constants::TAG_DATE_FORMAT),
                self.date_range.end.format(constants::TAG_DATE_FORMAT)
            ));
        }
        tag.push('}');
        tag
    }
}
