use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperienceType {
    Lounge,
    Dining,
    Relax,
}

impl ExperienceType {
    pub const ALL: [ExperienceType; 3] = [Self::Lounge, Self::Dining, Self::Relax];

    /// Parse a category keyword, ignoring case.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(word))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lounge => "LOUNGE",
            Self::Dining => "DINING",
            Self::Relax => "RELAX",
        }
    }
}

impl fmt::Display for ExperienceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an airport page sits on the site; shared by every record extracted
/// from that page.
#[derive(Debug, Clone, Default)]
pub struct AirportContext {
    pub airport_url: String,
    pub airport_slug: String,
    pub country_slug: String,
    pub airport_name: String,
    pub airport_title: String,
    pub iata_from_title: Option<String>,
}

/// One lounge, dining or relax experience found on an airport page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperienceRecord {
    pub airport_url: String,
    pub airport_slug: String,
    pub country_slug: String,
    pub airport_name: String,
    pub airport_title: String,
    pub experience_type: ExperienceType,
    pub experience_name: String,
    pub experience_detail_url: String,
    pub experience_detail_slug: String,
    pub iata_code: Option<String>,
}

impl ExperienceRecord {
    pub fn new(
        ctx: &AirportContext,
        experience_type: ExperienceType,
        name: &str,
        detail_url: String,
        detail_slug: String,
        iata_from_code: Option<String>,
    ) -> Self {
        Self {
            airport_url: ctx.airport_url.clone(),
            airport_slug: ctx.airport_slug.clone(),
            country_slug: ctx.country_slug.clone(),
            airport_name: ctx.airport_name.clone(),
            airport_title: ctx.airport_title.clone(),
            experience_type,
            experience_name: name.trim().to_string(),
            experience_detail_url: detail_url,
            experience_detail_slug: detail_slug,
            iata_code: iata_from_code.or_else(|| ctx.iata_from_title.clone()),
        }
    }
}

/// A LOUNGE record after validation, carrying what the detail page showed.
#[derive(Debug, Clone, PartialEq)]
pub struct LoungeRecord {
    pub experience: ExperienceRecord,
    pub lounge_image_url: Option<String>,
    pub lounge_title: Option<String>,
}

impl LoungeRecord {
    pub fn iata(&self) -> Option<&str> {
        self.experience.iata_code.as_deref()
    }

    pub fn detail_url(&self) -> &str {
        &self.experience.experience_detail_url
    }
}

impl From<ExperienceRecord> for LoungeRecord {
    fn from(experience: ExperienceRecord) -> Self {
        Self {
            experience,
            lounge_image_url: None,
            lounge_title: None,
        }
    }
}

/// Per airport page counts. Failed pages keep their URL and the error text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AirportSummary {
    pub airport_url: String,
    pub airport_slug: String,
    pub country_slug: String,
    pub airport_name: String,
    pub airport_title: String,
    pub airport_iata: Option<String>,
    pub lounge_count: usize,
    pub non_lounge_count: usize,
    pub total: usize,
    pub error: Option<String>,
}

impl AirportSummary {
    pub fn failed(airport_url: &str, error: String) -> Self {
        Self {
            airport_url: airport_url.to_string(),
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Everything extracted from one airport page.
#[derive(Debug, Clone, Default)]
pub struct AirportPage {
    pub summary: AirportSummary,
    pub lounges: Vec<ExperienceRecord>,
    pub others: Vec<ExperienceRecord>,
}

/// Title and hero image of a lounge detail page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailMeta {
    pub title: Option<String>,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_parsing_ignores_case() {
        assert_eq!(ExperienceType::from_keyword("lounge"), Some(ExperienceType::Lounge));
        assert_eq!(ExperienceType::from_keyword("Dining"), Some(ExperienceType::Dining));
        assert_eq!(ExperienceType::from_keyword("RELAX"), Some(ExperienceType::Relax));
        assert_eq!(ExperienceType::from_keyword("spa"), None);
    }

    #[test]
    fn record_falls_back_to_title_iata() {
        let ctx = AirportContext {
            iata_from_title: Some("ATL".into()),
            ..AirportContext::default()
        };
        let with_code = ExperienceRecord::new(
            &ctx,
            ExperienceType::Lounge,
            " The Club ",
            "u".into(),
            "s".into(),
            Some("JFK".into()),
        );
        assert_eq!(with_code.iata_code.as_deref(), Some("JFK"));
        assert_eq!(with_code.experience_name, "The Club");

        let without = ExperienceRecord::new(&ctx, ExperienceType::Lounge, "x", "u".into(), "s".into(), None);
        assert_eq!(without.iata_code.as_deref(), Some("ATL"));
    }
}
