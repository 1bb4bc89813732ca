use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::airports::AirportRef;
use crate::types::LoungeRecord;

/// One lounge as shown in a map popup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LoungeItem {
    pub name: String,
    pub url: String,
    pub image: Option<String>,
}

/// Lounges sharing one IATA code.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoungeGroup {
    pub lounge_count: usize,
    /// Sorted unique names joined with " | ".
    pub lounge_names: String,
    pub items: Vec<LoungeItem>,
}

impl LoungeGroup {
    pub fn items_json(&self) -> String {
        serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".to_string())
    }
}

/// A reference airport with its lounges, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedAirport {
    pub airport: AirportRef,
    pub lounges: Option<LoungeGroup>,
}

impl AggregatedAirport {
    pub fn lounge_count(&self) -> usize {
        self.lounges.as_ref().map_or(0, |g| g.lounge_count)
    }

    pub fn has_lounge(&self) -> bool {
        self.lounge_count() > 0
    }

    pub fn is_pin(&self) -> bool {
        self.has_lounge() && self.airport.has_coordinates()
    }
}

/// Group lounge records by IATA code. Records without a code are skipped.
pub fn group_by_iata(lounges: &[LoungeRecord]) -> HashMap<String, LoungeGroup> {
    let mut names: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut seen: HashSet<(String, LoungeItem)> = HashSet::new();
    let mut groups: HashMap<String, LoungeGroup> = HashMap::new();

    for record in lounges {
        let Some(iata) = record.iata() else {
            continue;
        };
        let name = record.experience.experience_name.clone();
        let group = groups.entry(iata.to_string()).or_default();
        group.lounge_count += 1;
        names.entry(iata.to_string()).or_default().insert(name.clone());

        let item = LoungeItem {
            name,
            url: record.detail_url().to_string(),
            image: record.lounge_image_url.clone(),
        };
        if seen.insert((iata.to_string(), item.clone())) {
            group.items.push(item);
        }
    }

    for (iata, group) in groups.iter_mut() {
        if let Some(set) = names.remove(iata) {
            group.lounge_names = set.into_iter().collect::<Vec<_>>().join(" | ");
        }
    }
    groups
}

/// Left join of the reference table with the lounge groups, in reference order.
pub fn aggregate(airports: &[AirportRef], lounges: &[LoungeRecord]) -> Vec<AggregatedAirport> {
    let groups = group_by_iata(lounges);
    airports
        .iter()
        .map(|airport| AggregatedAirport {
            airport: airport.clone(),
            lounges: if airport.iata_code.is_empty() {
                None
            } else {
                groups.get(&airport.iata_code).cloned()
            },
        })
        .collect()
}

pub fn pins(joined: &[AggregatedAirport]) -> Vec<&AggregatedAirport> {
    joined.iter().filter(|a| a.is_pin()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AirportContext, ExperienceRecord, ExperienceType};

    fn lounge(iata: Option<&str>, name: &str, url: &str, image: Option<&str>) -> LoungeRecord {
        let record = ExperienceRecord::new(
            &AirportContext::default(),
            ExperienceType::Lounge,
            name,
            url.to_string(),
            url.rsplit('/').next().unwrap_or_default().to_string(),
            iata.map(str::to_string),
        );
        LoungeRecord {
            experience: record,
            lounge_image_url: image.map(str::to_string),
            lounge_title: None,
        }
    }

    fn airport(iata: &str, lat: Option<f64>, lon: Option<f64>) -> AirportRef {
        AirportRef {
            ident: format!("X{iata}"),
            iata_code: iata.to_string(),
            latitude_deg: lat,
            longitude_deg: lon,
            ..AirportRef::default()
        }
    }

    #[test]
    fn groups_count_names_and_unique_items() {
        let lounges = vec![
            lounge(Some("ATL"), "The Club", "https://x/a/the-club", None),
            lounge(Some("ATL"), "Escape", "https://x/a/escape", Some("https://img/e.jpg")),
            lounge(Some("ATL"), "The Club", "https://x/a/the-club", None),
            lounge(Some("LHR"), "Aspire", "https://x/l/aspire", None),
            lounge(None, "Orphan", "https://x/o/orphan", None),
        ];
        let groups = group_by_iata(&lounges);
        assert_eq!(groups.len(), 2);

        let atl = &groups["ATL"];
        assert_eq!(atl.lounge_count, 3);
        assert_eq!(atl.lounge_names, "Escape | The Club");
        assert_eq!(atl.items.len(), 2);
        assert_eq!(atl.items[0].name, "The Club");
        assert_eq!(atl.items[1].image.as_deref(), Some("https://img/e.jpg"));
    }

    #[test]
    fn items_serialize_as_json_list() {
        let groups = group_by_iata(&[lounge(Some("ATL"), "Club", "https://x/c", None)]);
        assert_eq!(
            groups["ATL"].items_json(),
            r#"[{"name":"Club","url":"https://x/c","image":null}]"#
        );
    }

    #[test]
    fn unmatched_code_and_missing_coordinates_are_not_pins() {
        let airports = vec![
            airport("ATL", Some(33.6), Some(-84.4)),
            airport("KEF", Some(63.9), Some(-22.6)),
            airport("ZZL", None, None),
            airport("", Some(1.0), Some(1.0)),
        ];
        let lounges = vec![
            lounge(Some("ATL"), "Club", "https://x/a/club", None),
            // no reference row for this code
            lounge(Some("QQQ"), "Ghost", "https://x/q/ghost", None),
            lounge(Some("ZZL"), "Hidden", "https://x/z/hidden", None),
        ];

        let joined = aggregate(&airports, &lounges);
        assert_eq!(joined.len(), airports.len());
        assert!(joined[0].has_lounge());
        assert!(!joined[1].has_lounge());
        assert_eq!(joined[1].lounge_count(), 0);
        assert!(joined[2].has_lounge());
        assert!(!joined[2].is_pin());
        assert!(!joined[3].has_lounge());

        let pins = pins(&joined);
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].airport.iata_code, "ATL");
    }

    #[test]
    fn aggregation_ignores_record_order() {
        let a = lounge(Some("ATL"), "A", "https://x/a", None);
        let b = lounge(Some("ATL"), "B", "https://x/b", None);
        let airports = vec![airport("ATL", Some(1.0), Some(2.0))];
        let forward = aggregate(&airports, &[a.clone(), b.clone()]);
        let backward = aggregate(&airports, &[b, a]);
        let f = forward[0].lounges.as_ref().unwrap();
        let r = backward[0].lounges.as_ref().unwrap();
        assert_eq!(f.lounge_count, r.lounge_count);
        assert_eq!(f.lounge_names, r.lounge_names);
    }
}
