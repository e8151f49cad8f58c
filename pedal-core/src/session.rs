//! Once-per-session facts: incident limit and strength of field
//!
//! The simulator publishes its session description as a YAML document. Only
//! two facts matter here, so it is read with a small line-oriented scanner
//! instead of a full YAML parser.

use crate::model::SessionFacts;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The parts of the session YAML the aggregator consumes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Raw `WeekendOptions.IncidentLimit` value, if present
    pub incident_limit: Option<String>,

    /// Every entry of `DriverInfo.Drivers`
    pub roster: Vec<RosterEntry>,
}

/// A single car in the session roster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user_name: String,
    pub irating: i32,
    pub is_pace_car: bool,
    pub is_spectator: bool,
}

impl RosterEntry {
    /// Counts towards strength of field
    pub fn is_rated_competitor(&self) -> bool {
        !self.is_pace_car && !self.is_spectator && self.irating > 0
    }
}

impl SessionMetadata {
    /// Scan the session YAML for the incident limit and the driver roster.
    ///
    /// Unknown keys are skipped and malformed values fall back to defaults;
    /// this never fails.
    pub fn from_yaml(yaml: &str) -> Self {
        let mut meta = SessionMetadata::default();
        let mut section = "";
        let mut list = "";
        let mut entry: Option<RosterEntry> = None;

        for line in yaml.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let trimmed = line.trim();
            let indent = line.len() - line.trim_start().len();

            if indent == 0 && !trimmed.starts_with('-') {
                if let Some(done) = entry.take() {
                    meta.roster.push(done);
                }
                section = trimmed.trim_end_matches(':');
                list = "";
                continue;
            }

            match section {
                "WeekendInfo" => {
                    if let Some(val) = try_extract_yaml_value(trimmed, "IncidentLimit:") {
                        meta.incident_limit = Some(val);
                    }
                }
                "DriverInfo" => {
                    let body = match trimmed.strip_prefix("- ") {
                        Some(rest) => {
                            if let Some(done) = entry.take() {
                                meta.roster.push(done);
                            }
                            if list == "Drivers" {
                                entry = Some(RosterEntry::default());
                            }
                            rest
                        }
                        None => {
                            if indent == 1 {
                                if let Some(done) = entry.take() {
                                    meta.roster.push(done);
                                }
                                list = trimmed.split(':').next().unwrap_or("");
                            }
                            trimmed
                        }
                    };

                    if let Some(current) = entry.as_mut() {
                        apply_roster_key(current, body);
                    }
                }
                _ => {}
            }
        }

        if let Some(done) = entry.take() {
            meta.roster.push(done);
        }

        meta
    }
}

fn apply_roster_key(entry: &mut RosterEntry, line: &str) {
    if let Some(val) = try_extract_yaml_value(line, "UserName:") {
        entry.user_name = val;
    } else if let Some(val) = try_extract_yaml_value(line, "IRating:") {
        entry.irating = val.parse().unwrap_or(0);
    } else if let Some(val) = try_extract_yaml_value(line, "CarIsPaceCar:") {
        entry.is_pace_car = val == "1";
    } else if let Some(val) = try_extract_yaml_value(line, "IsSpectator:") {
        entry.is_spectator = val == "1";
    }
}

fn try_extract_yaml_value(line: &str, key: &str) -> Option<String> {
    line.strip_prefix(key)
        .map(|rest| rest.trim().trim_matches('"').to_string())
}

/// Interpret the raw incident-limit string.
///
/// A clean integer is returned as is, sign included. `"unlimited"` and
/// anything else map to -1.
pub fn parse_incident_limit(raw: Option<&str>) -> i32 {
    let Some(raw) = raw.map(str::trim) else {
        return SessionFacts::UNLIMITED_INCIDENTS;
    };

    if raw.eq_ignore_ascii_case("unlimited") {
        return SessionFacts::UNLIMITED_INCIDENTS;
    }

    raw.parse::<i32>()
        .unwrap_or(SessionFacts::UNLIMITED_INCIDENTS)
}

/// Mean iRating of the rated competitors, rounded; 0 when there are none
pub fn strength_of_field(roster: &[RosterEntry]) -> i32 {
    let (sum, count) = roster
        .iter()
        .filter(|e| e.is_rated_competitor())
        .fold((0i64, 0i64), |(sum, count), e| {
            (sum + e.irating as i64, count + 1)
        });

    if count == 0 {
        return 0;
    }

    (sum as f64 / count as f64).round() as i32
}

impl SessionFacts {
    pub fn from_metadata(meta: &SessionMetadata) -> Self {
        Self {
            max_incidents: parse_incident_limit(meta.incident_limit.as_deref()),
            strength_of_field: strength_of_field(&meta.roster),
        }
    }
}

/// Where the aggregator is in its once-per-connection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Armed: the next frame parses the metadata
    Unparsed,
    /// Parsed for the current connection; further frames are no-ops
    Parsed(SessionFacts),
    /// Connection lost; the last facts stay readable until parsing re-arms
    StalePendingReset(SessionFacts),
}

/// Computes [`SessionFacts`] at most once per connection
#[derive(Debug)]
pub struct SessionAggregator {
    state: ParseState,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self {
            state: ParseState::Unparsed,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Current facts, or the defaults when nothing has been parsed
    pub fn facts(&self) -> SessionFacts {
        match self.state {
            ParseState::Parsed(facts) | ParseState::StalePendingReset(facts) => facts,
            ParseState::Unparsed => SessionFacts::default(),
        }
    }

    pub fn on_connected(&mut self) {
        self.state = ParseState::Unparsed;
    }

    pub fn on_disconnected(&mut self) {
        if let ParseState::Parsed(facts) = self.state {
            self.state = ParseState::StalePendingReset(facts);
        }
    }

    /// Parse the metadata unless this connection already has facts.
    ///
    /// `metadata` is only invoked while the aggregator is armed. When it
    /// returns `None` (snapshot not published yet) the aggregator stays armed
    /// and the current facts are returned unchanged.
    pub fn ensure_parsed<F>(&mut self, metadata: F) -> SessionFacts
    where
        F: FnOnce() -> Option<SessionMetadata>,
    {
        if let ParseState::Parsed(facts) = self.state {
            return facts;
        }

        match metadata() {
            Some(meta) => {
                let facts = SessionFacts::from_metadata(&meta);
                info!(
                    max_incidents = facts.max_incidents,
                    strength_of_field = facts.strength_of_field,
                    roster = meta.roster.len(),
                    "Session facts parsed"
                );
                self.state = ParseState::Parsed(facts);
                facts
            }
            None => {
                debug!("Session metadata not available yet");
                self.facts()
            }
        }
    }
}

impl Default for SessionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_YAML: &str = r#"---
WeekendInfo:
 TrackName: spielberg gp
 TrackDisplayName: Red Bull Ring
 WeekendOptions:
  NumStarters: 4
  IncidentLimit: 17
DriverInfo:
 DriverCarIdx: 1
 DriverTires:
 - TireIndex: 0
   TireCompoundType: "Hard"
 Drivers:
 - CarIdx: 0
   UserName: Pace Car
   IRating: 0
   CarIsPaceCar: 1
   IsSpectator: 0
 - CarIdx: 1
   UserName: Test Driver
   IRating: 2400
   CarIsPaceCar: 0
   IsSpectator: 0
 - CarIdx: 2
   UserName: Second Driver
   IRating: 1800
   CarIsPaceCar: 0
   IsSpectator: 0
 - CarIdx: 3
   UserName: Watching
   IRating: 5000
   CarIsPaceCar: 0
   IsSpectator: 1
SplitTimeInfo:
 Sectors:
 - SectorNum: 0
   SectorStartPct: 0.000000
...
"#;

    fn rated(irating: i32) -> RosterEntry {
        RosterEntry {
            user_name: format!("Driver {}", irating),
            irating,
            ..Default::default()
        }
    }

    #[test]
    fn test_incident_limit_unlimited() {
        assert_eq!(parse_incident_limit(Some("unlimited")), -1);
        assert_eq!(parse_incident_limit(Some(" Unlimited ")), -1);
    }

    #[test]
    fn test_incident_limit_integer() {
        assert_eq!(parse_incident_limit(Some("7")), 7);
        assert_eq!(parse_incident_limit(Some("0")), 0);
    }

    #[test]
    fn test_incident_limit_garbage_is_unlimited() {
        assert_eq!(parse_incident_limit(Some("")), -1);
        assert_eq!(parse_incident_limit(None), -1);
        assert_eq!(parse_incident_limit(Some("17x")), -1);
    }

    #[test]
    fn test_incident_limit_negative_integer_is_kept() {
        assert_eq!(parse_incident_limit(Some("-4")), -4);
        assert_eq!(parse_incident_limit(Some(" -1 ")), -1);
        assert_eq!(parse_incident_limit(Some("0")), 0);
    }

    #[test]
    fn test_strength_of_field_excludes_non_positive() {
        let roster = vec![rated(1000), rated(2000), rated(0), rated(-5)];
        assert_eq!(strength_of_field(&roster), 1500);
    }

    #[test]
    fn test_strength_of_field_excludes_pace_car_and_spectators() {
        let mut pace = rated(3000);
        pace.is_pace_car = true;
        let mut spectator = rated(4000);
        spectator.is_spectator = true;
        let roster = vec![pace, spectator, rated(1200)];
        assert_eq!(strength_of_field(&roster), 1200);
    }

    #[test]
    fn test_strength_of_field_empty_is_zero() {
        assert_eq!(strength_of_field(&[]), 0);
        assert_eq!(strength_of_field(&[rated(0)]), 0);
    }

    #[test]
    fn test_strength_of_field_rounds() {
        let roster = vec![rated(1000), rated(1001)];
        assert_eq!(strength_of_field(&roster), 1001);
    }

    #[test]
    fn test_metadata_from_yaml() {
        let meta = SessionMetadata::from_yaml(SESSION_YAML);
        assert_eq!(meta.incident_limit.as_deref(), Some("17"));
        assert_eq!(meta.roster.len(), 4, "tyre and sector lists are not drivers");
        assert!(meta.roster[0].is_pace_car);
        assert_eq!(meta.roster[1].user_name, "Test Driver");
        assert_eq!(meta.roster[1].irating, 2400);
        assert!(meta.roster[3].is_spectator);

        let facts = SessionFacts::from_metadata(&meta);
        assert_eq!(facts.max_incidents, 17);
        assert_eq!(facts.strength_of_field, 2100);
    }

    #[test]
    fn test_metadata_from_empty_yaml() {
        let meta = SessionMetadata::from_yaml("");
        assert_eq!(meta, SessionMetadata::default());
        assert_eq!(SessionFacts::from_metadata(&meta), SessionFacts::default());
    }

    #[test]
    fn test_metadata_partial_yaml_keeps_what_parsed() {
        let yaml = "WeekendInfo:\n WeekendOptions:\n  IncidentLimit: unlimited\n";
        let facts = SessionFacts::from_metadata(&SessionMetadata::from_yaml(yaml));
        assert_eq!(facts.max_incidents, -1);
        assert_eq!(facts.strength_of_field, 0);
    }

    #[test]
    fn test_metadata_bad_irating_defaults_to_zero() {
        let yaml = "DriverInfo:\n Drivers:\n - CarIdx: 0\n   IRating: lots\n";
        let meta = SessionMetadata::from_yaml(yaml);
        assert_eq!(meta.roster.len(), 1);
        assert_eq!(meta.roster[0].irating, 0);
    }

    #[test]
    fn test_aggregator_parses_once() {
        let mut agg = SessionAggregator::new();
        let meta = SessionMetadata {
            incident_limit: Some("7".to_string()),
            roster: vec![rated(1500)],
        };

        let facts = agg.ensure_parsed(|| Some(meta.clone()));
        assert_eq!(facts.max_incidents, 7);
        assert_eq!(agg.state(), ParseState::Parsed(facts));

        let again = agg.ensure_parsed(|| panic!("metadata must not be read twice"));
        assert_eq!(again, facts);
    }

    #[test]
    fn test_aggregator_stays_armed_without_metadata() {
        let mut agg = SessionAggregator::new();
        assert_eq!(agg.ensure_parsed(|| None), SessionFacts::default());
        assert_eq!(agg.state(), ParseState::Unparsed);

        let facts = agg.ensure_parsed(|| {
            Some(SessionMetadata {
                incident_limit: Some("25".to_string()),
                roster: Vec::new(),
            })
        });
        assert_eq!(facts.max_incidents, 25);
    }

    #[test]
    fn test_aggregator_reparses_after_reconnect() {
        let mut agg = SessionAggregator::new();
        agg.ensure_parsed(|| {
            Some(SessionMetadata {
                incident_limit: Some("7".to_string()),
                roster: Vec::new(),
            })
        });

        agg.on_disconnected();
        assert!(matches!(agg.state(), ParseState::StalePendingReset(_)));
        assert_eq!(agg.facts().max_incidents, 7, "stale facts stay readable");

        agg.on_connected();
        assert_eq!(agg.state(), ParseState::Unparsed);
        assert_eq!(agg.facts(), SessionFacts::default());

        let facts = agg.ensure_parsed(|| {
            Some(SessionMetadata {
                incident_limit: Some("unlimited".to_string()),
                roster: vec![rated(900)],
            })
        });
        assert_eq!(facts.max_incidents, -1);
        assert_eq!(facts.strength_of_field, 900);
    }

    #[test]
    fn test_aggregator_disconnect_while_unparsed() {
        let mut agg = SessionAggregator::new();
        agg.on_disconnected();
        assert_eq!(agg.state(), ParseState::Unparsed);
    }
}
