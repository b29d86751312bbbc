//! Risk section of a clinical extraction and its severity scales.
//!
//! Each ordered field has an explicit severity order given as data
//! ([`RiskScale::ALL`], least severe first) and an explicit [`RiskScale::rank`].
//! Merge and guardrail logic compare values only through `rank`, never by
//! declaration order or string equality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::field::{ExtractedField, FieldValue, Unset};

/// An ordered severity scale for one risk field.
pub trait RiskScale: Copy + Eq + fmt::Debug + fmt::Display + Default + Send + Sync + 'static {
    /// Every value, least severe first.
    const ALL: &'static [Self];

    /// Position in the severity order. 0 is the "none" level.
    fn rank(self) -> u8;

    fn as_str(self) -> &'static str;

    /// The more severe of two values. Ties return `self`.
    fn most_severe(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    fn is_none_level(self) -> bool {
        self.rank() == 0
    }

    /// The lowest level above "none", used for guardrail escalation.
    fn minimum_escalation() -> Self {
        Self::ALL[1]
    }
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Defines a scale enum with its rank table, wire names and lenient parsing.
///
/// Parsing ignores case, spaces, dashes and underscores so that
/// "Active - no plan", "active_no_plan" and "ActiveNoPlan" all agree.
/// Unknown values are an error, never a silent default.
macro_rules! risk_scale {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident = ($rank:literal, $wire:literal $(, $alias:literal)*) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            #[default]
            $( $variant ),+
        }

        impl RiskScale for $name {
            const ALL: &'static [Self] = &[ $( $name::$variant ),+ ];

            fn rank(self) -> u8 {
                match self {
                    $( $name::$variant => $rank ),+
                }
            }

            fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let key = normalize(raw);
                $(
                    if key == normalize($wire) $( || key == normalize($alias) )* {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!("unknown {} value '{}'", stringify!($name), raw))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = Option::<String>::deserialize(deserializer)?;
                match raw {
                    None => Ok(Self::default()),
                    Some(s) => s.parse().map_err(serde::de::Error::custom),
                }
            }
        }

        impl Unset for $name {
            fn is_unset(&self) -> bool {
                *self == Self::default()
            }
        }
    };
}

// The first variant listed is the default. Keep the "none" level first.
risk_scale! {
    /// Suicidal ideation, least to most severe.
    SuicidalIdeation {
        None = (0, "none", "denied", "denies", "absent"),
        Passive = (1, "passive"),
        ActiveNoPlan = (2, "active_no_plan", "active without plan", "active"),
        ActiveWithPlan = (3, "active_with_plan", "active plan"),
        ActiveWithIntent = (4, "active_with_intent", "active intent", "active with plan and intent"),
    }
}

risk_scale! {
    SelfHarm {
        None = (0, "none", "denied", "denies", "absent"),
        Historical = (1, "historical", "history", "past"),
        Current = (2, "current", "recent"),
        Imminent = (3, "imminent"),
    }
}

risk_scale! {
    HomicidalIdeation {
        None = (0, "none", "denied", "denies", "absent"),
        Passive = (1, "passive"),
        ActiveNoPlan = (2, "active_no_plan", "active without plan", "active"),
        ActiveWithPlan = (3, "active_with_plan", "active plan"),
    }
}

risk_scale! {
    /// Clinician-level overall risk. "Low" is the floor; there is no "none".
    RiskLevelOverall {
        Low = (0, "low", "minimal", "none"),
        Moderate = (1, "moderate", "medium"),
        High = (2, "high"),
        Imminent = (3, "imminent", "severe", "critical"),
    }
}

/// Safety plan state. Not a severity scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyPlanStatus {
    #[default]
    NotAssessed,
    NotNeeded,
    Reviewed,
    Updated,
    Created,
}

impl Unset for SafetyPlanStatus {
    fn is_unset(&self) -> bool {
        *self == SafetyPlanStatus::NotAssessed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Risk Assessment
// ─────────────────────────────────────────────────────────────────────────────

/// The four ordered risk fields, in the order the merger walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskField {
    SuicidalIdeation,
    SelfHarm,
    HomicidalIdeation,
    RiskLevelOverall,
}

impl RiskField {
    pub const ALL: [RiskField; 4] = [
        RiskField::SuicidalIdeation,
        RiskField::SelfHarm,
        RiskField::HomicidalIdeation,
        RiskField::RiskLevelOverall,
    ];

    /// Display name, as used in "Section.Field" paths.
    pub fn name(self) -> &'static str {
        match self {
            RiskField::SuicidalIdeation => "SuicidalIdeation",
            RiskField::SelfHarm => "SelfHarm",
            RiskField::HomicidalIdeation => "HomicidalIdeation",
            RiskField::RiskLevelOverall => "RiskLevelOverall",
        }
    }

    /// JSON key used in extraction payloads.
    pub fn key(self) -> &'static str {
        match self {
            RiskField::SuicidalIdeation => "suicidal_ideation",
            RiskField::SelfHarm => "self_harm",
            RiskField::HomicidalIdeation => "homicidal_ideation",
            RiskField::RiskLevelOverall => "risk_level_overall",
        }
    }
}

impl fmt::Display for RiskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The risk section of a clinical extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskAssessment {
    pub suicidal_ideation: ExtractedField<SuicidalIdeation>,
    pub self_harm: ExtractedField<SelfHarm>,
    pub homicidal_ideation: ExtractedField<HomicidalIdeation>,
    pub risk_level_overall: ExtractedField<RiskLevelOverall>,
    pub risk_factors: ExtractedField<Vec<String>>,
    pub protective_factors: ExtractedField<Vec<String>>,
    pub safety_plan_status: ExtractedField<SafetyPlanStatus>,
}

impl RiskAssessment {
    /// Every field with its display name, for confidence walking.
    pub fn fields(&self) -> Vec<(&'static str, &dyn FieldValue)> {
        let fields: [(&'static str, &dyn FieldValue); 7] = [
            ("SuicidalIdeation", &self.suicidal_ideation),
            ("SelfHarm", &self.self_harm),
            ("HomicidalIdeation", &self.homicidal_ideation),
            ("RiskLevelOverall", &self.risk_level_overall),
            ("RiskFactors", &self.risk_factors),
            ("ProtectiveFactors", &self.protective_factors),
            ("SafetyPlanStatus", &self.safety_plan_status),
        ];
        fields.into()
    }

    /// Rank, wire value and confidence of one ordered field.
    pub fn ordered(&self, field: RiskField) -> OrderedValue {
        match field {
            RiskField::SuicidalIdeation => OrderedValue::of(&self.suicidal_ideation),
            RiskField::SelfHarm => OrderedValue::of(&self.self_harm),
            RiskField::HomicidalIdeation => OrderedValue::of(&self.homicidal_ideation),
            RiskField::RiskLevelOverall => OrderedValue::of(&self.risk_level_overall),
        }
    }
}

/// A scale-erased snapshot of one ordered field.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedValue {
    pub rank: u8,
    pub value: &'static str,
    pub confidence: f64,
}

impl OrderedValue {
    fn of<S: RiskScale>(field: &ExtractedField<S>) -> Self {
        Self {
            rank: field.value.rank(),
            value: field.value.as_str(),
            confidence: field.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_strictly_ordered<S: RiskScale>() {
        let ranks: Vec<u8> = S::ALL.iter().map(|v| v.rank()).collect();
        let expected: Vec<u8> = (0..S::ALL.len() as u8).collect();
        assert_eq!(ranks, expected, "{:?}", S::ALL);
        assert!(S::default().is_none_level());
    }

    #[test]
    fn test_scales_are_total_orders() {
        assert_strictly_ordered::<SuicidalIdeation>();
        assert_strictly_ordered::<SelfHarm>();
        assert_strictly_ordered::<HomicidalIdeation>();
        assert_strictly_ordered::<RiskLevelOverall>();
    }

    #[test]
    fn test_explicit_orders() {
        use SuicidalIdeation as S;
        assert!(S::None.rank() < S::Passive.rank());
        assert!(S::Passive.rank() < S::ActiveNoPlan.rank());
        assert!(S::ActiveNoPlan.rank() < S::ActiveWithPlan.rank());
        assert!(S::ActiveWithPlan.rank() < S::ActiveWithIntent.rank());

        assert!(SelfHarm::Historical.rank() < SelfHarm::Current.rank());
        assert!(SelfHarm::Current.rank() < SelfHarm::Imminent.rank());
        assert!(HomicidalIdeation::ActiveNoPlan.rank() < HomicidalIdeation::ActiveWithPlan.rank());
        assert!(RiskLevelOverall::Moderate.rank() < RiskLevelOverall::High.rank());
    }

    #[test]
    fn test_minimum_escalation() {
        assert_eq!(SelfHarm::minimum_escalation(), SelfHarm::Historical);
        assert_eq!(HomicidalIdeation::minimum_escalation(), HomicidalIdeation::Passive);
    }

    #[test]
    fn test_most_severe_ties_keep_self() {
        assert_eq!(
            SelfHarm::Current.most_severe(SelfHarm::Historical),
            SelfHarm::Current
        );
        assert_eq!(SelfHarm::None.most_severe(SelfHarm::Imminent), SelfHarm::Imminent);
        assert_eq!(SelfHarm::Current.most_severe(SelfHarm::Current), SelfHarm::Current);
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!("ActiveNoPlan".parse::<SuicidalIdeation>(), Ok(SuicidalIdeation::ActiveNoPlan));
        assert_eq!("active - no plan".parse::<SuicidalIdeation>(), Ok(SuicidalIdeation::ActiveNoPlan));
        assert_eq!("Denies".parse::<SuicidalIdeation>(), Ok(SuicidalIdeation::None));
        assert_eq!("HIGH".parse::<RiskLevelOverall>(), Ok(RiskLevelOverall::High));
        assert!("maybe".parse::<SelfHarm>().is_err());
    }

    #[test]
    fn test_unknown_value_fails_deserialization() {
        let result: Result<RiskAssessment, _> = serde_json::from_value(json!({
            "suicidal_ideation": {"value": "somewhat", "confidence": 0.9}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_risk_assessment_round_trip_wire_names() {
        let risk: RiskAssessment = serde_json::from_value(json!({
            "suicidal_ideation": {"value": "passive", "confidence": 0.92, "source": "wish I could disappear"},
            "homicidal_ideation": {"value": null, "confidence": 0.0},
            "risk_level_overall": {"value": "Moderate", "confidence": 0.8},
            "safety_plan_status": {"value": "reviewed", "confidence": 0.9}
        }))
        .unwrap();

        assert_eq!(risk.suicidal_ideation.value, SuicidalIdeation::Passive);
        assert_eq!(risk.homicidal_ideation.value, HomicidalIdeation::None);
        assert_eq!(risk.self_harm.value, SelfHarm::None);
        assert_eq!(risk.safety_plan_status.value, SafetyPlanStatus::Reviewed);

        let value = serde_json::to_value(&risk).unwrap();
        assert_eq!(value["suicidal_ideation"]["value"], "passive");
        assert_eq!(value["risk_level_overall"]["value"], "moderate");
    }

    #[test]
    fn test_ordered_snapshot() {
        let risk = RiskAssessment {
            self_harm: ExtractedField::new(SelfHarm::Current, 0.7),
            ..Default::default()
        };
        let snap = risk.ordered(RiskField::SelfHarm);
        assert_eq!(snap.rank, 2);
        assert_eq!(snap.value, "current");
        assert_eq!(snap.confidence, 0.7);
    }

    #[test]
    fn test_default_risk_levels_are_unset() {
        let risk = RiskAssessment::default();
        assert!(risk.fields().iter().all(|(_, f)| !f.has_value()));
    }
}
