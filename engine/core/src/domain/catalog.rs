// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Rule Catalog
//!
//! Static registry of compliance protocol packs and the individually citable
//! standards they contain. Packs are immutable reference data loaded once at
//! process start; every lookup is a pure read.
//!
//! | Type | Description |
//! |------|-------------|
//! | `ProtocolPack` | Named, versioned bundle of standards for one sector |
//! | `Standard` | One citable rule with a `Severity` weight |
//! | `RuleCatalog` | Keyed registry with the unique-code invariant enforced at construction |
//!
//! Legacy packs carry no standards of their own and point at their
//! replacement through `maps_to`; `effective_standards` follows that link.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Severity weight of a standard or finding.
///
/// Variants are declared in ascending order so the derived `Ord` is the
/// escalation order `low < medium < high < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Normalize the vocabularies returned by the reasoning service.
    ///
    /// Accepts both the standard scale and the `critical|major|minor|info`
    /// scale the analysis prompt asks for. Unknown labels map to `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" | "major" => Some(Self::High),
            "medium" | "moderate" | "minor" => Some(Self::Medium),
            "low" | "info" | "informational" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standard {
    pub code: String,
    pub title: String,
    pub category: String,
    pub severity: Severity,
    pub description: String,
}

/// Sector-specific limits attached to a pack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cold_holding_max_f: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_holding_min_f: Option<i32>,

    #[serde(default)]
    pub documentation_required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection_frequency: Option<String>,

    /// Free-form flags (e.g. `background_checks_required`)
    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolPack {
    pub id: String,
    pub name: String,
    pub version: String,
    pub sector: String,
    pub description: String,
    pub active: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<String>,

    pub standards: Vec<Standard>,
    pub constraints: PackConstraints,

    /// Replacement pack for legacy ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maps_to: Option<String>,
}

impl ProtocolPack {
    pub fn is_legacy(&self) -> bool {
        self.maps_to.is_some()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("Duplicate standard code '{code}' in pack '{pack_id}'")]
    DuplicateStandardCode { pack_id: String, code: String },

    #[error("Duplicate pack id '{0}'")]
    DuplicatePack(String),

    #[error("Pack '{pack_id}' maps to unknown pack '{target}'")]
    DanglingMapping { pack_id: String, target: String },
}

/// Immutable registry of protocol packs keyed by stable id.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    packs: BTreeMap<String, ProtocolPack>,
}

impl RuleCatalog {
    /// Build a catalog, rejecting duplicate pack ids, duplicate standard codes
    /// within a pack, and legacy mappings that point nowhere.
    pub fn new(packs: Vec<ProtocolPack>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for pack in packs {
            let mut seen = HashSet::new();
            for standard in &pack.standards {
                if !seen.insert(standard.code.as_str()) {
                    return Err(CatalogError::DuplicateStandardCode {
                        pack_id: pack.id.clone(),
                        code: standard.code.clone(),
                    });
                }
            }
            if map.contains_key(&pack.id) {
                return Err(CatalogError::DuplicatePack(pack.id));
            }
            map.insert(pack.id.clone(), pack);
        }

        for pack in map.values() {
            if let Some(target) = &pack.maps_to {
                if !map.contains_key(target) {
                    return Err(CatalogError::DanglingMapping {
                        pack_id: pack.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        Ok(Self { packs: map })
    }

    /// Catalog preloaded with the built-in sector packs
    pub fn builtin() -> Self {
        Self {
            packs: builtin_packs().into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, pack_id: &str) -> Option<&ProtocolPack> {
        self.packs.get(pack_id)
    }

    pub fn is_active(&self, pack_id: &str) -> bool {
        self.get(pack_id).map(|p| p.active).unwrap_or(false)
    }

    pub fn pack_ids(&self) -> impl Iterator<Item = &str> {
        self.packs.keys().map(String::as_str)
    }

    pub fn active_packs(&self) -> Vec<&ProtocolPack> {
        self.packs.values().filter(|p| p.active).collect()
    }

    /// Standards a pack actually enforces; legacy packs resolve through `maps_to`.
    pub fn effective_standards(&self, pack_id: &str) -> &[Standard] {
        match self.get(pack_id) {
            Some(pack) => match pack.maps_to.as_deref().and_then(|t| self.get(t)) {
                Some(target) if pack.standards.is_empty() => &target.standards,
                _ => &pack.standards,
            },
            None => &[],
        }
    }

    pub fn standards_in_category(&self, pack_id: &str, category: &str) -> Vec<&Standard> {
        self.effective_standards(pack_id)
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }

    pub fn standard_by_code(&self, pack_id: &str, code: &str) -> Option<&Standard> {
        self.effective_standards(pack_id).iter().find(|s| s.code == code)
    }

    /// Map a pre-pack sector label onto the pack that replaced it.
    pub fn legacy_sector_to_pack(sector: &str) -> &'static str {
        match sector {
            "food_safety" => "food_service_michigan_v1",
            _ => "food_service_michigan_v1",
        }
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn std_rule(code: &str, title: &str, category: &str, severity: Severity, description: &str) -> Standard {
    Standard {
        code: code.to_string(),
        title: title.to_string(),
        category: category.to_string(),
        severity,
        description: description.to_string(),
    }
}

fn nationwide(id: &str, name: &str, sector: &str, description: &str) -> ProtocolPack {
    ProtocolPack {
        id: id.to_string(),
        name: name.to_string(),
        version: "1.0.0".to_string(),
        sector: sector.to_string(),
        description: description.to_string(),
        active: true,
        coverage: Some("nationwide".to_string()),
        standards: vec![],
        constraints: PackConstraints::default(),
        maps_to: None,
    }
}

fn builtin_packs() -> Vec<ProtocolPack> {
    use Severity::*;

    let mut food = nationwide(
        "food_service_nationwide_v1",
        "Food Service & Retail - Nationwide",
        "food_service",
        "FDA Food Code compliance for restaurants, grocery stores, and food retail establishments nationwide",
    );
    food.standards = vec![
        std_rule("FDA-3-501.16", "Time/Temperature Control for Safety Food, Hot and Cold Holding", "temperature_control", Critical,
            "Cold holding must be at 41°F or below, hot holding at 135°F or above"),
        std_rule("FDA-3-302.11", "Food Separation and Cross-Contamination Prevention", "cross_contamination", Critical,
            "Separation of raw and ready-to-eat foods, proper storage practices"),
        std_rule("FDA-4-601.11", "Equipment and Food-Contact Surface Sanitation", "equipment_facilities", High,
            "Clean surfaces and proper equipment maintenance"),
        std_rule("FDA-2-301.11", "Hand Hygiene and Handwashing", "personal_hygiene", High,
            "Proper handwashing compliance and procedures"),
        std_rule("FDA-7-206.11", "Chemical Storage and Labeling", "chemical_storage", Critical,
            "Proper chemical storage away from food and correct labeling"),
        std_rule("FDA-6-202.11", "Pest Control and Prevention", "pest_control", Medium,
            "Evidence of pests and proper exclusion measures"),
        std_rule("FDA-3-602.11", "Food Labeling and Date Marking", "food_labeling", Medium,
            "Date marking and proper food identification"),
        std_rule("FDA-2-201.11", "Employee Health and Illness Reporting", "employee_health", Critical,
            "Illness reporting and employee exclusion criteria"),
    ];
    food.constraints = PackConstraints {
        cold_holding_max_f: Some(41),
        hot_holding_min_f: Some(135),
        documentation_required: true,
        ..Default::default()
    };

    let mut senior = nationwide(
        "senior_living_facilities_v1",
        "Senior Living & Assisted Care - Nationwide",
        "senior_living",
        "CMS and state compliance for assisted living, memory care, and senior housing facilities",
    );
    senior.standards = vec![
        std_rule("CMS-483.10", "Resident Rights", "resident_care", High,
            "Dignity, privacy, and self-determination compliance"),
        std_rule("CMS-483.25", "Quality of Care - Accident Prevention", "safety", Critical,
            "Fall prevention, hazard identification, safe environment"),
        std_rule("CMS-483.35", "Nursing Services", "staffing", High,
            "Adequate staffing, proper supervision, care documentation"),
        std_rule("CMS-483.45", "Pharmacy Services", "medication", Critical,
            "Medication storage, administration, and error prevention"),
        std_rule("CMS-483.60", "Food and Nutrition Services", "nutrition", High,
            "Meal service, dietary needs, food safety"),
        std_rule("CMS-483.65", "Infection Prevention and Control", "infection_control", Critical,
            "Infection control program, outbreak prevention, sanitation"),
    ];
    senior.constraints = PackConstraints {
        documentation_required: true,
        flags: vec!["care_plan_compliance".to_string()],
        ..Default::default()
    };

    let mut childcare = nationwide(
        "childcare_facilities_v1",
        "Child Care & Daycare - Nationwide",
        "childcare",
        "State licensing compliance for daycare, preschool, and child care centers",
    );
    childcare.standards = vec![
        std_rule("CCDF-98.41", "Health and Safety Standards", "health_safety", Critical,
            "Safe environment, hazard prevention, emergency preparedness"),
        std_rule("CCDF-98.43", "Child-Staff Ratios", "staffing", Critical,
            "Proper supervision ratios, staff qualifications, background checks"),
        std_rule("STATE-SLEEP", "Safe Sleep Practices", "infant_safety", Critical,
            "Back-to-sleep positioning, crib safety, SIDS prevention"),
        std_rule("STATE-NUTRITION", "Nutrition and Meal Service", "nutrition", High,
            "Age-appropriate meals, allergies, food safety"),
        std_rule("STATE-SANITATION", "Facility Sanitation", "sanitation", High,
            "Diaper changing, handwashing, toy cleaning, bathroom cleanliness"),
        std_rule("STATE-PLAYGROUND", "Playground and Outdoor Safety", "outdoor_safety", High,
            "Equipment safety, surfacing, supervision, hazards"),
    ];
    childcare.constraints = PackConstraints {
        documentation_required: true,
        flags: vec!["background_checks_required".to_string()],
        ..Default::default()
    };

    let mut property = nationwide(
        "property_management_v1",
        "Property Management & Housing - Nationwide",
        "property_management",
        "HUD and local housing code compliance for apartment complexes and rental properties",
    );
    property.standards = vec![
        std_rule("HUD-24-CFR-5.703", "Housing Quality Standards", "habitability", High,
            "Safe and sanitary housing conditions"),
        std_rule("IRC-R315", "Smoke and Carbon Monoxide Alarms", "fire_safety", Critical,
            "Working alarms, proper placement, testing"),
        std_rule("IRC-E3901", "Electrical Safety", "electrical", Critical,
            "Safe wiring, GFCI outlets, panel access"),
        std_rule("IPC-P2902", "Plumbing Fixtures", "plumbing", High,
            "Working fixtures, hot water, no leaks"),
        std_rule("IRC-R302", "Fire Separation", "fire_safety", Critical,
            "Fire-rated walls, proper exits, egress windows"),
        std_rule("IPMC-304", "Exterior Structure Maintenance", "maintenance", Medium,
            "Roof, siding, gutters, foundation integrity"),
    ];
    property.constraints = PackConstraints {
        inspection_frequency: Some("annual".to_string()),
        flags: vec!["tenant_notification_required".to_string()],
        ..Default::default()
    };

    let mut fitness = nationwide(
        "fitness_facilities_v1",
        "Fitness Centers & Gyms - Nationwide",
        "fitness",
        "Health department and safety compliance for gyms, fitness studios, and wellness centers",
    );
    fitness.standards = vec![
        std_rule("HEALTH-GYM-001", "Equipment Sanitation", "sanitation", High,
            "Regular cleaning, sanitizing stations, equipment maintenance"),
        std_rule("HEALTH-GYM-002", "Locker Room and Shower Facilities", "facilities", High,
            "Cleanliness, proper ventilation, mold prevention"),
        std_rule("POOL-265-CMR-7", "Pool and Spa Safety", "aquatics", Critical,
            "Water chemistry, lifeguard presence, safety equipment"),
        std_rule("OSHA-BLOODBORNE", "Bloodborne Pathogen Exposure", "health_safety", Critical,
            "First aid kits, AED availability, exposure control plan"),
        std_rule("FITNESS-EQUIP-001", "Equipment Safety and Maintenance", "equipment", High,
            "Regular inspections, proper assembly, warning labels"),
        std_rule("HEALTH-GYM-003", "Air Quality and Ventilation", "environmental", Medium,
            "Proper HVAC, air circulation, temperature control"),
    ];
    fitness.constraints = PackConstraints {
        inspection_frequency: Some("quarterly".to_string()),
        documentation_required: true,
        ..Default::default()
    };

    let michigan = ProtocolPack {
        id: "food_service_michigan_v1".to_string(),
        name: "Food Service - Michigan Food Code (Legacy)".to_string(),
        version: "1.0.0".to_string(),
        sector: "food_service".to_string(),
        description: "Michigan Food Code compliance - Legacy pack, use food_service_nationwide_v1".to_string(),
        active: true,
        coverage: None,
        standards: vec![],
        constraints: PackConstraints::default(),
        maps_to: Some("food_service_nationwide_v1".to_string()),
    };

    vec![food, senior, childcare, property, fitness, michigan]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_passes_its_own_invariants() {
        let packs: Vec<ProtocolPack> = RuleCatalog::builtin().packs.into_values().collect();
        assert!(RuleCatalog::new(packs).is_ok());
    }

    #[test]
    fn test_get_and_active() {
        let catalog = RuleCatalog::builtin();
        assert!(catalog.get("food_service_nationwide_v1").is_some());
        assert!(catalog.is_active("fitness_facilities_v1"));
        assert!(catalog.get("warehouse_v1").is_none());
        assert!(!catalog.is_active("warehouse_v1"));
        assert_eq!(catalog.active_packs().len(), 6);
    }

    #[test]
    fn test_inactive_pack_is_not_active() {
        let mut pack = RuleCatalog::builtin().get("fitness_facilities_v1").cloned().unwrap();
        pack.active = false;
        let catalog = RuleCatalog::new(vec![pack]).unwrap();
        assert!(catalog.get("fitness_facilities_v1").is_some());
        assert!(!catalog.is_active("fitness_facilities_v1"));
        assert!(catalog.active_packs().is_empty());
    }

    #[test]
    fn test_standards_in_category() {
        let catalog = RuleCatalog::builtin();
        let fire = catalog.standards_in_category("property_management_v1", "fire_safety");
        let codes: Vec<&str> = fire.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["IRC-R315", "IRC-R302"]);

        assert!(catalog.standards_in_category("property_management_v1", "aquatics").is_empty());
        assert!(catalog.standards_in_category("missing", "fire_safety").is_empty());
    }

    #[test]
    fn test_legacy_pack_resolves_through_mapping() {
        let catalog = RuleCatalog::builtin();
        let legacy = catalog.get("food_service_michigan_v1").unwrap();
        assert!(legacy.is_legacy());
        assert!(legacy.standards.is_empty());

        let standards = catalog.effective_standards("food_service_michigan_v1");
        assert_eq!(standards.len(), 8);
        assert!(catalog.standard_by_code("food_service_michigan_v1", "FDA-3-501.16").is_some());
        assert_eq!(RuleCatalog::legacy_sector_to_pack("food_safety"), "food_service_michigan_v1");
    }

    #[test]
    fn test_duplicate_standard_code_rejected() {
        let mut pack = RuleCatalog::builtin().get("fitness_facilities_v1").cloned().unwrap();
        let dup = pack.standards[0].clone();
        pack.standards.push(dup);

        let err = RuleCatalog::new(vec![pack]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateStandardCode {
                pack_id: "fitness_facilities_v1".to_string(),
                code: "HEALTH-GYM-001".to_string(),
            }
        );
    }

    #[test]
    fn test_dangling_mapping_rejected() {
        let legacy = RuleCatalog::builtin().get("food_service_michigan_v1").cloned().unwrap();
        assert!(matches!(
            RuleCatalog::new(vec![legacy]),
            Err(CatalogError::DanglingMapping { .. })
        ));
    }

    #[test]
    fn test_severity_order_and_labels() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::from_label("Major"), Some(Severity::High));
        assert_eq!(Severity::from_label("minor"), Some(Severity::Medium));
        assert_eq!(Severity::from_label("info"), Some(Severity::Low));
        assert_eq!(Severity::from_label("catastrophic"), None);
    }
}
