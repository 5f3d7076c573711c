// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Standards Profile
//!
//! A standards profile parameterizes one evaluation: which industry narrative
//! to apply, which task is being verified, how strict to be, which plain
//! language rules the customer added and which reference documents back them.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Profile aggregate, its vocabularies and the seeded system defaults
//!
//! Profiles are soft-deleted only (`active = false`) so that past evaluations
//! can still name the profile they ran against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Recommended upper bound on plain language rules per profile.
pub const MAX_RECOMMENDED_RULES: usize = 50;
/// Recommended upper bound on reference document chunks per prompt.
pub const MAX_RECOMMENDED_DOCUMENTS: usize = 10;

pub const ZERO_CONFIG_PROFILE_ID: &str = "zero-config";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    Food,
    Retail,
    Logistics,
    Construction,
    Healthcare,
    #[default]
    General,
}

impl Industry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Retail => "retail",
            Self::Logistics => "logistics",
            Self::Construction => "construction",
            Self::Healthcare => "healthcare",
            Self::General => "general",
        }
    }

    /// Best-practice narrative injected into the context layer of the prompt.
    pub fn best_practices(&self) -> &'static str {
        match self {
            Self::Food => "Standard food safety practices including temperature control, cross-contamination prevention, proper hygiene, and equipment maintenance",
            Self::Retail => "Retail best practices including product display, inventory management, cleanliness, and customer safety",
            Self::Logistics => "Logistics standards including package handling, delivery verification, warehouse organization, and damage prevention",
            Self::Construction => "Construction safety and quality standards including PPE compliance, site safety, work quality, and hazard prevention",
            Self::Healthcare => "Healthcare facility standards including sanitation, biohazard handling, and infection control",
            Self::General => "General workplace standards focusing on safety, organization, cleanliness, and quality",
        }
    }

    /// Industry implied by a protocol pack sector when no profile is given.
    pub fn from_pack_sector(sector: &str) -> Self {
        match sector {
            "food_service" => Self::Food,
            "senior_living" => Self::Healthcare,
            _ => Self::General,
        }
    }
}

impl FromStr for Industry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "food" => Ok(Self::Food),
            "retail" => Ok(Self::Retail),
            "logistics" => Ok(Self::Logistics),
            "construction" => Ok(Self::Construction),
            "healthcare" => Ok(Self::Healthcare),
            "general" => Ok(Self::General),
            other => Err(format!("unknown industry '{}'", other)),
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    General,
    Receiving,
    Storage,
    Cleaning,
    Delivery,
    Inspection,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Receiving => "receiving",
            Self::Storage => "storage",
            Self::Cleaning => "cleaning",
            Self::Delivery => "delivery",
            Self::Inspection => "inspection",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Receiving => "receiving or delivery verification",
            Self::Storage => "storage area inspection",
            Self::Cleaning => "cleaning verification",
            Self::Delivery => "delivery completion verification",
            Self::Inspection => "quality and safety inspection",
            Self::General => "general compliance verification",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "receiving" => Ok(Self::Receiving),
            "storage" => Ok(Self::Storage),
            "cleaning" => Ok(Self::Cleaning),
            "delivery" => Ok(Self::Delivery),
            "inspection" => Ok(Self::Inspection),
            other => Err(format!("unknown task type '{}'", other)),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Only flag obvious, severe issues
    Low,
    #[default]
    Medium,
    /// Flag everything, resolve ambiguity toward inclusion
    High,
}

impl Strictness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Low => "Flag ONLY severe, obvious issues that pose immediate safety or quality risks. Avoid minor concerns. Be permissive and focus on critical violations only.",
            Self::Medium => "Flag issues that represent clear violations or risks. Balance between catching real problems and avoiding false positives. Use reasonable judgment.",
            Self::High => "Flag all potential issues, even minor ones. Be conservative and thorough. When in doubt about whether something is an issue, include it.",
        }
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown strictness level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileOwner {
    System,
    User(String),
}

impl ProfileOwner {
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    pub fn is_user(&self, user_id: &str) -> bool {
        matches!(self, Self::User(id) if id == user_id)
    }
}

/// A user- or system-configured evaluation policy.
///
/// `industry` and `task_type` are optional on the wire; absent values
/// degrade to `general` through the accessor methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardsProfile {
    pub id: ProfileId,
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub owner: ProfileOwner,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<Industry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,

    #[serde(default)]
    pub strictness: Strictness,

    #[serde(default)]
    pub plain_language_rules: Vec<String>,

    #[serde(default)]
    pub document_ids: Vec<String>,

    #[serde(default)]
    pub scoring_preferences: HashMap<String, serde_json::Value>,

    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StandardsProfile {
    pub fn industry(&self) -> Industry {
        self.industry.unwrap_or_default()
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type.unwrap_or_default()
    }

    pub fn is_system(&self) -> bool {
        self.owner.is_system()
    }

    pub fn is_zero_config(&self) -> bool {
        self.id.as_str() == ZERO_CONFIG_PROFILE_ID
    }

    /// Hardcoded fallback guaranteeing that no evaluation runs rule-less.
    pub fn zero_config() -> Self {
        Self::system(
            ZERO_CONFIG_PROFILE_ID,
            "Zero Config - General",
            "Default profile for any industry without specific configuration",
            Industry::General,
            TaskType::General,
            &[
                "Work should appear complete",
                "Area should be safe and organized",
                "No obvious issues should be present",
                "Standards of quality should be maintained",
            ],
        )
    }

    fn system(
        id: &str,
        name: &str,
        description: &str,
        industry: Industry,
        task_type: TaskType,
        rules: &[&str],
    ) -> Self {
        let epoch = DateTime::<Utc>::default();
        Self {
            id: ProfileId::new(id),
            name: name.to_string(),
            description: description.to_string(),
            owner: ProfileOwner::System,
            industry: Some(industry),
            task_type: Some(task_type),
            strictness: Strictness::Medium,
            plain_language_rules: rules.iter().map(|r| r.to_string()).collect(),
            document_ids: Vec::new(),
            scoring_preferences: HashMap::new(),
            active: true,
            created_at: epoch,
            updated_at: epoch,
        }
    }
}

/// System profiles seeded into every profile repository.
///
/// `(food, receiving)` is intentionally absent; receiving requests for food
/// resolve through `(food, general)`.
pub fn system_profiles() -> Vec<StandardsProfile> {
    use Industry::{Construction, Food, Healthcare, Logistics, Retail};
    use TaskType::{Cleaning, Delivery, Inspection, Storage};

    vec![
        StandardsProfile::system(
            "system-food-general",
            "Food Service - General",
            "Baseline food safety verification for kitchens and food retail",
            Food,
            TaskType::General,
            &[
                "Cold food must be held at 41°F or below and hot food at 135°F or above",
                "Raw foods must be stored below and separate from ready-to-eat foods",
                "Food contact surfaces must be clean and sanitized",
                "Handwashing stations must be stocked and accessible",
                "Chemicals must be labeled and stored away from food",
            ],
        ),
        StandardsProfile::system(
            "system-food-storage",
            "Food Service - Storage",
            "Walk-in, dry storage and shelving checks",
            Food,
            Storage,
            &[
                "All stored food must be covered, labeled and dated",
                "Food must be stored at least six inches off the floor",
                "Raw proteins must be stored on the lowest shelves",
                "Storage areas must show no evidence of pests",
            ],
        ),
        StandardsProfile::system(
            "system-food-cleaning",
            "Food Service - Cleaning",
            "Post-cleaning verification for food preparation areas",
            Food,
            Cleaning,
            &[
                "Surfaces must be free of visible residue and debris",
                "Floors and drains must be clear of standing water and food waste",
                "Cleaning tools must be stored away from food preparation areas",
                "Sanitizer containers must be labeled",
            ],
        ),
        StandardsProfile::system(
            "system-retail-general",
            "Retail - General",
            "Sales floor and stock room verification",
            Retail,
            TaskType::General,
            &[
                "Aisles and exits must be unobstructed",
                "Products must be displayed neatly with prices visible",
                "Spills and trip hazards must not be present",
            ],
        ),
        StandardsProfile::system(
            "system-logistics-delivery",
            "Logistics - Delivery",
            "Proof-of-delivery verification",
            Logistics,
            Delivery,
            &[
                "Package must be visible and placed at the delivery location",
                "Package must show no visible damage",
                "Package must be protected from weather",
            ],
        ),
        StandardsProfile::system(
            "system-construction-inspection",
            "Construction - Inspection",
            "Site safety and work quality inspection",
            Construction,
            Inspection,
            &[
                "Workers must wear required PPE including hard hats and high-visibility vests",
                "Fall protection must be in place at open edges",
                "Materials must be stored so they cannot fall or collapse",
                "Completed work must appear plumb, level and finished",
            ],
        ),
        StandardsProfile::system(
            "system-healthcare-general",
            "Healthcare - General",
            "Facility sanitation and infection control checks",
            Healthcare,
            TaskType::General,
            &[
                "Sharps and biohazard containers must be closed and not overfilled",
                "Hand hygiene stations must be stocked",
                "Clean and soiled supplies must be kept separate",
            ],
        ),
    ]
}

/// User-submitted profile contents, validated before it becomes a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub profile_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub industry: Option<String>,

    #[serde(default)]
    pub task_type: Option<String>,

    #[serde(default)]
    pub strictness_level: Option<String>,

    #[serde(default)]
    pub plain_language_rules: Vec<String>,

    #[serde(default)]
    pub document_ids: Vec<String>,

    #[serde(default)]
    pub scoring_preferences: HashMap<String, serde_json::Value>,
}

impl ProfileDraft {
    /// Collect every problem with the draft in one pass.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.profile_name.trim().is_empty() {
            errors.push("Profile name is required".to_string());
        }
        if let Some(industry) = &self.industry {
            if industry.parse::<Industry>().is_err() {
                errors.push("Invalid industry specified".to_string());
            }
        }
        if let Some(task_type) = &self.task_type {
            if task_type.parse::<TaskType>().is_err() {
                errors.push("Invalid task type specified".to_string());
            }
        }
        if let Some(strictness) = &self.strictness_level {
            if strictness.parse::<Strictness>().is_err() {
                errors.push("Invalid strictness level specified".to_string());
            }
        }
        if self.plain_language_rules.iter().any(|r| r.trim().is_empty()) {
            errors.push("Plain language rules must not be blank".to_string());
        }
        if self.document_ids.iter().any(|d| d.trim().is_empty()) {
            errors.push("Document IDs must not be blank".to_string());
        }

        errors
    }

    /// Build a user profile. Missing vocabulary fields default to `general`/`medium`.
    pub fn into_profile(self, owner_id: &str) -> Result<StandardsProfile, Vec<String>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let now = Utc::now();
        let mut profile = StandardsProfile {
            id: ProfileId::generate(),
            name: String::new(),
            description: String::new(),
            owner: ProfileOwner::User(owner_id.to_string()),
            industry: None,
            task_type: None,
            strictness: Strictness::Medium,
            plain_language_rules: Vec::new(),
            document_ids: Vec::new(),
            scoring_preferences: HashMap::new(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.apply_to(&mut profile);
        Ok(profile)
    }

    /// Overwrite the editable fields of an existing profile.
    pub fn apply_to(self, profile: &mut StandardsProfile) {
        profile.name = self.profile_name.trim().to_string();
        profile.description = self.description.unwrap_or_default();
        profile.industry = Some(
            self.industry
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        );
        profile.task_type = Some(
            self.task_type
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        );
        profile.strictness = self
            .strictness_level
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        profile.plain_language_rules = self.plain_language_rules;
        profile.document_ids = self.document_ids;
        profile.scoring_preferences = self.scoring_preferences;
        profile.updated_at = Utc::now();
    }
}
