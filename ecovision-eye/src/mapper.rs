//! Detector label to waste category mapping
//!
//! Raw detector labels are resolved against an ordered synonym table:
//! exact key first, then the first rule (in table order) whose key contains
//! the label or is contained by it. Anything else falls back to
//! [`WasteCategory::PlasticBottle`]. Mapping never fails.

use crate::types::{BoundingBox, Detection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Disposal text for names outside the taxonomy.
pub const GENERIC_DISPOSAL: &str = "Check local guidelines.";

/// Bin label for names outside the taxonomy.
pub const DEFAULT_DUSTBIN: &str = "Blue Bin";

/// The fixed waste taxonomy, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteCategory {
    PlasticBottle,
    PlasticWrapper,
    PaperCup,
    FoodWaste,
    GlassBottle,
    MetalCan,
    CardboardBox,
    Cloth,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 8] = [
        WasteCategory::PlasticBottle,
        WasteCategory::PlasticWrapper,
        WasteCategory::PaperCup,
        WasteCategory::FoodWaste,
        WasteCategory::GlassBottle,
        WasteCategory::MetalCan,
        WasteCategory::CardboardBox,
        WasteCategory::Cloth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WasteCategory::PlasticBottle => "plastic_bottle",
            WasteCategory::PlasticWrapper => "plastic_wrapper",
            WasteCategory::PaperCup => "paper_cup",
            WasteCategory::FoodWaste => "food_waste",
            WasteCategory::GlassBottle => "glass_bottle",
            WasteCategory::MetalCan => "metal_can",
            WasteCategory::CardboardBox => "cardboard_box",
            WasteCategory::Cloth => "cloth",
        }
    }

    pub fn disposal(&self) -> &'static str {
        match self {
            WasteCategory::PlasticBottle => {
                "Rinse and place in recycling bin. Remove caps if required locally."
            }
            WasteCategory::PlasticWrapper => {
                "Check local guidelines. Most thin plastic wrappers go in general waste."
            }
            WasteCategory::PaperCup => {
                "Remove plastic lining if possible. Place in paper recycling or general waste."
            }
            WasteCategory::FoodWaste => "Compost if available, otherwise place in organic waste bin.",
            WasteCategory::GlassBottle => {
                "Rinse and place in glass recycling bin. Remove labels if required."
            }
            WasteCategory::MetalCan => "Rinse and place in metal recycling bin. Crush to save space.",
            WasteCategory::CardboardBox => "Flatten and place in paper/cardboard recycling bin.",
            WasteCategory::Cloth => {
                "Donate if usable, otherwise place in textile recycling or general waste."
            }
        }
    }

    /// Exactly three reuse suggestions.
    pub fn ideas(&self) -> [&'static str; 3] {
        match self {
            WasteCategory::PlasticBottle => [
                "Cut and use as plant propagation containers",
                "Create DIY watering globes for potted plants",
                "Transform into storage containers for small items",
            ],
            WasteCategory::PlasticWrapper => [
                "Use as protective wrap for fragile items during moving",
                "Create DIY waterproof covers for outdoor items",
                "Repurpose as temporary storage bags",
            ],
            WasteCategory::PaperCup => [
                "Use as seed starter pots (biodegradable)",
                "Create small organizers for desk supplies",
                "Use for arts and crafts projects",
            ],
            WasteCategory::FoodWaste => [
                "Compost to create nutrient-rich soil",
                "Use vegetable scraps to make homemade stock",
                "Regrow vegetables from scraps (e.g., green onions, lettuce)",
            ],
            WasteCategory::GlassBottle => [
                "Repurpose as decorative vases or candle holders",
                "Use for storing homemade preserves or oils",
                "Create DIY table lamps or pendant lights",
            ],
            WasteCategory::MetalCan => [
                "Use as planters for small herbs or succulents",
                "Create rustic utensil holders or organizers",
                "Transform into candle lanterns with decorative holes",
            ],
            WasteCategory::CardboardBox => [
                "Use as drawer dividers or closet organizers",
                "Create storage boxes for seasonal items",
                "Repurpose as play structures or forts for children",
            ],
            WasteCategory::Cloth => [
                "Cut into rags for cleaning",
                "Create patchwork quilts or blankets",
                "Transform into reusable shopping bags or totes",
            ],
        }
    }

    pub fn dustbin(&self) -> &'static str {
        match self {
            WasteCategory::PlasticWrapper => "Red Bin",
            WasteCategory::FoodWaste => "Green Bin",
            WasteCategory::Cloth => "Yellow Bin",
            _ => "Blue Bin",
        }
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WasteCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WasteCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

/// How a raw label was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Partial,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMatch {
    pub category: WasteCategory,
    pub kind: MatchKind,
}

/// A detection joined with its category metadata; the public response item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedDetection {
    pub class: WasteCategory,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub disposal: String,
    pub ideas: Vec<String>,
    pub dustbin: String,
}

const RULES: &[(&str, WasteCategory)] = &[
    ("bottle", WasteCategory::PlasticBottle),
    ("plastic_bottle", WasteCategory::PlasticBottle),
    ("water_bottle", WasteCategory::PlasticBottle),
    ("pet_bottle", WasteCategory::PlasticBottle),
    ("wrapper", WasteCategory::PlasticWrapper),
    ("plastic_wrapper", WasteCategory::PlasticWrapper),
    ("bag", WasteCategory::PlasticWrapper),
    ("plastic_bag", WasteCategory::PlasticWrapper),
    ("cup", WasteCategory::PaperCup),
    ("paper_cup", WasteCategory::PaperCup),
    ("paper", WasteCategory::PaperCup),
    ("cardboard", WasteCategory::CardboardBox),
    ("cardboard_box", WasteCategory::CardboardBox),
    ("box", WasteCategory::CardboardBox),
    ("food", WasteCategory::FoodWaste),
    ("food_waste", WasteCategory::FoodWaste),
    ("organic", WasteCategory::FoodWaste),
    ("banana", WasteCategory::FoodWaste),
    ("apple", WasteCategory::FoodWaste),
    ("glass", WasteCategory::GlassBottle),
    ("glass_bottle", WasteCategory::GlassBottle),
    ("bottle_glass", WasteCategory::GlassBottle),
    ("can", WasteCategory::MetalCan),
    ("metal_can", WasteCategory::MetalCan),
    ("aluminum", WasteCategory::MetalCan),
    ("tin", WasteCategory::MetalCan),
    ("cloth", WasteCategory::Cloth),
    ("fabric", WasteCategory::Cloth),
    ("textile", WasteCategory::Cloth),
    ("clothing", WasteCategory::Cloth),
];

/// Stateless label mapper over the static synonym table.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasteMapper;

impl WasteMapper {
    pub fn new() -> Self {
        Self
    }

    /// Synonym rules in match order.
    pub fn rules(&self) -> &'static [(&'static str, WasteCategory)] {
        RULES
    }

    pub fn resolve(&self, raw_label: &str) -> LabelMatch {
        let label = raw_label.to_lowercase();

        if !label.is_empty() {
            if let Some((_, category)) = RULES.iter().find(|(key, _)| *key == label) {
                return LabelMatch {
                    category: *category,
                    kind: MatchKind::Exact,
                };
            }

            if let Some((_, category)) = RULES
                .iter()
                .find(|(key, _)| key.contains(label.as_str()) || label.contains(key))
            {
                return LabelMatch {
                    category: *category,
                    kind: MatchKind::Partial,
                };
            }
        }

        warn!("Unknown class '{}', defaulting to 'plastic_bottle'", label);
        LabelMatch {
            category: WasteCategory::PlasticBottle,
            kind: MatchKind::Default,
        }
    }

    pub fn map(&self, raw_label: &str) -> WasteCategory {
        self.resolve(raw_label).category
    }

    pub fn map_detection(&self, detection: &Detection) -> MappedDetection {
        let category = self.map(&detection.class_name);
        MappedDetection {
            class: category,
            confidence: detection.confidence,
            bbox: detection.bbox,
            class_id: detection.class_id,
            disposal: category.disposal().to_string(),
            ideas: category.ideas().iter().map(|s| s.to_string()).collect(),
            dustbin: category.dustbin().to_string(),
        }
    }

    pub fn all_classes(&self) -> Vec<&'static str> {
        WasteCategory::ALL.iter().map(|c| c.as_str()).collect()
    }

    pub fn disposal_for(&self, class_name: &str) -> &'static str {
        class_name
            .parse::<WasteCategory>()
            .map(|c| c.disposal())
            .unwrap_or(GENERIC_DISPOSAL)
    }

    pub fn ideas_for(&self, class_name: &str) -> Vec<&'static str> {
        class_name
            .parse::<WasteCategory>()
            .map(|c| c.ideas().to_vec())
            .unwrap_or_default()
    }

    pub fn dustbin_for(&self, class_name: &str) -> &'static str {
        class_name
            .parse::<WasteCategory>()
            .map(|c| c.dustbin())
            .unwrap_or(DEFAULT_DUSTBIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table_shape() {
        let mapper = WasteMapper::new();
        assert_eq!(mapper.rules().len(), 30);
        assert_eq!(mapper.rules()[0], ("bottle", WasteCategory::PlasticBottle));
        for category in WasteCategory::ALL {
            assert!(mapper.rules().iter().any(|(_, c)| *c == category));
        }
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let mapper = WasteMapper::new();
        let m = mapper.resolve("BANANA");
        assert_eq!(m.category, WasteCategory::FoodWaste);
        assert_eq!(m.kind, MatchKind::Exact);
    }

    #[test]
    fn test_partial_match_first_rule_wins() {
        let mapper = WasteMapper::new();
        // "wine glass" contains "glass"; no earlier rule matches
        let m = mapper.resolve("wine glass");
        assert_eq!(m.category, WasteCategory::GlassBottle);
        assert_eq!(m.kind, MatchKind::Partial);

        // "cardboard box" contains both "cardboard" and "box"; "cardboard" comes first
        assert_eq!(mapper.map("cardboard box"), WasteCategory::CardboardBox);

        // "tin can" hits "can" before "tin"
        assert_eq!(mapper.map("tin can"), WasteCategory::MetalCan);

        // label contained in a key
        assert_eq!(mapper.map("bott"), WasteCategory::PlasticBottle);
    }

    #[test]
    fn test_unknown_and_empty_default() {
        let mapper = WasteMapper::new();
        let m = mapper.resolve("xyz");
        assert_eq!(m.category, WasteCategory::PlasticBottle);
        assert_eq!(m.kind, MatchKind::Default);

        let m = mapper.resolve("");
        assert_eq!(m.category, WasteCategory::PlasticBottle);
        assert_eq!(m.kind, MatchKind::Default);
    }

    #[test]
    fn test_category_attributes() {
        for category in WasteCategory::ALL {
            assert_eq!(category.ideas().len(), 3);
            assert!(!category.disposal().is_empty());
        }
        assert_eq!(WasteCategory::PlasticWrapper.dustbin(), "Red Bin");
        assert_eq!(WasteCategory::FoodWaste.dustbin(), "Green Bin");
        assert_eq!(WasteCategory::Cloth.dustbin(), "Yellow Bin");
        assert_eq!(WasteCategory::MetalCan.dustbin(), "Blue Bin");
    }

    #[test]
    fn test_name_lookups_fall_back() {
        let mapper = WasteMapper::new();
        assert_eq!(mapper.disposal_for("unknown"), GENERIC_DISPOSAL);
        assert!(mapper.ideas_for("unknown").is_empty());
        assert_eq!(mapper.dustbin_for("unknown"), DEFAULT_DUSTBIN);
        assert_eq!(mapper.dustbin_for("food_waste"), "Green Bin");
        assert_eq!(mapper.ideas_for("cloth").len(), 3);
    }

    #[test]
    fn test_category_serde_snake_case() {
        let json = serde_json::to_string(&WasteCategory::CardboardBox).unwrap();
        assert_eq!(json, "\"cardboard_box\"");
        assert_eq!("metal_can".parse::<WasteCategory>(), Ok(WasteCategory::MetalCan));
        assert!("Metal_Can".parse::<WasteCategory>().is_err());
    }
}
