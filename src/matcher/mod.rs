//! Ingredient vs. dietary-restriction matching.
//!
//! Every comparison is a lower-cased substring test. A tag is resolved to
//! its term list through the static maps in [`maps`]; tags the maps do not
//! know are matched literally.

pub mod handlers;
pub mod maps;

use serde::Serialize;

use maps::{RestrictionMap, ALLERGENS, DIETARY_PREFERENCES, HEALTH_RESTRICTIONS};

pub const NO_CONFLICTS_REASON: &str = "No conflicts with your dietary profile were found.";

/// Borrowed view of a user's restriction tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Restrictions<'a> {
    pub allergies: &'a [String],
    pub dietary_preferences: &'a [String],
    pub health_restrictions: &'a [String],
}

impl Restrictions<'_> {
    pub fn is_empty(&self) -> bool {
        self.allergies.is_empty()
            && self.dietary_preferences.is_empty()
            && self.health_restrictions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Allergy,
    DietaryPreference,
    HealthRestriction,
}

impl Category {
    fn map(self) -> RestrictionMap {
        match self {
            Category::Allergy => ALLERGENS,
            Category::DietaryPreference => DIETARY_PREFERENCES,
            Category::HealthRestriction => HEALTH_RESTRICTIONS,
        }
    }

    fn describe(self, ingredient: &str, tag: &str) -> String {
        match self {
            Category::Allergy => {
                format!("Contains {ingredient}, which conflicts with your {tag} allergy")
            }
            Category::DietaryPreference => {
                format!("Contains {ingredient}, which is not compatible with your {tag} diet")
            }
            Category::HealthRestriction => {
                format!("Contains {ingredient}, which is not recommended with {tag}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub safe: bool,
    pub reason: String,
    /// First conflict found in each category, in category order.
    pub reasons: Vec<String>,
    pub incompatible_ingredients: Vec<String>,
}

/// Map terms for `tag`: the exact key, else the first key contained in the
/// tag ("peanuts" -> "peanut"), else every key containing the tag ("nut" ->
/// "peanut" + "tree nut"). The tag itself is always matched as well.
fn terms_for(map: RestrictionMap, tag: &str) -> Vec<&'static str> {
    let exact = map
        .iter()
        .find(|(key, _)| *key == tag)
        .or_else(|| map.iter().find(|(key, _)| tag.contains(key)));
    match exact {
        Some((_, terms)) => terms.to_vec(),
        None => map
            .iter()
            .filter(|(key, _)| key.contains(tag))
            .flat_map(|(_, terms)| terms.iter().copied())
            .collect(),
    }
}

fn conflicts(ingredient: &str, terms: &[&str], tag: &str) -> bool {
    ingredient.contains(tag) || terms.iter().any(|t| ingredient.contains(t))
}

pub fn match_ingredients(ingredients: &[String], restrictions: Restrictions<'_>) -> MatchResult {
    let lowered: Vec<String> = ingredients.iter().map(|i| i.trim().to_lowercase()).collect();
    let mut reasons = Vec::new();
    let mut hit = vec![false; ingredients.len()];

    let categories = [
        (Category::Allergy, restrictions.allergies),
        (Category::DietaryPreference, restrictions.dietary_preferences),
        (Category::HealthRestriction, restrictions.health_restrictions),
    ];

    for (category, tags) in categories {
        let mut first: Option<String> = None;
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if tag.is_empty() {
                continue;
            }
            let terms = terms_for(category.map(), &tag);
            for (idx, ingredient) in lowered.iter().enumerate() {
                if ingredient.is_empty() || !conflicts(ingredient, &terms, &tag) {
                    continue;
                }
                hit[idx] = true;
                if first.is_none() {
                    first = Some(category.describe(ingredients[idx].trim(), &tag));
                }
            }
        }
        reasons.extend(first);
    }

    let mut incompatible_ingredients: Vec<String> = Vec::new();
    for (idx, ingredient) in ingredients.iter().enumerate() {
        if hit[idx] && !incompatible_ingredients.iter().any(|i| i == ingredient) {
            incompatible_ingredients.push(ingredient.clone());
        }
    }

    let safe = incompatible_ingredients.is_empty();
    let reason = if safe {
        NO_CONFLICTS_REASON.to_string()
    } else {
        reasons.join("; ")
    };

    MatchResult {
        safe,
        reason,
        reasons,
        incompatible_ingredients,
    }
}

/// Tri-state verdict stored on a scan: `Some(true)` safe, `Some(false)`
/// unsafe, `None` caution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyVerdict {
    pub is_safe: Option<bool>,
    pub safety_reason: String,
    pub unsafe_reasons: Vec<String>,
    pub incompatible_ingredients: Vec<String>,
}

pub fn check_food_safety(
    food_name: &str,
    ingredients: &[String],
    restrictions: Restrictions<'_>,
) -> SafetyVerdict {
    let food = food_name.trim();
    let food = if food.is_empty() { "This food" } else { food };

    if ingredients.iter().all(|i| i.trim().is_empty()) {
        return SafetyVerdict {
            is_safe: None,
            safety_reason: format!("Could not identify the ingredients of {food}; eat with caution"),
            unsafe_reasons: Vec::new(),
            incompatible_ingredients: Vec::new(),
        };
    }

    let result = match_ingredients(ingredients, restrictions);
    if result.safe {
        SafetyVerdict {
            is_safe: Some(true),
            safety_reason: format!("{food}: {}", result.reason),
            unsafe_reasons: Vec::new(),
            incompatible_ingredients: Vec::new(),
        }
    } else {
        SafetyVerdict {
            is_safe: Some(false),
            safety_reason: format!("{food} is not safe for you. {}", result.reason),
            unsafe_reasons: result.reasons,
            incompatible_ingredients: result.incompatible_ingredients,
        }
    }
}

impl SafetyVerdict {
    /// Fold in the model's own opinion. Reasons are unioned. A matcher
    /// conflict always wins; otherwise the model may downgrade to unsafe or
    /// to caution (`None`), never upgrade caution to safe.
    pub fn merge_model(mut self, model_is_safe: Option<bool>, model_reasons: &[String]) -> Self {
        for r in model_reasons {
            let r = r.trim();
            if !r.is_empty() && !self.unsafe_reasons.iter().any(|x| x.eq_ignore_ascii_case(r)) {
                self.unsafe_reasons.push(r.to_string());
            }
        }

        if self.is_safe == Some(false) {
            return self;
        }
        match model_is_safe {
            Some(false) => {
                self.is_safe = Some(false);
                self.safety_reason = if self.unsafe_reasons.is_empty() {
                    "The analysis flagged this food as unsafe for your profile".to_string()
                } else {
                    self.unsafe_reasons.join("; ")
                };
            }
            None if self.is_safe == Some(true) => {
                self.is_safe = None;
                self.safety_reason =
                    "The analysis could not confirm this food is safe; eat with caution".to_string();
            }
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn safe_when_no_restrictions() {
        let ingredients = tags(&["peanut butter", "bread"]);
        let res = match_ingredients(&ingredients, Restrictions::default());
        assert!(res.safe);
        assert_eq!(res.reason, NO_CONFLICTS_REASON);
        assert!(res.incompatible_ingredients.is_empty());
    }

    #[test]
    fn allergy_matches_case_insensitively() {
        let allergies = tags(&["Peanuts"]);
        let ingredients = tags(&["Rice", "Roasted PEANUT sauce"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        assert!(!res.safe);
        assert_eq!(res.incompatible_ingredients, vec!["Roasted PEANUT sauce"]);
        assert_eq!(
            res.reason,
            "Contains Roasted PEANUT sauce, which conflicts with your peanuts allergy"
        );
    }

    #[test]
    fn first_match_per_category_wins_but_all_ingredients_accumulate() {
        let prefs = tags(&["vegetarian"]);
        let ingredients = tags(&["chicken breast", "lettuce", "bacon bits"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions { dietary_preferences: &prefs, ..Default::default() },
        );
        assert_eq!(res.reasons.len(), 1);
        assert!(res.reasons[0].contains("chicken breast"));
        assert_eq!(res.incompatible_ingredients, vec!["chicken breast", "bacon bits"]);
    }

    #[test]
    fn one_reason_per_category_and_ingredient_listed_once() {
        let allergies = tags(&["dairy"]);
        let prefs = tags(&["vegan"]);
        let health = tags(&["lactose intolerance"]);
        let ingredients = tags(&["cheddar cheese", "tomato"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions {
                allergies: &allergies,
                dietary_preferences: &prefs,
                health_restrictions: &health,
            },
        );
        assert_eq!(res.reasons.len(), 3);
        assert_eq!(res.incompatible_ingredients, vec!["cheddar cheese"]);
        assert!(res.reasons[2].contains("lactose intolerance"));
    }

    #[test]
    fn unknown_tag_is_matched_literally() {
        let allergies = tags(&["Strawberry"]);
        let ingredients = tags(&["strawberry jam", "cream"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        assert_eq!(res.incompatible_ingredients, vec!["strawberry jam"]);
    }

    #[test]
    fn partial_tag_covers_every_entry_containing_it() {
        let allergies = tags(&["nut"]);
        let ingredients = tags(&["walnut brownie", "cashew", "rice"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        assert!(!res.safe);
        assert_eq!(res.incompatible_ingredients, vec!["walnut brownie", "cashew"]);
    }

    #[test]
    fn mapped_tag_still_matches_itself() {
        let allergies = tags(&["tree nuts"]);
        let ingredients = tags(&["tree nuts mix", "almond milk", "oats"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        assert_eq!(res.incompatible_ingredients, vec!["tree nuts mix", "almond milk"]);
    }

    #[test]
    fn substring_false_positive_is_kept() {
        let allergies = tags(&["egg"]);
        let ingredients = tags(&["grilled eggplant"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        assert!(!res.safe);
    }

    #[test]
    fn safe_iff_no_incompatible_ingredients() {
        let allergies = tags(&["shellfish", "sesame"]);
        let health = tags(&["diabetes"]);
        let cases = [
            (tags(&["shrimp", "rice"]), false),
            (tags(&["rice", "broccoli"]), true),
            (tags(&["tahini dressing"]), false),
            (tags(&["brown sugar glaze"]), false),
            (tags(&[]), true),
        ];
        for (ingredients, expected) in cases {
            let res = match_ingredients(
                &ingredients,
                Restrictions {
                    allergies: &allergies,
                    health_restrictions: &health,
                    ..Default::default()
                },
            );
            assert_eq!(res.safe, expected, "{ingredients:?}");
            assert_eq!(res.safe, res.incompatible_ingredients.is_empty());
        }
    }

    #[test]
    fn blank_tags_are_ignored() {
        let allergies = tags(&["  ", ""]);
        let ingredients = tags(&["anything"]);
        let res = match_ingredients(
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        assert!(res.safe);
    }

    #[test]
    fn check_food_safety_unsafe_mentions_food() {
        let allergies = tags(&["fish"]);
        let ingredients = tags(&["Salmon fillet", "lemon"]);
        let v = check_food_safety(
            "Grilled Salmon",
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        assert_eq!(v.is_safe, Some(false));
        assert!(v.safety_reason.starts_with("Grilled Salmon is not safe for you."));
        assert_eq!(v.incompatible_ingredients, vec!["Salmon fillet"]);
    }

    #[test]
    fn check_food_safety_without_ingredients_is_caution() {
        let v = check_food_safety("Mystery stew", &[], Restrictions::default());
        assert_eq!(v.is_safe, None);
    }

    #[test]
    fn merge_model_never_overrides_matcher_conflict() {
        let allergies = tags(&["peanut"]);
        let ingredients = tags(&["peanut"]);
        let v = check_food_safety(
            "Satay",
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        )
        .merge_model(Some(true), &[]);
        assert_eq!(v.is_safe, Some(false));
    }

    #[test]
    fn merge_model_can_downgrade_to_unsafe_or_caution() {
        let ingredients = tags(&["rice"]);
        let base = check_food_safety("Rice bowl", &ingredients, Restrictions::default());
        assert_eq!(base.is_safe, Some(true));

        let unsafe_v = base.clone().merge_model(Some(false), &tags(&["Likely fried in lard"]));
        assert_eq!(unsafe_v.is_safe, Some(false));
        assert_eq!(unsafe_v.unsafe_reasons, vec!["Likely fried in lard"]);

        let caution = base.merge_model(None, &[]);
        assert_eq!(caution.is_safe, None);
    }

    #[test]
    fn merge_model_keeps_reasons_of_a_safe_reply() {
        let ingredients = tags(&["rice"]);
        let v = check_food_safety("Rice bowl", &ingredients, Restrictions::default())
            .merge_model(Some(true), &tags(&["May be cooked in shared fryer"]));
        assert_eq!(v.is_safe, Some(true));
        assert_eq!(v.unsafe_reasons, vec!["May be cooked in shared fryer"]);
    }

    #[test]
    fn model_cannot_clear_caution_without_ingredients() {
        let v = check_food_safety("Mystery stew", &[], Restrictions::default())
            .merge_model(Some(true), &[]);
        assert_eq!(v.is_safe, None);
    }

    #[test]
    fn merge_model_dedupes_reasons() {
        let allergies = tags(&["milk"]);
        let ingredients = tags(&["milk"]);
        let v = check_food_safety(
            "Latte",
            &ingredients,
            Restrictions { allergies: &allergies, ..Default::default() },
        );
        let existing = v.unsafe_reasons[0].to_uppercase();
        let merged = v.merge_model(Some(false), &[existing, "Contains caffeine".into()]);
        assert_eq!(merged.unsafe_reasons.len(), 2);
    }
}
