//! Prompts for the three generative steps.

use escoffier_core::{DraftContent, GenerationRequest, ReviewIssues};
use escoffier_models::CallParams;

/// Sampling for GenerateContent.
pub const GENERATE_PARAMS: CallParams = CallParams::new(1024, 0.7);
/// Sampling for ReviewQuality.
pub const REVIEW_PARAMS: CallParams = CallParams::new(1024, 0.3);
/// Sampling for FixIssues.
pub const FIX_PARAMS: CallParams = CallParams::new(1024, 0.5);

/// System prompt for drafting a recipe.
pub const GENERATE_SYSTEM: &str = "\
You are an experienced chef who writes recipes home cooks can follow.

Every recipe you write must satisfy these rules:
1. FOOD TYPE: use exactly one of BREAKFAST, LUNCH, DINNER, DESSERT, SNACK or DRINK.
2. INGREDIENTS: each ingredient has a clear name, a specific amount (\"2\", \"1/2\", \"3-4\") \
and a standard unit (cups, tablespoons, teaspoons, grams, ounces, pieces, cloves).
3. INSTRUCTIONS: clear ordered steps, with times and temperatures where they matter.
4. REALISM: only ingredients and techniques that work together.

Good ingredient: {\"name\": \"olive oil\", \"amount\": \"2\", \"unit\": \"tablespoons\"}
Bad ingredient: {\"name\": \"oil\", \"amount\": \"some\", \"unit\": \"\"}";

/// System prompt for critiquing a draft.
pub const REVIEW_SYSTEM: &str = "\
You review machine-written recipes for problems that would make them confusing, \
impractical or unusable. Check, most important first:

1. FOOD TYPE: does the category fit the dish? Pancakes are BREAKFAST, a pasta dish is not a DRINK.
2. INGREDIENT FORMAT: does every main ingredient have a specific amount and a proper unit? \
Are the amounts plausible?
3. REALISM: can the dish be made from the listed ingredients and steps? \
Is anything dangerous, impossible or missing?
4. INSTRUCTIONS: are the steps ordered and clear, with times and temperatures where needed?

Be strict but fair. Set needs_fixes to true only for problems a cook would actually hit.";

/// System prompt for repairing a draft.
pub const FIX_SYSTEM: &str = "\
You edit machine-written recipes. You receive a recipe and a list of problems found in review.

Return a corrected recipe that resolves every listed problem:
- correct an unsuitable food type
- give every ingredient a specific amount and unit
- replace implausible amounts with sensible ones
- clarify unclear instructions
- keep the dish recognisably the same

Record each change you make in changes_made.";

/// User prompt asking for one recipe.
pub fn generate_user_prompt(request: &GenerationRequest) -> String {
    let mut parts = vec![format!("Create 1 recipe for: {}\n", request.prompt)];

    if let Some(ingredients) = non_empty(&request.ingredients) {
        parts.push(format!("Must use these ingredients: {}", ingredients.join(", ")));
    }
    if let Some(restrictions) = non_empty(&request.dietary_restrictions) {
        parts.push(format!(
            "Dietary restrictions to follow: {}",
            restrictions.join(", ")
        ));
    }

    parts.push(
        "\nRemember:\n\
         - Every ingredient needs a specific amount AND unit\n\
         - Food type must be one of: BREAKFAST, LUNCH, DINNER, DESSERT, SNACK, DRINK\n\
         - Instructions should be clear and in order\n\
         - The recipe must be realistic and cookable\n"
            .to_string(),
    );

    parts.join("\n")
}

/// User prompt embedding the draft as a one-element JSON array.
pub fn review_user_prompt(draft: &DraftContent) -> String {
    let drafts = serde_json::to_string_pretty(&[draft]).unwrap_or_default();
    format!(
        "Review the following generated recipe(s) for quality issues:\n\n\
         {drafts}\n\n\
         For each recipe, report any problems with food type, ingredients, realism and \
         instructions. Be specific about what needs to change."
    )
}

/// User prompt embedding the draft and the issue-bearing review fields.
pub fn fix_user_prompt(draft: &DraftContent, issues: &ReviewIssues) -> String {
    let draft = serde_json::to_string_pretty(draft).unwrap_or_default();
    let issues = serde_json::to_string_pretty(issues).unwrap_or_default();
    format!(
        "Fix the following recipe based on the identified issues:\n\n\
         ORIGINAL RECIPE:\n{draft}\n\n\
         ISSUES TO FIX:\n{issues}\n\n\
         Return the corrected recipe with every issue addressed, and list each change you made."
    )
}

fn non_empty(items: &Option<Vec<String>>) -> Option<&[String]> {
    items.as_deref().filter(|items| !items.is_empty())
}
