//! Ordered rule table evaluation.

use crate::types::{Condition, PolicyRule};
use sq_core::DocumentProfile;

pub fn matches(condition: &Condition, profile: &DocumentProfile) -> bool {
    match condition {
        Condition::Always => true,
        Condition::SizeAbove(limit) => profile.size_bytes > *limit,
        Condition::SizeAtMost(limit) => profile.size_bytes <= *limit,
        Condition::NoImageContent => profile.page_count == 0 || profile.image_count == 0,
        Condition::ImageHeavy { min_images, min_pixels } => {
            profile.image_count >= *min_images || profile.largest_image_pixels > *min_pixels
        }
        Condition::AnyOf(conditions) => conditions.iter().any(|c| matches(c, profile)),
    }
}

/// First rule whose condition holds.
pub fn first_match<'a>(rules: &'a [PolicyRule], profile: &DocumentProfile) -> Option<&'a PolicyRule> {
    rules.iter().find(|rule| matches(&rule.when, profile))
}
