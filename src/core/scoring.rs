use crate::models::{
    BasicPreference, CriteriaWeights, LifestylePreference, Profile, ScoreOutcome, UserSnapshot,
};

/// Guest-policy ordinals this far apart or closer still earn the guest points
const GUEST_POLICY_TOLERANCE: u8 = 1;

/// Calculate the compatibility (0-100) between two users
///
/// Scoring formula:
/// score = round(100 * earned / total) where earned sums the weight of every
/// satisfied criterion:
///     age mutual fit         # each age inside the other's window
///     budget overlap         # ranges intersect
///     gender mutual fit      # each preference is "any" or the other's gender
///     sleep schedule equal
///     cleanliness equal
///     smoking and pets equal # all or nothing
///     guest policy close     # ordinal difference <= 1
///
/// Missing records short-circuit to a fixed outcome instead of a partial score.
pub fn compatibility_score(
    a: &UserSnapshot,
    b: &UserSnapshot,
    weights: &CriteriaWeights,
) -> ScoreOutcome {
    let (Some(profile_a), Some(profile_b)) = (&a.profile, &b.profile) else {
        return ScoreOutcome::ProfileMissing;
    };

    let (Some(basic_a), Some(lifestyle_a), Some(basic_b), Some(lifestyle_b)) =
        (&a.basic, &a.lifestyle, &b.basic, &b.lifestyle)
    else {
        return ScoreOutcome::PreferencesMissing;
    };

    let satisfied = [
        ages_fit(profile_a, basic_a, profile_b, basic_b),
        budgets_overlap(basic_a, basic_b),
        genders_fit(profile_a, basic_a, profile_b, basic_b),
        lifestyle_a.sleep_schedule == lifestyle_b.sleep_schedule,
        lifestyle_a.cleanliness == lifestyle_b.cleanliness,
        habits_match(lifestyle_a, lifestyle_b),
        guest_policies_close(lifestyle_a, lifestyle_b),
    ];

    // Summed in u64 so any set of u32 weights fits
    let (earned, total) = satisfied
        .iter()
        .zip(weights.as_array())
        .fold((0u64, 0u64), |(earned, total), (&hit, weight)| {
            let weight = u64::from(weight);
            (if hit { earned + weight } else { earned }, total + weight)
        });

    ScoreOutcome::Computed(to_percentage(earned, total))
}

/// Round-half-up percentage, clamped to 100
#[inline]
fn to_percentage(earned: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let earned = earned.min(total);
    ((earned * 200 + total) / (total * 2)).min(100) as u8
}

#[inline]
fn ages_fit(
    profile_a: &Profile,
    basic_a: &BasicPreference,
    profile_b: &Profile,
    basic_b: &BasicPreference,
) -> bool {
    basic_b.accepts_age(profile_a.age) && basic_a.accepts_age(profile_b.age)
}

#[inline]
fn budgets_overlap(basic_a: &BasicPreference, basic_b: &BasicPreference) -> bool {
    let (min_a, max_a) = basic_a.budget_bounds();
    let (min_b, max_b) = basic_b.budget_bounds();
    min_a <= max_b && max_a >= min_b
}

#[inline]
fn genders_fit(
    profile_a: &Profile,
    basic_a: &BasicPreference,
    profile_b: &Profile,
    basic_b: &BasicPreference,
) -> bool {
    basic_a.gender_preference.accepts(profile_b.gender)
        && basic_b.gender_preference.accepts(profile_a.gender)
}

#[inline]
fn habits_match(a: &LifestylePreference, b: &LifestylePreference) -> bool {
    a.smoking == b.smoking && a.pets == b.pets
}

#[inline]
fn guest_policies_close(a: &LifestylePreference, b: &LifestylePreference) -> bool {
    a.guest_policy.ordinal().abs_diff(b.guest_policy.ordinal()) <= GUEST_POLICY_TOLERANCE
}
