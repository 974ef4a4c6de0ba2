use crate::models::request::GameRequest;

/// Advisory matchmaking filter, not access control. An unrated player is
/// never excluded; an absent bound is unbounded on that side.
pub fn within_skill_range(request: &GameRequest, rating: Option<i32>) -> bool {
    if request.skill_min.is_none() && request.skill_max.is_none() {
        return true;
    }
    let Some(rating) = rating else {
        return true;
    };
    if request.skill_min.is_some_and(|min| rating < min) {
        return false;
    }
    if request.skill_max.is_some_and(|max| rating > max) {
        return false;
    }
    true
}
