use crate::models::{Achievement, AchievementId, HabitId};
use chrono::{DateTime, Utc};

pub fn milestone_title(streak_length: u32) -> String {
    format!("New longest streak: {streak_length}")
}

/// Appends an achievement when `new_longest_streak` beats every streak already recorded.
pub fn record_if_milestone(
    achievements: &mut Vec<Achievement>,
    next_id: &mut AchievementId,
    habit_id: HabitId,
    new_longest_streak: u32,
    at: DateTime<Utc>,
) -> Option<Achievement> {
    let best = achievements
        .iter()
        .filter(|achievement| achievement.habit_id == habit_id)
        .map(|achievement| achievement.streak_length)
        .max()
        .unwrap_or(0);
    if new_longest_streak <= best {
        return None;
    }

    *next_id += 1;
    let achievement = Achievement {
        id: *next_id,
        habit_id,
        title: milestone_title(new_longest_streak),
        date: at,
        streak_length: new_longest_streak,
    };
    achievements.push(achievement.clone());
    Some(achievement)
}
