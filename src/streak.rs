use crate::errors::TrackerError;
use crate::models::{HabitId, Streak, Task, TaskStatus};

/// What a single resolution did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Extended { new_longest: Option<u32> },
    Broken,
}

impl Streak {
    pub fn new(habit_id: HabitId) -> Self {
        Self {
            habit_id,
            current_streak: 0,
            longest_streak: 0,
            num_of_completed_tasks: 0,
            num_of_failed_tasks: 0,
        }
    }

    pub fn on_completed(&mut self) -> StreakChange {
        self.current_streak += 1;
        self.num_of_completed_tasks += 1;
        if self.current_streak > self.longest_streak {
            self.longest_streak = self.current_streak;
            StreakChange::Extended {
                new_longest: Some(self.longest_streak),
            }
        } else {
            StreakChange::Extended { new_longest: None }
        }
    }

    pub fn on_failed(&mut self) -> StreakChange {
        self.current_streak = 0;
        self.num_of_failed_tasks += 1;
        StreakChange::Broken
    }

    /// Applies a resolved task; pending tasks leave the streak untouched.
    pub fn apply(&mut self, status: TaskStatus) -> Option<StreakChange> {
        match status {
            TaskStatus::Pending => None,
            TaskStatus::Completed => Some(self.on_completed()),
            TaskStatus::Failed => Some(self.on_failed()),
        }
    }

    /// Rebuilds the streak from the task history in due-date order.
    pub fn derive(habit_id: HabitId, tasks: &[Task]) -> Self {
        let mut ordered: Vec<&Task> = tasks.iter().collect();
        ordered.sort_by_key(|task| (task.due_date, task.task_number));

        let mut streak = Streak::new(habit_id);
        for task in ordered {
            streak.apply(task.status);
        }
        streak
    }

    /// Checks the incrementally maintained streak against a full re-derivation.
    pub fn verify(&self, tasks: &[Task]) -> Result<(), TrackerError> {
        if self.longest_streak < self.current_streak {
            return Err(TrackerError::InvariantViolated(format!(
                "habit {}: longest streak {} below current streak {}",
                self.habit_id, self.longest_streak, self.current_streak
            )));
        }
        let derived = Streak::derive(self.habit_id, tasks);
        if &derived != self {
            return Err(TrackerError::InvariantViolated(format!(
                "habit {}: streak {:?} disagrees with task history {:?}",
                self.habit_id, self, derived
            )));
        }
        Ok(())
    }
}
