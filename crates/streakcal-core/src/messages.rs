//! Day messages: themed pools and milestone overrides.
//!
//! Milestones are checked first and never cycle. Otherwise the message comes
//! from the habit's pool, addressed cyclically so day 1 is always the first
//! entry.

use crate::habit::Habit;

pub const GENERAL: &[&str] = &[
    "Kept the streak alive 🔁",
    "Commitment Continues 💥",
    "Progress, Not Perfection 📈",
    "One Step at a Time 👣",
    "Showed Up Today ✅",
    "Staying on Track 🎯",
    "Consistency is Key 🔑",
    "Another Day Strong 💪",
    "Building Momentum 🚀",
    "Focus Forward 🎯",
];

pub const GROWTH: &[&str] = &[
    "Watering the Habit 🌱",
    "Growing Stronger Each Day 🌿",
    "Another Brick in the Wall 🧱",
    "Building Discipline 🔨",
    "Nurturing Growth 🌳",
    "Planting Seeds of Success 🌱",
    "Strengthening Roots 🌳",
    "Blooming Daily 🌸",
    "Cultivating Excellence 🌟",
    "Harvesting Progress 🌾",
];

pub const SOBRIETY: &[&str] = &[
    "I will not drink today 💪",
    "I’m staying sober with you today 🫱🫲",
    "Clear mind, steady path 🧠",
    "One day at a time 🙏",
    "Today, I choose sobriety 🌤️",
    "Sober and strong, just for today 🦁",
    "I’m free from alcohol today 🕊️",
    "Today I live life on my terms 🎯",
    "No drinks, no regrets 🌅",
    "I’m sober and grateful 🙌",
    "Just for today, I will not drink ⛅",
    "Showing up sober, again 💎",
    "Sober today, stronger tomorrow 🧱",
    "Choosing clarity today 🌱",
    "Another day, no alcohol needed 🛡️",
];

pub const MINIMAL: &[&str] = &[
    "✅", "🟢", "🔘", "⏺️", "➕", "🟩", "📍", "🪙", "📅", "📈", "⚪", "🔲", "🟠", "🧿", "🪩",
];

const SOBRIETY_MILESTONES: &[(u32, &str)] = &[
    (1, "First Day Sober 🌱"),
    (3, "Three Days Strong 💪"),
    (7, "One Week Sober 🎉"),
    (14, "Two Weeks Sober 🏆"),
    (21, "Three Weeks Sober 🧠"),
    (30, "One Month Sober 📅"),
    (60, "Two Months Sober 🔥"),
    (90, "Three Months Sober 🎯"),
    (100, "100 Days Sober 💎"),
    (180, "Six Months Sober 🦸"),
    (365, "One Year Sober 🎊"),
    (500, "500 Days Sober ⚡"),
    (730, "Two Years Sober 🎯"),
    (1000, "1000 Days Sober 👑"),
    (1095, "Three Years Sober 🌳"),
    (1825, "Five Years Sober 🌟"),
    (3650, "Ten Years Sober 🎪"),
];

const DEFAULT_MILESTONES: &[(u32, &str)] = &[
    (1, "First Step Forward 🚀"),
    (7, "Week of Consistency 📅"),
    (14, "Two Weeks Strong 💪"),
    (21, "Habit Formation 🧠"),
    (30, "Month of Progress 📊"),
    (60, "Two Months Deep 🔥"),
    (90, "Quarter of Excellence 🏆"),
    (100, "Century Club 💎"),
    (180, "Half Year Hero 🦸"),
    (365, "Year of Transformation 🎉"),
    (500, "500 Days of Power ⚡"),
    (730, "Two Years Strong 🎯"),
    (1000, "Thousand Day Club 👑"),
    (1095, "Three Years of Growth 🌳"),
    (1825, "Five Years of Excellence 🌟"),
    (3650, "Decade of Dedication 🎪"),
];

/// Milestone table family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneTable {
    Sobriety,
    Default,
}

impl MilestoneTable {
    fn entries(self) -> &'static [(u32, &'static str)] {
        match self {
            MilestoneTable::Sobriety => SOBRIETY_MILESTONES,
            MilestoneTable::Default => DEFAULT_MILESTONES,
        }
    }

    pub fn lookup(self, day: u32) -> Option<&'static str> {
        self.entries()
            .iter()
            .find(|(d, _)| *d == day)
            .map(|(_, msg)| *msg)
    }

    /// Next milestone strictly after `day`, if any.
    pub fn next_after(self, day: u32) -> Option<(u32, &'static str)> {
        self.entries().iter().copied().find(|(d, _)| *d > day)
    }
}

/// Borrowed view of a theme's message pool.
#[derive(Debug, Clone, Copy)]
pub enum ThemePool<'a> {
    Builtin(&'static [&'static str]),
    Custom(&'a [String]),
}

impl<'a> ThemePool<'a> {
    pub fn len(&self) -> usize {
        match self {
            ThemePool::Builtin(list) => list.len(),
            ThemePool::Custom(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&'a str> {
        match *self {
            ThemePool::Builtin(list) => list.get(index).copied(),
            ThemePool::Custom(list) => list.get(index).map(String::as_str),
        }
    }

    /// Entry for `day`: `(day - 1) mod len`, Euclidean so day 0 wraps to the last entry.
    pub fn cyclic(&self, day: u32) -> Option<&'a str> {
        let len = self.len() as i64;
        if len == 0 {
            return None;
        }
        let index = (i64::from(day) - 1).rem_euclid(len) as usize;
        self.get(index)
    }
}

/// Message for `habit` on day `day`.
pub fn select_message(day: u32, habit: &Habit) -> String {
    if let Some(milestone) = habit.theme.milestones().lookup(day) {
        return milestone.to_string();
    }
    // Validation guarantees a non-empty pool.
    habit
        .theme
        .pool()
        .cyclic(day)
        .unwrap_or_default()
        .to_string()
}

/// Tracking event title: `"{name} - Day {day} – {message}"`.
pub fn tracking_title(habit: &Habit, day: u32, message: &str) -> String {
    format!("{} - Day {} – {}", habit.name, day, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habit::Theme;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn habit(theme: Theme) -> Habit {
        Habit::new("h", "Read", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).with_theme(theme)
    }

    #[test]
    fn milestone_beats_pool() {
        let h = habit(Theme::General);
        assert_eq!(select_message(7, &h), "Week of Consistency 📅");
        assert_ne!(select_message(7, &h), GENERAL[6]);
    }

    #[test]
    fn sobriety_uses_its_own_milestones() {
        let h = habit(Theme::Sobriety);
        assert_eq!(select_message(7, &h), "One Week Sober 🎉");
        assert_eq!(select_message(3, &h), "Three Days Strong 💪");
        // Day 3 is not a milestone outside sobriety
        assert_eq!(select_message(3, &habit(Theme::General)), GENERAL[2]);
    }

    #[test]
    fn pool_cycles_from_day_one() {
        let h = habit(Theme::Growth);
        assert_eq!(select_message(2, &h), GROWTH[1]);
        assert_eq!(select_message(23, &h), GROWTH[2]);
        assert_eq!(select_message(11, &h), GROWTH[0]);
    }

    #[test]
    fn custom_pool_is_used_verbatim() {
        let h = habit(Theme::Custom(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(select_message(2, &h), "b");
        assert_eq!(select_message(4, &h), "a");
        // Milestones still win for custom themes
        assert_eq!(select_message(1, &h), "First Step Forward 🚀");
    }

    #[test]
    fn day_zero_wraps_to_last_entry() {
        let h = habit(Theme::Custom(vec!["a".into(), "b".into()]));
        assert_eq!(select_message(0, &h), "b");
    }

    #[test]
    fn next_milestone_after_day() {
        assert_eq!(
            MilestoneTable::Default.next_after(7),
            Some((14, "Two Weeks Strong 💪"))
        );
        assert_eq!(MilestoneTable::Default.next_after(3650), None);
    }

    #[test]
    fn title_format() {
        let h = habit(Theme::General);
        assert_eq!(
            tracking_title(&h, 12, "Staying on Track 🎯"),
            "Read - Day 12 – Staying on Track 🎯"
        );
    }

    proptest! {
        #[test]
        fn non_milestone_days_follow_pool_cycle(day in 1u32..5000) {
            prop_assume!(MilestoneTable::Default.lookup(day).is_none());
            let h = habit(Theme::Minimal);
            let expected = MINIMAL[((day - 1) as usize) % MINIMAL.len()];
            prop_assert_eq!(select_message(day, &h), expected);
        }
    }
}
