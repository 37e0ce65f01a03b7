use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use quiz_core::model::{CategoryId, QuizId, UserId};
use quiz_core::time::elapsed_secs;
use storage::repository::{AttemptRepository, AttemptRow, ProfileRepository};

use crate::error::ProgressError;

pub const XP_PER_CORRECT: u64 = 10;
pub const XP_PER_LEVEL: u64 = 100;

/// Finished attempts in one category before it can earn an expert badge.
pub const EXPERT_MIN_ATTEMPTS: usize = 3;
/// Average percentage needed in that category.
pub const EXPERT_MIN_PERCENT: u64 = 80;
pub const CHAMPION_MIN_QUIZZES: u32 = 10;

/// Badge earned from a user's attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Achievement {
    /// At least [`CHAMPION_MIN_QUIZZES`] quizzes finished.
    QuizChampion,
    /// Average of [`EXPERT_MIN_PERCENT`] or more over at least
    /// [`EXPERT_MIN_ATTEMPTS`] attempts in one category.
    CategoryExpert { category: CategoryId },
    /// Any attempt answered fully correctly.
    PerfectScore,
}

impl Achievement {
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Achievement::QuizChampion => "Quiz Champion".to_owned(),
            Achievement::CategoryExpert { category } => {
                let mut chars = category.as_str().chars();
                let name: String = chars
                    .next()
                    .map(|first| first.to_uppercase().chain(chars).collect())
                    .unwrap_or_default();
                format!("{name} Expert")
            }
            Achievement::PerfectScore => "Perfect Score".to_owned(),
        }
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

fn half_up_mean(sum: u64, count: u64) -> u64 {
    if count == 0 { 0 } else { (sum * 2 + count) / (count * 2) }
}

fn achievements_for(rows: &[AttemptRow], quizzes_taken: u32) -> Vec<Achievement> {
    let mut earned = Vec::new();
    if quizzes_taken >= CHAMPION_MIN_QUIZZES {
        earned.push(Achievement::QuizChampion);
    }

    let mut by_category: BTreeMap<&CategoryId, (usize, u64)> = BTreeMap::new();
    for row in rows {
        let entry = by_category.entry(row.attempt.category()).or_default();
        entry.0 += 1;
        entry.1 += u64::from(row.attempt.percentage());
    }
    earned.extend(
        by_category
            .into_iter()
            .filter(|(_, (count, sum))| {
                *count >= EXPERT_MIN_ATTEMPTS
                    && half_up_mean(*sum, *count as u64) >= EXPERT_MIN_PERCENT
            })
            .map(|(category, _)| Achievement::CategoryExpert {
                category: category.clone(),
            }),
    );

    if rows.iter().any(|r| r.attempt.percentage() == 100) {
        earned.push(Achievement::PerfectScore);
    }
    earned
}

/// One finished attempt as shown in a history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptListItem {
    pub id: i64,
    pub quiz_id: QuizId,
    pub category: CategoryId,
    pub correct: u32,
    pub total: u32,
    pub percentage: u8,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: u32,
}

impl AttemptListItem {
    #[must_use]
    pub fn from_row(row: &AttemptRow) -> Self {
        let attempt = &row.attempt;
        Self {
            id: row.id,
            quiz_id: attempt.quiz_id().clone(),
            category: attempt.category().clone(),
            correct: attempt.correct(),
            total: attempt.total(),
            percentage: attempt.percentage(),
            completed_at: attempt.completed_at(),
            duration_secs: elapsed_secs(attempt.started_at(), attempt.completed_at()),
        }
    }
}

/// Dashboard numbers for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProgress {
    pub quizzes_taken: u32,
    pub total_correct: u64,
    pub average_percentage: u8,
    pub best_percentage: u8,
    pub xp: u64,
    pub level: u32,
    pub xp_into_level: u64,
    pub xp_for_next_level: u64,
    pub recent: Vec<AttemptListItem>,
    pub achievements: Vec<Achievement>,
}

impl UserProgress {
    fn from_rows(rows: &[AttemptRow], recent_limit: usize) -> Self {
        let quizzes_taken = u32::try_from(rows.len()).unwrap_or(u32::MAX);
        let total_correct: u64 = rows.iter().map(|r| u64::from(r.attempt.correct())).sum();
        let percentages: Vec<u64> = rows
            .iter()
            .map(|r| u64::from(r.attempt.percentage()))
            .collect();
        let best_percentage = rows
            .iter()
            .map(|r| r.attempt.percentage())
            .max()
            .unwrap_or(0);
        let average_percentage = u8::try_from(half_up_mean(
            percentages.iter().sum(),
            percentages.len() as u64,
        ))
        .unwrap_or(100);

        let xp = total_correct * XP_PER_CORRECT;
        let xp_into_level = xp % XP_PER_LEVEL;

        Self {
            quizzes_taken,
            total_correct,
            average_percentage,
            best_percentage,
            xp,
            level: level_for_xp(xp),
            xp_into_level,
            xp_for_next_level: XP_PER_LEVEL - xp_into_level,
            recent: rows
                .iter()
                .take(recent_limit)
                .map(AttemptListItem::from_row)
                .collect(),
            achievements: achievements_for(rows, quizzes_taken),
        }
    }
}

/// Level reached with `xp` experience points; everyone starts at level 1.
#[must_use]
pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: UserId,
    pub username: String,
    /// Total XP.
    pub score: u64,
}

/// Per-user statistics and the global leaderboard.
#[derive(Clone)]
pub struct ProgressService {
    profiles: Arc<dyn ProfileRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        profiles: Arc<dyn ProfileRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self { profiles, attempts }
    }

    /// Aggregate a user's finished attempts, with the newest `recent_limit` listed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if repository access fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn for_user(
        &self,
        user: UserId,
        recent_limit: u32,
    ) -> Result<UserProgress, ProgressError> {
        let rows = self.attempts.list_attempts_for_user(user, u32::MAX).await?;
        let recent_limit = usize::try_from(recent_limit).unwrap_or(usize::MAX);
        Ok(UserProgress::from_rows(&rows, recent_limit))
    }

    /// Top `limit` users by XP. Users without a profile are left out.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if repository access fails.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ProgressError> {
        let totals = self.attempts.user_totals(u32::MAX).await?;
        let ids: Vec<UserId> = totals.iter().map(|t| t.user_id).collect();
        let profiles = self.profiles.get_profiles(&ids).await?;

        let mut ranked: Vec<(u64, UserId, String)> = totals
            .iter()
            .filter_map(|totals| {
                profiles
                    .iter()
                    .find(|p| p.id() == totals.user_id)
                    .map(|p| {
                        (
                            totals.correct * XP_PER_CORRECT,
                            totals.user_id,
                            p.username().to_owned(),
                        )
                    })
            })
            .collect();
        if ranked.len() < totals.len() {
            tracing::debug!(
                skipped = totals.len() - ranked.len(),
                "users without profile left off the leaderboard"
            );
        }
        ranked.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.2.to_lowercase().cmp(&b.2.to_lowercase()))
        });
        ranked.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(ranked
            .into_iter()
            .zip(1_u32..)
            .map(|((score, user_id, username), rank)| LeaderboardEntry {
                rank,
                user_id,
                username,
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{Profile, QuizAttempt};
    use quiz_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn attempt(user: UserId, correct: u32, minutes_later: i64) -> QuizAttempt {
        attempt_in(user, "geography", correct, minutes_later)
    }

    fn attempt_in(user: UserId, category: &str, correct: u32, minutes_later: i64) -> QuizAttempt {
        let start = fixed_now() + Duration::minutes(minutes_later);
        QuizAttempt::from_persisted(
            user,
            QuizId::new(format!("{category}-1")).unwrap(),
            CategoryId::new(category).unwrap(),
            correct,
            3,
            start,
            start + Duration::seconds(95),
        )
        .unwrap()
    }

    async fn achievements_after(attempts: &[(&str, u32)]) -> Vec<Achievement> {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        for (minutes, (category, correct)) in (0_i64..).zip(attempts) {
            repo.append_attempt(&attempt_in(user, category, *correct, minutes))
                .await
                .unwrap();
        }
        service(&repo).for_user(user, 5).await.unwrap().achievements
    }

    fn service(repo: &InMemoryRepository) -> ProgressService {
        ProgressService::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[test]
    fn levels_start_at_one() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(250), 3);
    }

    #[tokio::test]
    async fn progress_for_new_user_is_empty() {
        let repo = InMemoryRepository::new();
        let progress = service(&repo).for_user(UserId::random(), 5).await.unwrap();
        assert_eq!(progress.quizzes_taken, 0);
        assert_eq!(progress.average_percentage, 0);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.xp_for_next_level, 100);
        assert!(progress.recent.is_empty());
        assert!(progress.achievements.is_empty());
    }

    #[tokio::test]
    async fn perfect_score_needs_one_full_marks_attempt() {
        assert!(achievements_after(&[("science", 2)]).await.is_empty());
        assert_eq!(
            achievements_after(&[("science", 2), ("music", 3)]).await,
            vec![Achievement::PerfectScore]
        );
    }

    #[tokio::test]
    async fn category_expert_needs_three_attempts_averaging_eighty() {
        // Two perfect runs are not enough attempts.
        let two = achievements_after(&[("science", 3), ("science", 3)]).await;
        assert_eq!(two, vec![Achievement::PerfectScore]);

        // 100, 100, 67 averages 89.
        let earned =
            achievements_after(&[("science", 3), ("science", 3), ("science", 2)]).await;
        assert_eq!(
            earned,
            vec![
                Achievement::CategoryExpert {
                    category: CategoryId::new("science").unwrap()
                },
                Achievement::PerfectScore,
            ]
        );
        assert_eq!(earned[0].title(), "Science Expert");

        // 100, 67, 67 averages 78.
        let short = achievements_after(&[("music", 3), ("music", 2), ("music", 2)]).await;
        assert_eq!(short, vec![Achievement::PerfectScore]);
    }

    #[tokio::test]
    async fn quiz_champion_after_ten_quizzes() {
        let nine = vec![("sports", 1); 9];
        assert!(achievements_after(&nine).await.is_empty());

        let ten = vec![("sports", 1); 10];
        let earned = achievements_after(&ten).await;
        assert_eq!(earned, vec![Achievement::QuizChampion]);
        assert_eq!(earned[0].to_string(), "Quiz Champion");
    }

    #[tokio::test]
    async fn progress_aggregates_attempts() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        for (correct, minutes) in [(3, 0), (2, 10), (1, 20), (3, 30)] {
            repo.append_attempt(&attempt(user, correct, minutes))
                .await
                .unwrap();
        }
        repo.append_attempt(&attempt(UserId::random(), 3, 40))
            .await
            .unwrap();

        let progress = service(&repo).for_user(user, 2).await.unwrap();
        assert_eq!(progress.quizzes_taken, 4);
        assert_eq!(progress.total_correct, 9);
        // (100 + 67 + 33 + 100) / 4 = 75
        assert_eq!(progress.average_percentage, 75);
        assert_eq!(progress.best_percentage, 100);
        assert_eq!(progress.xp, 90);
        assert_eq!(progress.level, 1);
        assert_eq!(progress.xp_into_level, 90);
        assert_eq!(progress.xp_for_next_level, 10);

        assert_eq!(progress.recent.len(), 2);
        assert_eq!(progress.recent[0].correct, 3);
        assert_eq!(progress.recent[1].correct, 1);
        assert_eq!(progress.recent[0].duration_secs, 95);
    }

    #[tokio::test]
    async fn leaderboard_ranks_by_xp_and_skips_missing_profiles() {
        let repo = InMemoryRepository::new();
        let alpha = UserId::random();
        let bravo = UserId::random();
        let charlie = UserId::random();
        let ghost = UserId::random();
        for (user, name) in [(alpha, "alpha"), (bravo, "Bravo"), (charlie, "charlie")] {
            repo.insert_profile(&Profile::new(user, name, fixed_now()).unwrap())
                .await
                .unwrap();
        }
        repo.append_attempt(&attempt(alpha, 2, 0)).await.unwrap();
        repo.append_attempt(&attempt(bravo, 3, 0)).await.unwrap();
        repo.append_attempt(&attempt(charlie, 3, 0)).await.unwrap();
        repo.append_attempt(&attempt(ghost, 3, 0)).await.unwrap();
        repo.append_attempt(&attempt(ghost, 3, 5)).await.unwrap();

        let board = service(&repo).leaderboard(10).await.unwrap();
        let names: Vec<_> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, vec!["Bravo", "charlie", "alpha"]);
        assert_eq!(
            board.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(board[0].score, 30);
        assert_eq!(board[2].score, 20);

        let top = service(&repo).leaderboard(1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].user_id, bravo);
    }
}
