use quiz_core::SessionStatus;
use quiz_core::model::{CategoryId, Feedback, QuizId};
use quiz_core::time::fixed_now;
use services::{AppServices, AuthEventKind, Clock, IdentityBackend};

#[tokio::test]
async fn signed_in_player_runs_quiz_and_reaches_leaderboard() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now())).unwrap();
    assert_eq!(app.identity_backend(), IdentityBackend::Development);

    let auth = app.auth();
    auth.init().await.unwrap();
    let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&events);
    let _subscription = auth.subscribe(move |event| sink.lock().unwrap().push(event.kind));

    let outcome = auth
        .sign_up("player@example.com", "secret1", "QuizWhiz")
        .await
        .unwrap();
    assert!(outcome.profile_error.is_none());
    let user = auth.current_user().expect("signed in").id;

    let geography = CategoryId::new("geography").unwrap();
    let quizzes = app.catalog().list_quizzes(&geography).await.unwrap();
    assert!(quizzes.iter().any(|q| q.id.as_str() == "geo-1"));

    let runs = app.quiz_runs();
    let mut run = runs
        .start(&geography, &QuizId::new("geo-1").unwrap())
        .await
        .unwrap();
    {
        let session = run.session_mut();
        assert_eq!(session.status(), SessionStatus::Active);
        session.select_answer(2).unwrap();
        session.advance().unwrap();
        session.select_answer(3).unwrap();
        session.advance().unwrap();
        session.tick(30).unwrap();
        session.select_answer(0).unwrap();
        session.advance().unwrap();
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    let finished = runs.finish(&run, Some(user)).await.unwrap();
    assert_eq!(finished.report.correct(), 2);
    assert_eq!(finished.report.feedback(), Feedback::Good);
    assert!(finished.attempt_id.is_some());

    let progress = app.progress().for_user(user, 5).await.unwrap();
    assert_eq!(progress.quizzes_taken, 1);
    assert_eq!(progress.xp, 20);
    assert_eq!(progress.recent.len(), 1);

    let board = app.progress().leaderboard(10).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].username, "QuizWhiz");
    assert_eq!(board[0].score, 20);

    auth.sign_out().await.unwrap();
    assert!(!auth.is_authenticated());
    assert_eq!(
        *events.lock().unwrap(),
        vec![AuthEventKind::SignedIn, AuthEventKind::SignedOut]
    );
}

#[tokio::test]
async fn timed_out_anonymous_run_scores_unanswered_as_wrong() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now())).unwrap();
    let runs = app.quiz_runs();
    let mut run = runs
        .start(
            &CategoryId::new("programming").unwrap(),
            &QuizId::new("prog-1").unwrap(),
        )
        .await
        .unwrap();

    let budget = run.session().remaining_secs();
    run.session_mut().select_answer(2).unwrap();
    run.session_mut().tick(budget).unwrap();
    assert!(run.session().is_complete());

    let finished = runs.finish(&run, None).await.unwrap();
    assert_eq!(finished.report.correct(), 1);
    assert_eq!(finished.report.total(), 3);
    assert_eq!(finished.report.percentage(), 33);
    assert_eq!(finished.attempt_id, None);

    assert!(app.progress().leaderboard(10).await.unwrap().is_empty());
}
