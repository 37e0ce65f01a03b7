//! Line-oriented driver that runs one quiz session from stdin.

use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

use quiz_core::model::UserId;
use quiz_core::time::format_countdown;
use quiz_core::{QuizSession, SessionStatus};
use services::{FinishedRun, QuizRun, QuizRunService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Choose(usize),
    Next,
    Prev,
    Quit,
    Help,
    Unknown,
}

impl Input {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "n" | "next" => Input::Next,
            "p" | "prev" => Input::Prev,
            "q" | "quit" => Input::Quit,
            "?" | "h" | "help" => Input::Help,
            other => other
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .map_or(Input::Unknown, Input::Choose),
        }
    }
}

/// Converts wall-clock time between prompts into whole-second ticks.
struct TickMeter {
    last: Instant,
    carry: Duration,
}

impl TickMeter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            carry: Duration::ZERO,
        }
    }

    fn take_secs(&mut self) -> u32 {
        let now = Instant::now();
        self.carry += now.duration_since(self.last);
        self.last = now;
        let secs = self.carry.as_secs();
        self.carry -= Duration::from_secs(secs);
        u32::try_from(secs).unwrap_or(u32::MAX)
    }
}

enum PlayOutcome {
    Completed,
    Quit,
}

/// Drive `run` until it completes or the player quits, then offer replays.
pub async fn play(
    service: &QuizRunService,
    mut run: QuizRun,
    user: Option<UserId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        if let PlayOutcome::Quit = drive(&mut run, &mut lines)? {
            println!("Quiz abandoned.");
            return Ok(());
        }

        let finished = service.finish(&run, user).await?;
        print_result(&finished);
        if user.is_none() {
            println!("Sign in with --user to save your progress.");
        }

        print!("Play again? [y/N] ");
        io::stdout().flush()?;
        let again = lines.next().transpose()?.unwrap_or_default();
        if !matches!(again.trim(), "y" | "Y" | "yes") {
            return Ok(());
        }
        service.restart(&mut run)?;
    }
}

fn drive(
    run: &mut QuizRun,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<PlayOutcome, Box<dyn std::error::Error>> {
    let mut meter = TickMeter::new();
    print_help();

    while run.session().status() == SessionStatus::Active {
        print_question(run.session());
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            return Ok(PlayOutcome::Quit);
        };

        let session = run.session_mut();
        session.tick(meter.take_secs())?;
        if session.is_complete() {
            println!("Time is up!");
            break;
        }

        let result = match Input::parse(&line) {
            Input::Choose(option) => session.select_answer(option),
            Input::Next => session.advance(),
            Input::Prev => session.retreat(),
            Input::Quit => return Ok(PlayOutcome::Quit),
            Input::Help => {
                print_help();
                Ok(())
            }
            Input::Unknown => {
                println!("Unrecognized input. Type ? for help.");
                Ok(())
            }
        };
        if let Err(err) = result {
            println!("! {err}");
        }
    }

    Ok(PlayOutcome::Completed)
}

fn print_help() {
    println!("Type an option number to answer, n for next, p for previous, q to quit.");
}

fn print_question(session: &QuizSession) {
    let (Some(question), Some(progress)) = (session.current_question(), session.progress()) else {
        return;
    };
    println!();
    println!(
        "Question {}/{}  [{} answered]  time left {}",
        progress.position + 1,
        progress.total,
        progress.answered,
        format_countdown(progress.remaining_secs)
    );
    println!("{}", question.text());
    let selected = session.selected_answer(progress.position);
    for (index, option) in question.options().iter().enumerate() {
        let marker = if selected == Some(index) { '*' } else { ' ' };
        println!("  {marker} {}. {option}", index + 1);
    }
    if session.is_last_question() {
        println!("(last question: n submits the quiz)");
    }
}

fn print_result(finished: &FinishedRun) {
    let report = &finished.report;
    println!();
    println!(
        "You scored {}/{} ({}%).",
        report.correct(),
        report.total(),
        report.percentage()
    );
    println!("{}", report.feedback().message());
    if let Some(id) = finished.attempt_id {
        println!("Saved as attempt #{id}.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inputs() {
        assert_eq!(Input::parse("1"), Input::Choose(0));
        assert_eq!(Input::parse(" 4 "), Input::Choose(3));
        assert_eq!(Input::parse("0"), Input::Unknown);
        assert_eq!(Input::parse("next"), Input::Next);
        assert_eq!(Input::parse("p"), Input::Prev);
        assert_eq!(Input::parse("q"), Input::Quit);
        assert_eq!(Input::parse("banana"), Input::Unknown);
    }

    #[test]
    fn tick_meter_keeps_fractional_remainder() {
        let mut meter = TickMeter::new();
        meter.last -= Duration::from_millis(1500);
        assert_eq!(meter.take_secs(), 1);
        meter.last -= Duration::from_millis(600);
        assert_eq!(meter.take_secs(), 1);
    }
}
