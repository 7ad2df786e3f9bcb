//! Line-oriented front end for a running exam: command parsing and text rendering.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use exam_core::model::{OptionLabel, SubmissionStats};
use services::{ExamSession, ExamSessionError, ExamView, SubmissionPhase, SubmittedExam};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Show,
    Next,
    Prev,
    Goto(u32),
    Answer(OptionLabel),
    Flag,
    Flagged,
    Pause,
    Stats,
    Submit,
    Confirm,
    Cancel,
    Violation(u32),
    Sidebar,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    Empty,
    Unknown(String),
    MissingArgument { command: &'static str },
    InvalidArgument { command: &'static str, raw: String },
}

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCommandError::Empty => f.write_str("empty command"),
            ParseCommandError::Unknown(raw) => write!(f, "unknown command: {raw} (try `help`)"),
            ParseCommandError::MissingArgument { command } => {
                write!(f, "{command} requires an argument")
            }
            ParseCommandError::InvalidArgument { command, raw } => {
                write!(f, "invalid argument for {command}: {raw}")
            }
        }
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for ConsoleCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(ParseCommandError::Empty);
        };
        let arg = words.next();

        match head.to_ascii_lowercase().as_str() {
            "show" | "s" => Ok(Self::Show),
            "next" | "n" => Ok(Self::Next),
            "prev" | "p" => Ok(Self::Prev),
            "goto" | "g" => parse_number("goto", arg).map(Self::Goto),
            "answer" | "a" => {
                let raw = arg.ok_or(ParseCommandError::MissingArgument { command: "answer" })?;
                raw.parse::<OptionLabel>()
                    .map(Self::Answer)
                    .map_err(|_| ParseCommandError::InvalidArgument {
                        command: "answer",
                        raw: raw.to_owned(),
                    })
            }
            "flag" | "f" => Ok(Self::Flag),
            "flagged" => Ok(Self::Flagged),
            "pause" => Ok(Self::Pause),
            "stats" => Ok(Self::Stats),
            "submit" => Ok(Self::Submit),
            "confirm" | "yes" => Ok(Self::Confirm),
            "cancel" | "no" => Ok(Self::Cancel),
            "violation" => parse_number("violation", arg).map(Self::Violation),
            "sidebar" | "grid" => Ok(Self::Sidebar),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            _ => Err(ParseCommandError::Unknown(head.to_owned())),
        }
    }
}

fn parse_number(command: &'static str, arg: Option<&str>) -> Result<u32, ParseCommandError> {
    let raw = arg.ok_or(ParseCommandError::MissingArgument { command })?;
    raw.parse().map_err(|_| ParseCommandError::InvalidArgument {
        command,
        raw: raw.to_owned(),
    })
}

/// What the console loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Quit,
}

/// Apply `command` to the session and describe the result.
pub fn execute(session: &mut ExamSession, command: ConsoleCommand) -> Reply {
    let note = match command {
        ConsoleCommand::Show => None,
        ConsoleCommand::Next => (!session.go_next()).then_some("already at the last question"),
        ConsoleCommand::Prev => {
            (!session.go_previous()).then_some("already at the first question")
        }
        ConsoleCommand::Goto(target) => (!session.go_to(target)).then_some("no such question"),
        ConsoleCommand::Answer(option) => {
            session.answer_current(option);
            None
        }
        ConsoleCommand::Flag => {
            session.toggle_current_flag();
            None
        }
        ConsoleCommand::Flagged => {
            (!session.go_to_first_flagged()).then_some("no flagged questions")
        }
        ConsoleCommand::Pause => {
            (!session.toggle_pause()).then_some("this exam cannot be paused")
        }
        ConsoleCommand::Stats => return Reply::Print(render_stats(&session.compute_stats())),
        ConsoleCommand::Submit => {
            if !session.request_submit() {
                return Reply::Print("submission is not available".into());
            }
            let mut out = render_stats(&session.compute_stats());
            out.push_str("\nType `confirm` to submit or `cancel` to go back.");
            return Reply::Print(out);
        }
        ConsoleCommand::Confirm => {
            return match session.confirm_submit() {
                Ok(()) => Reply::Print(String::new()),
                Err(ExamSessionError::NotAwaitingConfirmation) => {
                    Reply::Print("type `submit` first".into())
                }
                Err(err) => Reply::Print(err.to_string()),
            };
        }
        ConsoleCommand::Cancel => (!session.cancel_submit()).then_some("nothing to cancel"),
        ConsoleCommand::Violation(count) => {
            session.set_violation_count(count);
            None
        }
        ConsoleCommand::Sidebar => {
            session.toggle_sidebar();
            None
        }
        ConsoleCommand::Help => return Reply::Print(HELP.into()),
        ConsoleCommand::Quit => return Reply::Quit,
    };

    let mut out = render_view(&session.view());
    if let Some(note) = note {
        let _ = write!(out, "\n({note})");
    }
    Reply::Print(out)
}

pub const HELP: &str = "\
commands:
  show              redraw the current question
  next | prev       move one question
  goto N            jump to question N
  answer A-D        answer the current question
  flag              toggle the review flag
  flagged           jump to the first flagged question
  pause             pause or resume (practice only)
  sidebar           show or hide the question grid
  stats             answered / flagged / time left
  submit            open the submit prompt
  confirm | cancel  answer the submit prompt
  violation N       record the anti-cheat violation count
  quit              leave without submitting";

pub fn render_view(view: &ExamView) -> String {
    let mut out = String::new();
    let _ = write!(out, "{} [{}]  time {}", view.title, view.mode, view.timer_display);
    if view.is_paused {
        out.push_str(" (paused)");
    }
    if view.is_low_time {
        out.push_str("  LOW TIME");
    }
    let badge = view.violations;
    if badge.count > 0 {
        let _ = write!(out, "  violations {}/{}", badge.count, badge.max);
        if badge.limit_reached {
            out.push('!');
        }
    }
    out.push('\n');

    if let Some(current) = &view.current {
        let question = &current.question;
        let _ = write!(out, "\nQuestion {}/{}", question.id, view.grid.len());
        if current.flagged {
            out.push_str(" [flagged]");
        }
        let _ = writeln!(out, "\n{}", question.question);
        for label in OptionLabel::ALL {
            let marker = if current.selected == Some(label) { '*' } else { ' ' };
            let _ = writeln!(out, " {marker}{label}) {}", question.options.text(label));
        }
    }

    if view.sidebar_open {
        out.push('\n');
        for cell in &view.grid {
            let mark = match (cell.answered, cell.flagged) {
                (_, true) => 'F',
                (true, false) => 'x',
                (false, false) => '.',
            };
            if cell.current {
                let _ = write!(out, "[{}{mark}] ", cell.id);
            } else {
                let _ = write!(out, " {}{mark}  ", cell.id);
            }
        }
        out.push('\n');
    }

    let _ = write!(
        out,
        "\nanswered {}/{} ({}%), flagged {}",
        view.answered_count,
        view.grid.len(),
        view.completion_percent,
        view.flagged_count
    );
    if view.phase == SubmissionPhase::AwaitingConfirmation {
        out.push_str("\nsubmit pending: `confirm` or `cancel`");
    }
    out
}

pub fn render_stats(stats: &SubmissionStats) -> String {
    let mut out = format!(
        "answered {}/{}, unanswered {}, flagged {}, time left {}",
        stats.answered_questions,
        stats.total_questions,
        stats.unanswered_questions,
        stats.flagged_questions,
        exam_core::time::format_display(stats.time_remaining_seconds),
    );
    if stats.has_warnings() {
        out.push_str("\nsome questions are unanswered or still flagged");
    }
    out
}

pub fn render_submitted(submitted: &SubmittedExam) -> String {
    let reason = match submitted.reason {
        services::SubmitReason::Manual => "submitted",
        services::SubmitReason::TimeExpired => "time is up, submitted automatically",
    };
    let score = submitted.score;
    let mut out = format!("{}: {reason}\n", submitted.exam_title);
    if score.graded_questions > 0 {
        let _ = write!(
            out,
            "score {}% ({} correct, {} incorrect, {} unanswered of {})",
            score.percentage, score.correct, score.incorrect, score.unanswered, score.graded_questions
        );
    } else {
        let _ = write!(
            out,
            "answered {}/{} (no answer key)",
            submitted.stats.answered_questions, submitted.stats.total_questions
        );
    }
    out
}
