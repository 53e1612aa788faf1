use clap::Subcommand;
use focusflow_core::report::{format_duration, group_by_date, Stats};

use crate::common::{print_events, CliResult, Session, StdinConfirm};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Sessions grouped by day, most recent first
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Session counts and totals, overall and for today
    Stats,
    /// Delete every recorded session (node totals are kept)
    Clear {
        #[arg(long, short)]
        yes: bool,
    },
}

pub fn run(action: HistoryAction, user: Option<String>) -> CliResult {
    let mut session = Session::open(user)?;

    match action {
        HistoryAction::List { json } => {
            let days = group_by_date(session.tracker.history());
            if json {
                println!("{}", serde_json::to_string_pretty(&days)?);
            } else {
                for day in &days {
                    println!("{}  total {}", day.date, format_duration(day.total_ms));
                    for record in &day.sessions {
                        let path = [
                            Some(record.project_name.as_str()),
                            record.topic_name.as_deref(),
                            record.sub_topic_name.as_deref(),
                        ]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" > ");
                        println!(
                            "  {}  {:>8}  {}",
                            record.start_time.format("%H:%M"),
                            format_duration(record.duration),
                            path
                        );
                    }
                }
            }
        }
        HistoryAction::Stats => {
            let today = chrono::Utc::now().date_naive();
            let stats = Stats::from_history(session.tracker.history(), today);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        HistoryAction::Clear { yes } => {
            let mut confirm = StdinConfirm { assume_yes: yes };
            match session.tracker.clear_history(&mut confirm) {
                Some(events) => print_events(&events)?,
                None => eprintln!("cancelled"),
            }
        }
    }
    session.close()
}
