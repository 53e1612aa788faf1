use clap::Args;
use focusflow_core::{SelectOutcome, Selection};

use crate::common::{print_events, CliResult, Session, StdinConfirm};

#[derive(Args)]
pub struct SelectArgs {
    /// Project id
    project: String,
    /// Topic id inside the project
    #[arg(long)]
    topic: Option<String>,
    /// Sub-topic id inside the topic
    #[arg(long, requires = "topic")]
    sub_topic: Option<String>,
    /// Don't ask before ending a running session
    #[arg(long, short)]
    yes: bool,
}

pub fn run(args: SelectArgs, user: Option<String>) -> CliResult {
    let mut session = Session::open(user)?;
    let selection = Selection::resolve(
        session.tracker.projects(),
        &args.project,
        args.topic.as_deref(),
        args.sub_topic.as_deref(),
    )?;

    let mut confirm = StdinConfirm {
        assume_yes: args.yes,
    };
    match session.tracker.select(selection, &mut confirm) {
        SelectOutcome::Applied(events) => print_events(&events)?,
        SelectOutcome::Unchanged => eprintln!("already selected"),
        SelectOutcome::Declined => eprintln!("cancelled"),
    }
    session.close()
}
