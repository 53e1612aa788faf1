//! Project hierarchy management. The CLI doubles as the project store: the
//! hierarchy is kept per user next to the ledger.

use std::path::PathBuf;

use clap::Subcommand;
use focusflow_core::report::{format_duration, project_summaries, NodeSummary};
use focusflow_core::hierarchy::find_node;
use focusflow_core::{Project, SubTopic, Topic};
use uuid::Uuid;

use crate::common::{print_events, CliResult, Session, StdinConfirm};

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Show the hierarchy with effective study time per node
    List {
        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },
    /// Add a project, or a topic / sub-topic under an existing node
    Add {
        /// Display name
        name: String,
        /// Parent project or topic id
        #[arg(long)]
        parent: Option<String>,
    },
    /// Replace the hierarchy with a JSON file (array of projects). Nodes the
    /// file no longer has are deleted with their time and history.
    Import { file: PathBuf },
    /// Delete a node together with its time and history
    Delete {
        id: String,
        /// Don't ask before discarding a running session
        #[arg(long, short)]
        yes: bool,
    },
}

pub fn run(action: ProjectAction, user: Option<String>) -> CliResult {
    let mut session = Session::open(user)?;

    match action {
        ProjectAction::List { json } => {
            let tree = project_summaries(session.tracker.projects(), session.tracker.timers());
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                for node in &tree {
                    print_tree(node, 0);
                }
            }
        }
        ProjectAction::Add { name, parent } => {
            let id = Uuid::new_v4().to_string();
            let mut projects = session.tracker.projects().to_vec();
            match parent.as_deref() {
                None => projects.push(Project {
                    id: id.clone(),
                    name,
                    topics: Vec::new(),
                }),
                Some(parent) => add_child(&mut projects, parent, id.clone(), name)?,
            }
            session.tracker.set_projects(projects)?;
            session.save_projects()?;
            println!("{id}");
        }
        ProjectAction::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let projects: Vec<Project> = serde_json::from_str(&content)?;
            let count = projects.len();
            let events = session.tracker.set_projects(projects)?;
            session.save_projects()?;
            print_events(&events)?;
            println!("imported {count} projects");
        }
        ProjectAction::Delete { id, yes } => {
            let mut confirm = StdinConfirm { assume_yes: yes };
            match session.tracker.delete_node(&id, &mut confirm) {
                Some(events) => {
                    session.save_projects()?;
                    print_events(&events)?;
                }
                None => eprintln!("cancelled"),
            }
        }
    }
    session.close()
}

fn add_child(projects: &mut [Project], parent: &str, id: String, name: String) -> CliResult {
    for project in projects.iter_mut() {
        if project.id == parent {
            project.topics.push(Topic {
                id,
                name,
                sub_topics: Vec::new(),
            });
            return Ok(());
        }
        if let Some(topic) = project.topics.iter_mut().find(|t| t.id == parent) {
            topic.sub_topics.push(SubTopic { id, name });
            return Ok(());
        }
    }
    match find_node(projects, parent) {
        Some(location) => Err(format!("cannot add children under a {}", location.level()).into()),
        None => Err(format!("unknown parent: {parent}").into()),
    }
}

fn print_tree(node: &NodeSummary, depth: usize) {
    println!(
        "{:indent$}{} [{}] {}",
        "",
        node.name,
        node.id,
        format_duration(node.total_ms),
        indent = depth * 2
    );
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}
