//! History views: per-day grouping, headline stats and the project tree
//! with effective totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::hierarchy::{NodeLevel, Project};
use crate::recorder::{AggregateTimers, SessionRecord};

/// Format milliseconds as `MM:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Sessions of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total_ms: u64,
    pub sessions: Vec<SessionRecord>,
}

/// Group history by `date`, most recent day first. Sessions keep their
/// order from the history log within a day.
pub fn group_by_date(history: &[SessionRecord]) -> Vec<DaySummary> {
    let mut days: BTreeMap<NaiveDate, DaySummary> = BTreeMap::new();
    for record in history {
        let day = days.entry(record.date).or_insert_with(|| DaySummary {
            date: record.date,
            total_ms: 0,
            sessions: Vec::new(),
        });
        day.total_ms = day.total_ms.saturating_add(record.duration);
        day.sessions.push(record.clone());
    }
    days.into_values().rev().collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_ms: u64,
    pub today_sessions: u64,
    pub today_ms: u64,
}

impl Stats {
    pub fn from_history(history: &[SessionRecord], today: NaiveDate) -> Self {
        history.iter().fold(Stats::default(), |mut stats, record| {
            stats.total_sessions += 1;
            stats.total_ms = stats.total_ms.saturating_add(record.duration);
            if record.date == today {
                stats.today_sessions += 1;
                stats.today_ms = stats.today_ms.saturating_add(record.duration);
            }
            stats
        })
    }
}

/// One node of the project tree with its own and effective time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub id: String,
    pub name: String,
    pub level: NodeLevel,
    pub own_ms: u64,
    pub total_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSummary>,
}

pub fn project_summaries(projects: &[Project], timers: &AggregateTimers) -> Vec<NodeSummary> {
    projects
        .iter()
        .map(|project| NodeSummary {
            id: project.id.clone(),
            name: project.name.clone(),
            level: NodeLevel::Project,
            own_ms: timers.own_time(NodeLevel::Project, &project.id),
            total_ms: timers.project_time(project),
            children: project
                .topics
                .iter()
                .map(|topic| NodeSummary {
                    id: topic.id.clone(),
                    name: topic.name.clone(),
                    level: NodeLevel::Topic,
                    own_ms: timers.own_time(NodeLevel::Topic, &topic.id),
                    total_ms: timers.topic_time(topic),
                    children: topic
                        .sub_topics
                        .iter()
                        .map(|sub| {
                            let own = timers.own_time(NodeLevel::Subtopic, &sub.id);
                            NodeSummary {
                                id: sub.id.clone(),
                                name: sub.name.clone(),
                                level: NodeLevel::Subtopic,
                                own_ms: own,
                                total_ms: own,
                                children: Vec::new(),
                            }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}
