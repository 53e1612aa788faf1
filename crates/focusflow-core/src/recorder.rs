//! Session recorder and the in-memory aggregate store.
//!
//! A committed interval adds its duration to exactly one node: the deepest
//! selected one. Ancestor totals are never stored; they are summed from the
//! hierarchy on demand (see [`AggregateTimers::project_time`]), so a session
//! is counted once no matter how it is viewed.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::to_datetime;
use crate::error::CoreError;
use crate::hierarchy::{NodeLevel, NodeLocation, Project, Selection, Topic};

/// Sessions shorter than this are discarded.
pub const DEFAULT_MIN_SESSION_MS: u64 = 1_000;

/// A closed, measured interval ready to be committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTime {
    pub total_time: u64,
}

/// Own time per node, one map per level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTimers {
    #[serde(default)]
    pub projects: BTreeMap<String, NodeTime>,
    #[serde(default)]
    pub topics: BTreeMap<String, NodeTime>,
    #[serde(default)]
    pub sub_topics: BTreeMap<String, NodeTime>,
}

impl AggregateTimers {
    fn map(&self, level: NodeLevel) -> &BTreeMap<String, NodeTime> {
        match level {
            NodeLevel::Project => &self.projects,
            NodeLevel::Topic => &self.topics,
            NodeLevel::Subtopic => &self.sub_topics,
        }
    }

    fn map_mut(&mut self, level: NodeLevel) -> &mut BTreeMap<String, NodeTime> {
        match level {
            NodeLevel::Project => &mut self.projects,
            NodeLevel::Topic => &mut self.topics,
            NodeLevel::Subtopic => &mut self.sub_topics,
        }
    }

    /// Time committed directly against this node, excluding descendants.
    pub fn own_time(&self, level: NodeLevel, id: &str) -> u64 {
        self.map(level).get(id).map(|t| t.total_time).unwrap_or(0)
    }

    pub fn add(&mut self, level: NodeLevel, id: &str, ms: u64) {
        let entry = self.map_mut(level).entry(id.to_string()).or_default();
        entry.total_time = entry.total_time.saturating_add(ms);
    }

    pub fn remove(&mut self, level: NodeLevel, id: &str) -> Option<NodeTime> {
        self.map_mut(level).remove(id)
    }

    /// A topic's own time plus all of its sub-topics'.
    pub fn topic_time(&self, topic: &Topic) -> u64 {
        topic
            .sub_topics
            .iter()
            .map(|s| self.own_time(NodeLevel::Subtopic, &s.id))
            .fold(self.own_time(NodeLevel::Topic, &topic.id), u64::saturating_add)
    }

    /// A project's own time plus everything below it.
    pub fn project_time(&self, project: &Project) -> u64 {
        project
            .topics
            .iter()
            .map(|t| self.topic_time(t))
            .fold(self.own_time(NodeLevel::Project, &project.id), u64::saturating_add)
    }
}

/// One committed interval. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub topic_id: Option<String>,
    pub topic_name: Option<String>,
    pub sub_topic_id: Option<String>,
    pub sub_topic_name: Option<String>,
    /// Milliseconds.
    pub duration: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    /// UTC calendar day of `start_time`.
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub level: NodeLevel,
}

impl SessionRecord {
    fn new(selection: &Selection, interval: &Interval) -> Self {
        let start_time = to_datetime(interval.started_at_ms);
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: selection.project().id.clone(),
            project_name: selection.project().name.clone(),
            topic_id: selection.topic().map(|t| t.id.clone()),
            topic_name: selection.topic().map(|t| t.name.clone()),
            sub_topic_id: selection.sub_topic().map(|s| s.id.clone()),
            sub_topic_name: selection.sub_topic().map(|s| s.name.clone()),
            duration: interval.duration_ms,
            start_time,
            end_time: to_datetime(interval.ended_at_ms),
            date: start_time.date_naive(),
            level: selection.level(),
        }
    }

    /// Whether this record was attributed to `node_id` or one of its descendants.
    pub fn belongs_to(&self, level: NodeLevel, node_id: &str) -> bool {
        match level {
            NodeLevel::Project => self.project_id == node_id,
            NodeLevel::Topic => self.topic_id.as_deref() == Some(node_id),
            NodeLevel::Subtopic => self.sub_topic_id.as_deref() == Some(node_id),
        }
    }

    /// Whether `node_id` appears at any level of this record.
    pub fn mentions(&self, node_id: &str) -> bool {
        self.project_id == node_id
            || self.topic_id.as_deref() == Some(node_id)
            || self.sub_topic_id.as_deref() == Some(node_id)
    }
}

/// Aggregate maps plus the history log, most recent session first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub timers: AggregateTimers,
    pub history: Vec<SessionRecord>,
}

impl Ledger {
    /// Drop a deleted node's map entries and history.
    ///
    /// With a known location the whole subtree is cleaned. An id that is no
    /// longer in the hierarchy is matched at every level, and the descendants
    /// its history records name lose their entries too. Returns the number
    /// of history records removed.
    pub fn remove_node(&mut self, location: Option<NodeLocation<'_>>, node_id: &str) -> usize {
        let before = self.history.len();
        match location {
            Some(loc) => {
                for (level, id) in loc.subtree_ids() {
                    self.timers.remove(level, id);
                }
                let level = loc.level();
                self.history.retain(|r| !r.belongs_to(level, node_id));
            }
            None => {
                let (dropped, kept): (Vec<SessionRecord>, Vec<SessionRecord>) =
                    std::mem::take(&mut self.history)
                        .into_iter()
                        .partition(|r| r.mentions(node_id));
                self.history = kept;
                for level in [NodeLevel::Project, NodeLevel::Topic, NodeLevel::Subtopic] {
                    self.timers.remove(level, node_id);
                }
                for record in &dropped {
                    let under_project = record.project_id == node_id;
                    let under_topic = under_project || record.topic_id.as_deref() == Some(node_id);
                    if let (true, Some(topic)) = (under_project, &record.topic_id) {
                        self.timers.remove(NodeLevel::Topic, topic);
                    }
                    if let (true, Some(sub)) = (under_topic, &record.sub_topic_id) {
                        self.timers.remove(NodeLevel::Subtopic, sub);
                    }
                }
            }
        }
        before - self.history.len()
    }

    pub fn clear_history(&mut self) -> usize {
        let removed = self.history.len();
        self.history.clear();
        removed
    }
}

/// Turns finished intervals into ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRecorder {
    min_session_ms: u64,
}

impl SessionRecorder {
    pub fn new(min_session_ms: u64) -> Self {
        Self { min_session_ms }
    }

    /// Commit `interval` against the deepest node of `selection`.
    ///
    /// All checks run before anything is touched: on error the ledger is
    /// unchanged, on success both the node's total and the history log have
    /// been updated.
    pub fn commit(
        &self,
        ledger: &mut Ledger,
        interval: &Interval,
        selection: Option<&Selection>,
    ) -> Result<SessionRecord, CoreError> {
        let Some(selection) = selection else {
            warn!(duration_ms = interval.duration_ms, "commit without a selected project");
            return Err(CoreError::NoTaskSelected);
        };
        // A zero-length interval is never a session, whatever the minimum.
        let min_ms = self.min_session_ms.max(1);
        if interval.duration_ms < min_ms {
            return Err(CoreError::SessionTooShort {
                duration_ms: interval.duration_ms,
                min_ms,
            });
        }

        let record = SessionRecord::new(selection, interval);
        ledger
            .timers
            .add(selection.level(), selection.deepest_id(), interval.duration_ms);
        ledger.history.insert(0, record.clone());

        info!(
            node = %selection,
            level = %selection.level(),
            duration_ms = interval.duration_ms,
            "session recorded"
        );
        Ok(record)
    }
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SESSION_MS)
    }
}
