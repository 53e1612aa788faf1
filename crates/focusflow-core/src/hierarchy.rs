//! Project / topic / sub-topic hierarchy and the selected node.
//!
//! The hierarchy itself is owned by an external project store; the engine
//! only reads it. Ids are unique across all three levels because the
//! aggregate-time maps are keyed by id alone.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "subProjects")]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_topics: Vec<SubTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTopic {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeLevel {
    Project,
    Topic,
    Subtopic,
}

impl NodeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeLevel::Project => "project",
            NodeLevel::Topic => "topic",
            NodeLevel::Subtopic => "subtopic",
        }
    }
}

impl fmt::Display for NodeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Id and display name of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    pub name: String,
}

impl NodeRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl From<&Project> for NodeRef {
    fn from(p: &Project) -> Self {
        NodeRef::new(&p.id, &p.name)
    }
}

impl From<&Topic> for NodeRef {
    fn from(t: &Topic) -> Self {
        NodeRef::new(&t.id, &t.name)
    }
}

impl From<&SubTopic> for NodeRef {
    fn from(s: &SubTopic) -> Self {
        NodeRef::new(&s.id, &s.name)
    }
}

/// The currently selected node, always carrying its ancestors.
///
/// A sub-topic cannot be selected without its topic and project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum Selection {
    Project {
        project: NodeRef,
    },
    Topic {
        project: NodeRef,
        topic: NodeRef,
    },
    #[serde(rename_all = "camelCase")]
    Subtopic {
        project: NodeRef,
        topic: NodeRef,
        sub_topic: NodeRef,
    },
}

impl Selection {
    pub fn of_project(project: &Project) -> Self {
        Selection::Project {
            project: project.into(),
        }
    }

    pub fn of_topic(project: &Project, topic: &Topic) -> Self {
        Selection::Topic {
            project: project.into(),
            topic: topic.into(),
        }
    }

    pub fn of_sub_topic(project: &Project, topic: &Topic, sub_topic: &SubTopic) -> Self {
        Selection::Subtopic {
            project: project.into(),
            topic: topic.into(),
            sub_topic: sub_topic.into(),
        }
    }

    /// Look up a selection by ids in the given hierarchy.
    ///
    /// Each id must exist under its parent.
    pub fn resolve(
        projects: &[Project],
        project_id: &str,
        topic_id: Option<&str>,
        sub_topic_id: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let project = projects
            .iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| ValidationError::UnknownNode {
                level: "project",
                id: project_id.to_string(),
            })?;

        let Some(topic_id) = topic_id else {
            if let Some(sub_topic_id) = sub_topic_id {
                return Err(ValidationError::InvalidValue {
                    field: "sub_topic".into(),
                    message: format!("'{sub_topic_id}' given without a topic"),
                });
            }
            return Ok(Selection::of_project(project));
        };

        let topic = project
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| ValidationError::UnknownNode {
                level: "topic",
                id: topic_id.to_string(),
            })?;

        let Some(sub_topic_id) = sub_topic_id else {
            return Ok(Selection::of_topic(project, topic));
        };

        let sub_topic = topic
            .sub_topics
            .iter()
            .find(|s| s.id == sub_topic_id)
            .ok_or_else(|| ValidationError::UnknownNode {
                level: "subtopic",
                id: sub_topic_id.to_string(),
            })?;

        Ok(Selection::of_sub_topic(project, topic, sub_topic))
    }

    pub fn level(&self) -> NodeLevel {
        match self {
            Selection::Project { .. } => NodeLevel::Project,
            Selection::Topic { .. } => NodeLevel::Topic,
            Selection::Subtopic { .. } => NodeLevel::Subtopic,
        }
    }

    /// The node time is attributed to.
    pub fn deepest(&self) -> &NodeRef {
        match self {
            Selection::Project { project } => project,
            Selection::Topic { topic, .. } => topic,
            Selection::Subtopic { sub_topic, .. } => sub_topic,
        }
    }

    pub fn deepest_id(&self) -> &str {
        &self.deepest().id
    }

    pub fn project(&self) -> &NodeRef {
        match self {
            Selection::Project { project }
            | Selection::Topic { project, .. }
            | Selection::Subtopic { project, .. } => project,
        }
    }

    pub fn topic(&self) -> Option<&NodeRef> {
        match self {
            Selection::Project { .. } => None,
            Selection::Topic { topic, .. } | Selection::Subtopic { topic, .. } => Some(topic),
        }
    }

    pub fn sub_topic(&self) -> Option<&NodeRef> {
        match self {
            Selection::Subtopic { sub_topic, .. } => Some(sub_topic),
            _ => None,
        }
    }

    /// Whether `node_id` is the selected node or one of its ancestors.
    pub fn contains(&self, node_id: &str) -> bool {
        self.project().id == node_id
            || self.topic().is_some_and(|t| t.id == node_id)
            || self.sub_topic().is_some_and(|s| s.id == node_id)
    }

    /// Same attributed node, regardless of display names.
    pub fn same_node(&self, other: &Selection) -> bool {
        self.deepest_id() == other.deepest_id()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.project().name)?;
        if let Some(topic) = self.topic() {
            write!(f, " > {}", topic.name)?;
        }
        if let Some(sub) = self.sub_topic() {
            write!(f, " > {}", sub.name)?;
        }
        Ok(())
    }
}

/// Where a node sits in the hierarchy.
#[derive(Debug, Clone, Copy)]
pub enum NodeLocation<'a> {
    Project(&'a Project),
    Topic(&'a Project, &'a Topic),
    SubTopic(&'a Project, &'a Topic, &'a SubTopic),
}

impl<'a> NodeLocation<'a> {
    pub fn level(&self) -> NodeLevel {
        match self {
            NodeLocation::Project(_) => NodeLevel::Project,
            NodeLocation::Topic(..) => NodeLevel::Topic,
            NodeLocation::SubTopic(..) => NodeLevel::Subtopic,
        }
    }

    /// Every (level, id) in the subtree rooted at this node, the node first.
    pub fn subtree_ids(&self) -> Vec<(NodeLevel, &'a str)> {
        fn topic_ids<'t>(topic: &'t Topic, out: &mut Vec<(NodeLevel, &'t str)>) {
            out.push((NodeLevel::Topic, topic.id.as_str()));
            out.extend(
                topic
                    .sub_topics
                    .iter()
                    .map(|s| (NodeLevel::Subtopic, s.id.as_str())),
            );
        }

        let mut out = Vec::new();
        match *self {
            NodeLocation::Project(p) => {
                out.push((NodeLevel::Project, p.id.as_str()));
                for topic in &p.topics {
                    topic_ids(topic, &mut out);
                }
            }
            NodeLocation::Topic(_, t) => topic_ids(t, &mut out),
            NodeLocation::SubTopic(_, _, s) => out.push((NodeLevel::Subtopic, s.id.as_str())),
        }
        out
    }
}

/// Find a node by id at any level.
pub fn find_node<'a>(projects: &'a [Project], id: &str) -> Option<NodeLocation<'a>> {
    for project in projects {
        if project.id == id {
            return Some(NodeLocation::Project(project));
        }
        for topic in &project.topics {
            if topic.id == id {
                return Some(NodeLocation::Topic(project, topic));
            }
            if let Some(sub) = topic.sub_topics.iter().find(|s| s.id == id) {
                return Some(NodeLocation::SubTopic(project, topic, sub));
            }
        }
    }
    None
}

/// Check that no id appears twice anywhere in the hierarchy.
pub fn validate_unique_ids(projects: &[Project]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for project in projects {
        for (_, id) in NodeLocation::Project(project).subtree_ids() {
            if !seen.insert(id) {
                return Err(ValidationError::DuplicateId(id.to_string()));
            }
        }
    }
    Ok(())
}
