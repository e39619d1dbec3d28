//! Outbound pose publication.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tagtrack_core::TransformMsg;

use crate::SinkError;

/// Where a pose is published.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseChannel {
    /// Transform tree broadcast; child names carry the configured postfix.
    Tf,
    /// Dedicated pose topic.
    Topic,
}

/// Camera-to-object transform with its frame names and timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub stamp: f64,
    pub parent_frame: String,
    pub child_frame: String,
    pub transform: TransformMsg,
}

pub trait PoseSink {
    fn publish(&mut self, channel: PoseChannel, msg: &PoseStamped) -> Result<(), SinkError>;
}

/// Keeps every published message in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub messages: Vec<(PoseChannel, PoseStamped)>,
}

impl MemorySink {
    pub fn on(&self, channel: PoseChannel) -> impl Iterator<Item = &PoseStamped> {
        self.messages
            .iter()
            .filter(move |(c, _)| *c == channel)
            .map(|(_, m)| m)
    }
}

impl PoseSink for MemorySink {
    fn publish(&mut self, channel: PoseChannel, msg: &PoseStamped) -> Result<(), SinkError> {
        self.messages.push((channel, msg.clone()));
        Ok(())
    }
}

/// Writes one JSON object per message and line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

#[derive(Serialize)]
struct Line<'a> {
    channel: PoseChannel,
    #[serde(flatten)]
    msg: &'a PoseStamped,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PoseSink for JsonLinesSink<W> {
    fn publish(&mut self, channel: PoseChannel, msg: &PoseStamped) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &Line { channel, msg })?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}
