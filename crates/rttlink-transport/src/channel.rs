//! RTT channel layout.
//!
//! Up and down channels are numbered independently, so up channel 0 and
//! down channel 0 are distinct channels that merely share an index.

use std::fmt;

/// Data direction of an RTT channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelDirection {
    /// Device to host.
    Up,
    /// Host to device.
    Down,
}

impl ChannelDirection {
    /// Lowercase name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelDirection::Up => "up",
            ChannelDirection::Down => "down",
        }
    }
}

impl fmt::Display for ChannelDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One channel as reported by the target's RTT control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Channel number within its direction.
    pub index: u32,
    /// Direction of the channel.
    pub direction: ChannelDirection,
    /// Channel name from the control block (may be empty).
    pub name: String,
    /// Size of the target-side ring buffer in bytes.
    pub size: u32,
}

impl ChannelDescriptor {
    /// Create a new channel descriptor.
    pub fn new(
        index: u32,
        direction: ChannelDirection,
        name: impl Into<String>,
        size: u32,
    ) -> Self {
        Self {
            index,
            direction,
            name: name.into(),
            size,
        }
    }
}

/// Channel layout of one RTT session. Read-only once produced by `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTable {
    channels: Vec<ChannelDescriptor>,
}

impl ChannelTable {
    /// Build a table from an ordered list of descriptors.
    pub fn new(channels: Vec<ChannelDescriptor>) -> Self {
        Self { channels }
    }

    /// Build a table from separately reported up and down channel lists.
    ///
    /// Probe drivers enumerate each direction on its own; the resulting
    /// table lists down channels first, then up channels.
    pub fn from_parts(
        up: impl IntoIterator<Item = (String, u32)>,
        down: impl IntoIterator<Item = (String, u32)>,
    ) -> Self {
        let down = down
            .into_iter()
            .enumerate()
            .map(|(i, (name, size))| (i, ChannelDirection::Down, name, size));
        let up = up
            .into_iter()
            .enumerate()
            .map(|(i, (name, size))| (i, ChannelDirection::Up, name, size));

        let channels = down
            .chain(up)
            .filter_map(|(i, direction, name, size)| {
                u32::try_from(i)
                    .ok()
                    .map(|index| ChannelDescriptor::new(index, direction, name, size))
            })
            .collect();

        Self { channels }
    }

    /// Iterate over every channel in table order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChannelDescriptor> {
        self.channels.iter()
    }

    /// Up (device→host) channels in table order.
    pub fn up(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.iter().filter(|c| c.direction == ChannelDirection::Up)
    }

    /// Down (host→device) channels in table order.
    pub fn down(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.iter().filter(|c| c.direction == ChannelDirection::Down)
    }

    /// Find the first channel matching both index and direction.
    pub fn find(&self, index: u32, direction: ChannelDirection) -> Option<&ChannelDescriptor> {
        self.iter()
            .find(|c| c.index == index && c.direction == direction)
    }

    /// Number of channels in the table.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the table has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChannelTable {
    type Item = &'a ChannelDescriptor;
    type IntoIter = std::slice::Iter<'a, ChannelDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<ChannelDescriptor> for ChannelTable {
    fn from_iter<I: IntoIterator<Item = ChannelDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
