use crate::channel::{Channel, ChannelSet};
use crate::errors::RecorderError;

/// The framing marker for one context: `--<token>-- SEP`, no newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    frame: String,
}

impl Separator {
    pub fn new(token: &str) -> Self {
        Self {
            frame: format!("--{token}-- SEP"),
        }
    }

    pub fn frame(&self) -> &str {
        &self.frame
    }

    pub fn emit(&self, channels: &mut ChannelSet) -> Result<(), RecorderError> {
        for channel in Channel::ALL {
            channels.write(channel, &self.frame)?;
        }
        channels.flush()
    }

    pub fn count_frames(&self, text: &str) -> usize {
        text.matches(self.frame.as_str()).count()
    }

    pub fn split_steps<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split(self.frame.as_str()).collect()
    }
}
