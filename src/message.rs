use std::time::SystemTime;
use anyhow::anyhow;

/// The application level unit that is pushed through all protocols under test
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub timestamp: SystemTime,
    pub content: String,
    /// This is the message's identity on the wire: it is used as the sequence number that
    ///  correlates all chunks of the message
    pub number: u64,
    pub is_valid: bool,
}

/// The part of a [Message] that the fire-and-forget variant puts on the wire, in a simple
///  ASCII representation:
///
/// ```ascii
/// ID:<id>|CONTENT:<content>|NUMBER:<number>
/// ```
///
/// The id must not contain `|CONTENT:`; the content is free text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageBody {
    pub id: String,
    pub content: String,
    pub number: u64,
}

impl MessageBody {
    const ID_PREFIX: &'static str = "ID:";
    const CONTENT_SEPARATOR: &'static str = "|CONTENT:";
    const NUMBER_SEPARATOR: &'static str = "|NUMBER:";

    pub fn format(&self) -> String {
        format!("{}{}{}{}{}{}", Self::ID_PREFIX, self.id, Self::CONTENT_SEPARATOR, self.content, Self::NUMBER_SEPARATOR, self.number)
    }

    pub fn parse(data: &str) -> anyhow::Result<MessageBody> {
        let rest = data.strip_prefix(Self::ID_PREFIX)
            .ok_or_else(|| anyhow!("message body does not start with {}", Self::ID_PREFIX))?;
        let (id, rest) = rest.split_once(Self::CONTENT_SEPARATOR)
            .ok_or_else(|| anyhow!("message body has no content"))?;
        let (content, number) = rest.rsplit_once(Self::NUMBER_SEPARATOR)
            .ok_or_else(|| anyhow!("message body has no number"))?;

        Ok(MessageBody {
            id: id.to_string(),
            content: content.to_string(),
            number: number.parse()?,
        })
    }
}

impl From<&Message> for MessageBody {
    fn from(msg: &Message) -> Self {
        MessageBody {
            id: msg.id.clone(),
            content: msg.content.clone(),
            number: msg.number,
        }
    }
}
