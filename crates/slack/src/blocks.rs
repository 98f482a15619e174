use hedgeflow_core::notify::ChatMessage;
use serde::Serialize;

/// Slack rejects section text longer than 3000 characters; stay under it.
pub const MAX_SECTION_CHARS: usize = 2900;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
    Divider { block_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Splits `text` into pieces of at most `max_chars` characters, preferring
/// line breaks as cut points. A zero limit is treated as one.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len <= max_chars {
            current.push_str(line);
            current_len += line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let mut chars = line.chars().peekable();
        while chars.peek().is_some() {
            let piece: String = chars.by_ref().take(max_chars).collect();
            let piece_len = piece.chars().count();
            if piece_len == max_chars {
                chunks.push(piece);
            } else {
                current = piece;
                current_len = piece_len;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.into_iter().map(|chunk| chunk.trim_end().to_string()).filter(|chunk| !chunk.is_empty()).collect()
}

/// Block Kit layout for a risk alert: headline, research body and the sheet
/// link.
pub fn research_alert_message(message: &ChatMessage) -> MessageTemplate {
    let mut builder = MessageBuilder::new(message.render_text())
        .header("research.alert.header.v1", message.headline.clone());

    for (index, chunk) in chunk_text(&message.body, MAX_SECTION_CHARS).into_iter().enumerate() {
        builder = builder.section(format!("research.alert.body.{}.v1", index + 1), |section| {
            section.mrkdwn(chunk);
        });
    }

    if let Some(link) = &message.sheet_link {
        builder = builder.divider("research.alert.divider.v1").context(
            "research.alert.link.v1",
            |context| {
                context.mrkdwn(format!("<{link}|View research sheet>"));
            },
        );
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use hedgeflow_core::notify::ChatMessage;

    use super::{
        chunk_text, research_alert_message, Block, MessageBuilder, TextObject, MAX_SECTION_CHARS,
    };

    fn alert(body: &str, sheet_link: Option<&str>) -> ChatMessage {
        ChatMessage {
            channel: "C0ALERTS".to_string(),
            headline: "Attention required for NVDA".to_string(),
            body: body.to_string(),
            sheet_link: sheet_link.map(str::to_string),
        }
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .header("research.header.v1", "Headline")
            .section("research.summary.v1", |section| {
                section.mrkdwn("*Summary*");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[1],
            Block::Section { block_id, text: TextObject::Mrkdwn { .. } } if block_id == "research.summary.v1"
        ));
    }

    #[test]
    fn text_objects_serialize_with_slack_type_names() {
        let header = serde_json::to_value(TextObject::plain("hi")).expect("serialize");
        let body = serde_json::to_value(TextObject::mrkdwn("*hi*")).expect("serialize");
        assert_eq!(header["type"], "plain_text");
        assert_eq!(body["type"], "mrkdwn");
    }

    #[test]
    fn alert_includes_headline_body_and_link() {
        let message = research_alert_message(&alert(
            "Debt load is rising",
            Some("https://docs.google.com/spreadsheets/d/abc"),
        ));

        assert!(matches!(
            &message.blocks[0],
            Block::Header { text, .. } if text.text() == "Attention required for NVDA"
        ));
        assert!(matches!(
            &message.blocks[1],
            Block::Section { text, .. } if text.text() == "Debt load is rising"
        ));
        assert!(matches!(
            message.blocks.last(),
            Some(Block::Context { elements, .. })
                if elements[0].text() == "<https://docs.google.com/spreadsheets/d/abc|View research sheet>"
        ));
        assert!(message.fallback_text.starts_with("*Attention required for NVDA*"));
    }

    #[test]
    fn alert_without_link_has_no_link_block() {
        let message = research_alert_message(&alert("Debt load is rising", None));
        assert_eq!(message.blocks.len(), 2);
    }

    #[test]
    fn long_bodies_are_split_across_sections() {
        let body = "x".repeat(3000);
        let message = research_alert_message(&alert(&body, None));
        let sections: Vec<&Block> =
            message.blocks.iter().filter(|block| matches!(block, Block::Section { .. })).collect();

        assert_eq!(sections.len(), 2);
        for block in sections {
            if let Block::Section { text, .. } = block {
                assert!(text.text().chars().count() <= MAX_SECTION_CHARS);
            }
        }
    }

    #[test]
    fn chunks_prefer_line_breaks() {
        let chunks = chunk_text("alpha\nbeta\ngamma", 11);
        assert_eq!(chunks, vec!["alpha\nbeta".to_string(), "gamma".to_string()]);
        assert!(chunk_text("", 10).is_empty());
    }

    #[test]
    fn zero_limit_still_terminates() {
        assert_eq!(chunk_text("abc", 0), vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
