use serde::Serialize;

/// Cloud API cap on reply buttons per interactive message.
pub const MAX_BUTTONS: usize = 3;
/// Cloud API cap on list rows across all sections of one message. One
/// catalog page (8 rows) plus prev/next rows fits exactly.
pub const MAX_LIST_ROWS: usize = 10;

// Label length caps the transport rejects messages over.
const BUTTON_TITLE_CHARS: usize = 20;
const LIST_BUTTON_CHARS: usize = 20;
const SECTION_TITLE_CHARS: usize = 24;
const ROW_TITLE_CHARS: usize = 24;
const ROW_DESCRIPTION_CHARS: usize = 72;

/// One outbound reply. Built through [`ButtonPrompt`] and [`ListPrompt`] so
/// transport caps are enforced before anything reaches the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    Text { body: String },
    Buttons { body: String, buttons: Vec<Button> },
    List { body: String, button_label: String, sections: Vec<ListSection> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Button {
    pub id: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListSection {
    /// Required by the transport only when a message carries several
    /// sections; a lone unnamed section goes out without one.
    pub title: Option<String>,
    pub rows: Vec<ListRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Body text of the message, whatever its shape.
    pub fn body(&self) -> &str {
        match self {
            Self::Text { body } | Self::Buttons { body, .. } | Self::List { body, .. } => body,
        }
    }

    /// Wire payload for `POST /{phone_number_id}/messages`.
    pub fn payload(&self, to: &str) -> MessagePayload {
        let base = MessagePayload {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: to.to_string(),
            kind: "text",
            text: None,
            interactive: None,
        };

        match self {
            Self::Text { body } => MessagePayload {
                text: Some(TextContent { preview_url: false, body: body.clone() }),
                ..base
            },
            Self::Buttons { body, buttons } => MessagePayload {
                kind: "interactive",
                interactive: Some(InteractiveContent::Button {
                    body: BodyText { text: body.clone() },
                    action: ButtonAction {
                        buttons: buttons
                            .iter()
                            .map(|button| WireButton {
                                kind: "reply",
                                reply: ReplyContent {
                                    id: button.id.clone(),
                                    title: button.title.clone(),
                                },
                            })
                            .collect(),
                    },
                }),
                ..base
            },
            Self::List { body, button_label, sections } => MessagePayload {
                kind: "interactive",
                interactive: Some(InteractiveContent::List {
                    body: BodyText { text: body.clone() },
                    action: ListAction {
                        button: button_label.clone(),
                        sections: sections
                            .iter()
                            .map(|section| WireSection {
                                title: section.title.clone(),
                                rows: section
                                    .rows
                                    .iter()
                                    .map(|row| WireRow {
                                        id: row.id.clone(),
                                        title: row.title.clone(),
                                        description: row.description.clone(),
                                    })
                                    .collect(),
                            })
                            .collect(),
                    },
                }),
                ..base
            },
        }
    }
}

// Graph API message body. `type` names the sibling content field that is
// actually populated.
#[derive(Debug, Serialize)]
pub struct MessagePayload {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interactive: Option<InteractiveContent>,
}

#[derive(Debug, Serialize)]
struct TextContent {
    preview_url: bool,
    body: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InteractiveContent {
    Button { body: BodyText, action: ButtonAction },
    List { body: BodyText, action: ListAction },
}

#[derive(Debug, Serialize)]
struct BodyText {
    text: String,
}

#[derive(Debug, Serialize)]
struct ButtonAction {
    buttons: Vec<WireButton>,
}

#[derive(Debug, Serialize)]
struct WireButton {
    #[serde(rename = "type")]
    kind: &'static str,
    reply: ReplyContent,
}

#[derive(Debug, Serialize)]
struct ReplyContent {
    id: String,
    title: String,
}

#[derive(Debug, Serialize)]
struct ListAction {
    button: String,
    sections: Vec<WireSection>,
}

#[derive(Debug, Serialize)]
struct WireSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    rows: Vec<WireRow>,
}

#[derive(Debug, Serialize)]
struct WireRow {
    id: String,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// Bounded button prompt. Labels are clipped to the transport cap, buttons
/// beyond [`MAX_BUTTONS`] are dropped, and a prompt with no buttons degrades
/// to plain text so the reply still goes out.
pub struct ButtonPrompt {
    body: String,
    buttons: Vec<Button>,
}

impl ButtonPrompt {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into(), buttons: Vec::new() }
    }

    pub fn button(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.buttons
            .push(Button { id: id.into(), title: clip_chars(&title.into(), BUTTON_TITLE_CHARS) });
        self
    }

    pub fn build(self) -> OutboundMessage {
        if self.buttons.is_empty() {
            return OutboundMessage::Text { body: self.body };
        }
        let mut buttons = self.buttons;
        buttons.truncate(MAX_BUTTONS);
        OutboundMessage::Buttons { body: self.body, buttons }
    }
}

/// Sectioned list prompt in the closure-builder style of the rest of the
/// outbound surface.
pub struct ListPrompt {
    body: String,
    button_label: String,
    sections: Vec<ListSection>,
}

#[derive(Default)]
pub struct SectionRows {
    rows: Vec<ListRow>,
}

impl SectionRows {
    pub fn row(&mut self, id: impl Into<String>, title: impl Into<String>) -> &mut Self {
        self.rows.push(ListRow {
            id: id.into(),
            title: clip_chars(&title.into(), ROW_TITLE_CHARS),
            description: None,
        });
        self
    }

    pub fn row_with_description(
        &mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> &mut Self {
        self.rows.push(ListRow {
            id: id.into(),
            title: clip_chars(&title.into(), ROW_TITLE_CHARS),
            description: Some(clip_chars(&description.into(), ROW_DESCRIPTION_CHARS)),
        });
        self
    }
}

impl ListPrompt {
    pub fn new(body: impl Into<String>, button_label: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            button_label: clip_chars(&button_label.into(), LIST_BUTTON_CHARS),
            sections: Vec::new(),
        }
    }

    /// Appends a section. An empty title produces an unnamed section, which
    /// the transport accepts only on single-section messages.
    pub fn section<F>(mut self, title: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionRows),
    {
        let mut rows = SectionRows::default();
        build(&mut rows);

        let title = title.into();
        let title = if title.trim().is_empty() {
            None
        } else {
            Some(clip_chars(&title, SECTION_TITLE_CHARS))
        };
        self.sections.push(ListSection { title, rows: rows.rows });
        self
    }

    pub fn build(self) -> OutboundMessage {
        let mut remaining = MAX_LIST_ROWS;
        let mut sections = Vec::new();
        for mut section in self.sections {
            if remaining == 0 {
                break;
            }
            if section.rows.len() > remaining {
                section.rows.truncate(remaining);
            }
            remaining -= section.rows.len();
            if !section.rows.is_empty() {
                sections.push(section);
            }
        }

        if sections.is_empty() {
            return OutboundMessage::Text { body: self.body };
        }
        OutboundMessage::List { body: self.body, button_label: self.button_label, sections }
    }
}

fn clip_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ButtonPrompt, ListPrompt, OutboundMessage, MAX_LIST_ROWS};

    #[test]
    fn text_payload_matches_the_graph_wire_shape() {
        let message = OutboundMessage::text("أهلا وسهلا في سفرة!");
        let payload = serde_json::to_value(message.payload("962790001122")).expect("serialize");

        assert_eq!(
            payload,
            json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "962790001122",
                "type": "text",
                "text": {"preview_url": false, "body": "أهلا وسهلا في سفرة!"}
            })
        );
    }

    #[test]
    fn button_payload_nests_reply_buttons() {
        let message = ButtonPrompt::new("تأكيد الطلب؟")
            .button("confirm_order", "تأكيد")
            .button("modify_order", "تعديل")
            .build();
        let payload = serde_json::to_value(message.payload("962790001122")).expect("serialize");

        assert_eq!(payload["type"], "interactive");
        assert_eq!(payload["interactive"]["type"], "button");
        assert_eq!(payload["interactive"]["body"]["text"], "تأكيد الطلب؟");
        assert_eq!(
            payload["interactive"]["action"]["buttons"],
            json!([
                {"type": "reply", "reply": {"id": "confirm_order", "title": "تأكيد"}},
                {"type": "reply", "reply": {"id": "modify_order", "title": "تعديل"}}
            ])
        );
    }

    #[test]
    fn button_prompt_caps_at_three_and_clips_long_titles() {
        let long_title = "شاورما عربي مع بطاطا وثوم إضافي";
        let message = ButtonPrompt::new("اختر")
            .button("a", long_title)
            .button("b", "ب")
            .button("c", "ج")
            .button("d", "د")
            .build();

        let OutboundMessage::Buttons { buttons, .. } = message else {
            panic!("expected a button prompt");
        };
        assert_eq!(buttons.len(), 3);
        assert_eq!(buttons[0].title.chars().count(), 20);
        assert!(buttons[0].title.ends_with('…'));
        assert_eq!(buttons[2].id, "c");
    }

    #[test]
    fn empty_button_prompt_degrades_to_text() {
        let message = ButtonPrompt::new("لا خيارات").build();
        assert_eq!(message, OutboundMessage::Text { body: "لا خيارات".to_string() });
    }

    #[test]
    fn list_payload_carries_sections_and_skips_missing_descriptions() {
        let message = ListPrompt::new("شو بتحب تطلب؟", "القائمة")
            .section("مشاوي", |rows| {
                rows.row_with_description("item_1", "شاورما دجاج", "مع ثوم وبطاطا")
                    .row("item_2", "شاورما لحمة");
            })
            .build();
        let payload = serde_json::to_value(message.payload("962790001122")).expect("serialize");

        assert_eq!(payload["interactive"]["type"], "list");
        assert_eq!(payload["interactive"]["action"]["button"], "القائمة");
        assert_eq!(
            payload["interactive"]["action"]["sections"],
            json!([{
                "title": "مشاوي",
                "rows": [
                    {"id": "item_1", "title": "شاورما دجاج", "description": "مع ثوم وبطاطا"},
                    {"id": "item_2", "title": "شاورما لحمة"}
                ]
            }])
        );
    }

    #[test]
    fn unnamed_single_section_serializes_without_a_title() {
        let message = ListPrompt::new("المطاعم", "اختر")
            .section("", |rows| {
                rows.row("rest_1", "الريم");
            })
            .build();
        let payload = serde_json::to_value(message.payload("962790001122")).expect("serialize");

        let section = &payload["interactive"]["action"]["sections"][0];
        assert!(section.get("title").is_none());
        assert_eq!(section["rows"][0]["id"], "rest_1");
    }

    #[test]
    fn list_rows_clamp_to_the_transport_cap() {
        let mut prompt = ListPrompt::new("كل المطاعم", "اختر");
        prompt = prompt.section("الصفحة", |rows| {
            for index in 0..8 {
                rows.row(format!("rest_{index}"), format!("مطعم {index}"));
            }
        });
        prompt = prompt.section("تنقل", |rows| {
            rows.row("all_rest_page_0", "السابق")
                .row("all_rest_page_2", "التالي")
                .row("main_menu", "القائمة الرئيسية");
        });

        let OutboundMessage::List { sections, .. } = prompt.build() else {
            panic!("expected a list prompt");
        };
        let total: usize = sections.iter().map(|section| section.rows.len()).sum();
        assert_eq!(total, MAX_LIST_ROWS);
        assert_eq!(sections[1].rows.len(), 2);
        assert_eq!(sections[1].rows[1].id, "all_rest_page_2");
    }

    #[test]
    fn empty_list_prompt_degrades_to_text() {
        let message = ListPrompt::new("ما في نتائج", "اختر").build();
        assert_eq!(message, OutboundMessage::Text { body: "ما في نتائج".to_string() });
    }

    #[test]
    fn clipping_respects_character_boundaries() {
        let title: String = "م".repeat(30);
        let message = ListPrompt::new("عنوان", "اختر")
            .section("قسم", |rows| {
                rows.row("id", title);
            })
            .build();

        let OutboundMessage::List { sections, .. } = message else {
            panic!("expected a list prompt");
        };
        assert_eq!(sections[0].rows[0].title.chars().count(), 24);
        assert!(sections[0].rows[0].title.ends_with('…'));
    }
}
