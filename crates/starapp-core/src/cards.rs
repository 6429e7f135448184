//! Card response builder: maps tracker output into the chat client's `cardsV2` widget
//! trees. Text uses the platform's limited HTML subset (`<b>`, `<font color>`).

use crate::model::{CoinSummary, DailyTally, LogEntry, MoodTier, Outcome, OutcomeStatus, OutcomeType, User};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Form input names shared by the card builders and the dispatcher.
pub const FIELD_OUTCOMES_PREFIX: &str = "outcomes";
pub const FIELD_COMPLETED: &str = "completed";
pub const FIELD_CUSTOM_OUTCOME: &str = "customOutcome";

/// Card action function names.
pub const ACTION_ADD_EARNING: &str = "addEarningOutcome";
pub const ACTION_SUBMIT_OUTCOMES: &str = "submitOutcomes";
pub const ACTION_SUBMIT_COMPLETED: &str = "submitCompletedOutcomes";

pub const HELP_TEXT: &str = "I didn't understand that. Type **hi** to see your progress, **outcomes** to set today's goals, **selected** to mark them complete, **progress** for today's tally or **smiley** for your mood meter.";

/// Body of a webhook reply: `{ "text": ... }`, `{ "cardsV2": [...] }` or `{}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Text {
        text: String,
    },
    Cards {
        #[serde(rename = "cardsV2")]
        cards_v2: Vec<Value>,
    },
    Empty {},
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn card(card_id: &str, card: Value) -> Self {
        Self::Cards {
            cards_v2: vec![json!({ "cardId": card_id, "card": card })],
        }
    }

    pub fn empty() -> Self {
        Self::Empty {}
    }

    /// Text payload, if this is a text reply.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn card_id(&self) -> Option<&str> {
        match self {
            Self::Cards { cards_v2 } => cards_v2.first()?.get("cardId")?.as_str(),
            _ => None,
        }
    }
}

/// Icon URLs used on the cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconSet {
    pub impressive: String,
    pub coin: String,
    pub badge: String,
    pub learning: String,
    pub earning: String,
    pub contribution: String,
    pub sad: String,
    pub neutral: String,
    pub happy: String,
}

const ICON_BASE: &str = "https://startapp-images-tibil.s3.us-east-1.amazonaws.com";

impl Default for IconSet {
    fn default() -> Self {
        Self {
            impressive: format!("{ICON_BASE}/impressive-bot.png"),
            coin: format!("{ICON_BASE}/star-bot.png"),
            badge: format!("{ICON_BASE}/Reward+(1)+(1).png"),
            learning: format!("{ICON_BASE}/learning.png"),
            earning: format!("{ICON_BASE}/earning.png"),
            contribution: format!("{ICON_BASE}/contribution.png"),
            sad: format!("{ICON_BASE}/smiley-sad.png"),
            neutral: format!("{ICON_BASE}/smiley-neutral.png"),
            happy: format!("{ICON_BASE}/smiley-happy.png"),
        }
    }
}

impl IconSet {
    pub fn for_type(&self, ty: OutcomeType) -> &str {
        match ty {
            OutcomeType::Learning => &self.learning,
            OutcomeType::Earning => &self.earning,
            OutcomeType::Contribution => &self.contribution,
        }
    }

    pub fn for_tier(&self, tier: MoodTier) -> &str {
        match tier {
            MoodTier::Sad => &self.sad,
            MoodTier::Neutral => &self.neutral,
            MoodTier::Happy => &self.happy,
        }
    }
}

/// Presentation settings carried into every card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardStyle {
    pub app_url: String,
    pub quote: String,
    pub icons: IconSet,
}

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            app_url: "https://starapp.example.com".to_string(),
            quote: "Stars don't shine without darkness. Embrace the journey and illuminate your path!".to_string(),
            icons: IconSet::default(),
        }
    }
}

fn greeting(now: DateTime<Utc>) -> &'static str {
    match now.hour() {
        0..=11 => "Good morning",
        12..=16 => "Good afternoon",
        _ => "Good evening",
    }
}

/// Card text is an HTML subset; user-typed outcome text must not inject markup.
fn escape_markup(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn text_paragraph(text: impl Into<String>) -> Value {
    json!({ "textParagraph": { "text": text.into() } })
}

fn icon_text(icon_url: &str, alt: &str, text: impl Into<String>) -> Value {
    json!({
        "decoratedText": {
            "icon": { "iconUrl": icon_url, "altText": alt },
            "text": text.into()
        }
    })
}

fn centered_column(widgets: Vec<Value>) -> Value {
    json!({
        "horizontalAlignment": "CENTER",
        "verticalAlignment": "CENTER",
        "widgets": widgets
    })
}

fn columns(items: Vec<Value>) -> Value {
    json!({ "columns": { "columnItems": items } })
}

fn action_button(text: &str, function: &str) -> Value {
    json!({ "text": text, "onClick": { "action": { "function": function } } })
}

fn link_button(text: &str, url: &str) -> Value {
    json!({ "text": text, "onClick": { "openLink": { "url": url } } })
}

fn button_list(buttons: Vec<Value>) -> Value {
    json!({ "buttonList": { "buttons": buttons } })
}

/// Value placed on an outcome checkbox; decoded by [`crate::event::decode_selection`].
pub fn outcome_value(outcome_id: i64) -> String {
    json!({ "id": outcome_id }).to_string()
}

/// Morning greeting with coin and badge totals ("hi").
pub fn daily_progress_card(
    style: &CardStyle,
    user: &User,
    summary: &CoinSummary,
    now: DateTime<Utc>,
) -> ChatResponse {
    let gain = summary.gain_over_yesterday();
    let (headline, detail) = if gain > 0 {
        (
            "<b>Impressive!</b>".to_string(),
            format!("You've earned <b><font color='#4CAF50'>{gain} ↑</font></b> coins more than yesterday! ✨"),
        )
    } else if summary.coins_today > 0 {
        (
            "<b>Nice work!</b>".to_string(),
            format!("You've earned <b>{}</b> coins today.", summary.coins_today),
        )
    } else {
        (
            "<b>Ready when you are!</b>".to_string(),
            "Complete an outcome today to start earning coins.".to_string(),
        )
    };

    let card = json!({
        "header": { "title": format!("{}, {}!", greeting(now), user.first_name()) },
        "sections": [
            { "widgets": [text_paragraph(format!("<b><font color='#D4A017'>{}</font></b>", style.quote))] },
            { "widgets": [columns(vec![
                centered_column(vec![json!({
                    "decoratedText": { "icon": { "iconUrl": style.icons.impressive, "altText": "Impressive Emoji" } }
                })]),
                centered_column(vec![text_paragraph(headline), text_paragraph(detail)]),
            ])] },
            { "widgets": [columns(vec![
                centered_column(vec![icon_text(&style.icons.coin, "Coin Icon", format!("<b>{}</b> coins", summary.total_coins))]),
                centered_column(vec![icon_text(&style.icons.badge, "Badge Icon", format!("<b>{}</b> badges", summary.total_badges))]),
            ])] },
            { "widgets": [button_list(vec![link_button("Go to Star App →", &style.app_url)])] }
        ]
    });
    ChatResponse::card("daily-progress-card", card)
}

/// Morning selection card ("outcomes"): one checkbox group per outcome type plus a free
/// text field for a custom Earning outcome.
pub fn outcome_selection_card(
    style: &CardStyle,
    outcomes: &[Outcome],
    selected: &HashSet<i64>,
) -> ChatResponse {
    let mut sections: Vec<Value> = OutcomeType::ALL
        .into_iter()
        .filter_map(|ty| {
            let items: Vec<Value> = outcomes
                .iter()
                .filter(|o| o.outcome_type == ty)
                .map(|o| {
                    json!({
                        "text": format!("{} ({} coins)", escape_markup(&o.text), o.coins),
                        "value": outcome_value(o.id),
                        "selected": selected.contains(&o.id)
                    })
                })
                .collect();
            if items.is_empty() {
                return None;
            }
            Some(json!({
                "widgets": [
                    icon_text(style.icons.for_type(ty), ty.as_str(), format!("<b><font color='#333'>{}</font></b>", ty)),
                    {
                        "selectionInput": {
                            "name": format!("{FIELD_OUTCOMES_PREFIX}_{}", ty.as_str()),
                            "type": "CHECK_BOX",
                            "items": items
                        }
                    }
                ]
            }))
        })
        .collect();

    if sections.is_empty() {
        sections.push(json!({ "widgets": [text_paragraph("No outcomes are available yet.")] }));
    }

    sections.push(json!({
        "widgets": [
            { "textInput": { "name": FIELD_CUSTOM_OUTCOME, "label": "Add your own earning outcome" } },
            button_list(vec![action_button("Add", ACTION_ADD_EARNING)])
        ]
    }));
    sections.push(json!({
        "widgets": [button_list(vec![action_button("Submit", ACTION_SUBMIT_OUTCOMES)])]
    }));

    let card = json!({
        "header": { "title": "Set your outcomes for the day", "subtitle": "Track your progress and stay motivated!" },
        "sections": sections
    });
    ChatResponse::card("outcome-card", card)
}

/// Evening confirmation card ("selected"): today's checked outcomes as checkboxes.
pub fn completion_card(style: &CardStyle, entries: &[(LogEntry, Outcome)]) -> ChatResponse {
    if entries.is_empty() {
        return ChatResponse::text(
            "You haven't set any outcomes today. Type **outcomes** to pick some.",
        );
    }

    let pending: Vec<Value> = entries
        .iter()
        .filter(|(e, _)| e.status == OutcomeStatus::Checked)
        .map(|(_, o)| json!({ "text": escape_markup(&o.text), "value": outcome_value(o.id), "selected": false }))
        .collect();
    let done: Vec<Value> = entries
        .iter()
        .filter(|(e, _)| e.status == OutcomeStatus::Completed)
        .map(|(_, o)| icon_text(style.icons.for_type(o.outcome_type), o.outcome_type.as_str(), format!("✅ {}", escape_markup(&o.text))))
        .collect();

    let mut sections = Vec::new();
    if !pending.is_empty() {
        sections.push(json!({
            "header": "Which outcomes did you complete?",
            "widgets": [
                { "selectionInput": { "name": FIELD_COMPLETED, "type": "CHECK_BOX", "items": pending } },
                button_list(vec![action_button("Submit", ACTION_SUBMIT_COMPLETED)])
            ]
        }));
    }
    if !done.is_empty() {
        sections.push(json!({ "header": "Already completed", "widgets": done }));
    }

    let card = json!({
        "header": { "title": "How did today go?", "subtitle": "Confirm the outcomes you finished" },
        "sections": sections
    });
    ChatResponse::card("completion-card", card)
}

fn tier_message(tier: MoodTier) -> &'static str {
    match tier {
        MoodTier::Sad => "Tomorrow is a fresh start. Pick one outcome you can finish!",
        MoodTier::Neutral => "Good progress! You're halfway there.",
        MoodTier::Happy => "Outstanding! You crushed today's goals.",
    }
}

/// Smiley meter ("smiley" and after submitting completions).
pub fn smiley_meter_card(style: &CardStyle, tally: &DailyTally, newly_completed: Option<u32>) -> ChatResponse {
    let tier = tally.mood_tier();
    let mut widgets = vec![
        icon_text(
            style.icons.for_tier(tier),
            tier.as_str(),
            format!(
                "<b>{}/{}</b> outcomes completed ({:.0}%)",
                tally.completed,
                tally.checked,
                tally.completion_ratio()
            ),
        ),
        text_paragraph(tier_message(tier)),
    ];
    if let Some(n) = newly_completed {
        widgets.insert(0, text_paragraph(format!("🎉 {n} outcome(s) marked complete.")));
    }
    let card = json!({
        "header": { "title": "Your smiley meter", "subtitle": "Today's completion rate" },
        "sections": [{ "widgets": widgets }]
    });
    ChatResponse::card("smiley-meter-card", card)
}

/// Plain-text tally ("progress").
pub fn progress_text(tally: &DailyTally, summary: &CoinSummary) -> ChatResponse {
    if tally.checked == 0 {
        return ChatResponse::text(format!(
            "📌 No outcomes set for today yet. Type **outcomes** to pick some.\n🪙 Total coins: {}",
            summary.total_coins
        ));
    }
    ChatResponse::text(format!(
        "📊 Today: {} of {} outcomes completed ({:.0}%).\n⏳ Pending: {}\n🪙 Total coins: {}\n🏅 Badges: {}",
        tally.completed,
        tally.checked,
        tally.completion_ratio(),
        tally.pending(),
        summary.total_coins,
        summary.total_badges
    ))
}

pub fn help_text() -> ChatResponse {
    ChatResponse::text(HELP_TEXT)
}

pub fn welcome_text(name: Option<&str>) -> ChatResponse {
    ChatResponse::text(format!(
        "Thanks for adding StarApp, {}! ☀️ Type **hi** to see your progress.",
        name.unwrap_or("there")
    ))
}
