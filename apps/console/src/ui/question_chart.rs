use dioxus::prelude::*;

use crate::fixtures::questions::sample_questions;
use crate::hooks::question_timelines::use_question_timeline_events;
use crate::models::{Timeline, TimelineEvent};
use crate::state::{use_app_actions, use_app_state};
use crate::timelines::{should_display_timelines, FetchStatus};

const CHIP_BASE_CLASS: &str = "px-3 py-1 rounded-full border text-xs transition-colors";
const CHIP_ACTIVE_CLASS: &str = "bg-slate-900 text-white border-slate-900";
const CHIP_IDLE_CLASS: &str = "bg-white text-slate-600 border-slate-200 hover:bg-slate-100";

#[component]
pub fn QuestionPicker() -> Element {
    let actions = use_app_actions();
    let selected = use_app_state().read().selected_question.clone();

    let chip_class = |active: bool| {
        format!(
            "{CHIP_BASE_CLASS} {}",
            if active { CHIP_ACTIVE_CLASS } else { CHIP_IDLE_CLASS }
        )
    };

    rsx! {
        div { class: "flex flex-wrap gap-2",
            button {
                class: chip_class(selected.is_none()),
                onclick: move |_| actions.select_question(None),
                "No question"
            }
            for (slug, question) in sample_questions() {
                button {
                    key: "{slug}",
                    class: chip_class(selected.as_deref() == Some(slug)),
                    onclick: move |_| actions.select_question(Some(slug.to_string())),
                    "{question.display_name()}"
                }
            }
        }
    }
}

/// Chart shell for the selected question with its timeline overlay.
#[component]
pub fn QuestionChart() -> Element {
    let question = use_app_state().read().question();
    let eligible = should_display_timelines(question.as_ref());
    let loader = use_question_timeline_events(question.clone());
    let events = loader.read().events();

    let title = question
        .as_ref()
        .map(|q| q.display_name())
        .unwrap_or_else(|| "No question selected".to_string());
    let grouping = question.as_ref().and_then(|q| {
        q.breakouts()
            .iter()
            .find_map(|breakout| breakout.clause().temporal_unit().map(str::to_string))
    });

    let overlay = match events.status {
        FetchStatus::Idle => rsx! {
            p { class: "text-xs text-slate-500 italic",
                if eligible { "Waiting to load timelines." } else { "Timelines are only shown for charts grouped by a date or time." }
            }
        },
        FetchStatus::Loading => rsx! {
            p { class: "text-xs text-slate-500", "Loading timelines..." }
        },
        FetchStatus::Error => {
            let message = events
                .error
                .as_ref()
                .map(|err| err.to_string())
                .unwrap_or_default();
            rsx! {
                p { class: "text-xs text-red-500", "Could not load timelines: {message}" }
            }
        }
        FetchStatus::Success if events.timelines.is_empty() => rsx! {
            p { class: "text-xs text-slate-500 italic", "No timelines for this question." }
        },
        FetchStatus::Success => rsx! {
            div { class: "space-y-3",
                for timeline in events.timelines.iter() {
                    {render_timeline(timeline)}
                }
            }
        },
    };

    rsx! {
        section { class: "rounded-lg border border-slate-200 bg-white p-4 shadow-sm space-y-3",
            header { class: "flex items-center justify-between",
                div { class: "flex items-baseline gap-2",
                    h2 { class: "text-sm font-semibold text-slate-900", "{title}" }
                    if let Some(unit) = grouping {
                        span { class: "text-[11px] text-slate-500", "by {unit}" }
                    }
                }
                span { class: "text-[11px] font-mono text-slate-500", "timelines: {events.status.as_str()}" }
            }
            QuestionPicker {}
            {overlay}
        }
    }
}

fn render_timeline(timeline: &Timeline) -> Element {
    let icon = timeline.icon.clone().unwrap_or_else(|| "star".into());
    rsx! {
        div { key: "{timeline.id}", class: "rounded border border-slate-100 p-3",
            h3 { class: "text-xs font-semibold text-slate-800", "{timeline.name}" }
            span { class: "text-[11px] text-slate-400", "{icon}" }
            ul { class: "mt-2 space-y-1",
                for event in timeline.active_events() {
                    {render_event(event)}
                }
            }
        }
    }
}

fn render_event(event: &TimelineEvent) -> Element {
    let when = if event.time_matters {
        format!("{} {}", event.timestamp.date(), event.timestamp.time())
    } else {
        event.timestamp.date().to_string()
    };
    rsx! {
        li { key: "{event.id}", class: "flex gap-2 text-[11px] text-slate-600",
            span { class: "font-mono text-slate-400", "{when}" }
            span { "{event.name}" }
        }
    }
}
