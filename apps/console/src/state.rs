use dioxus::prelude::*;

use crate::fixtures::questions::sample_questions;
use crate::query::Question;

pub type AppSignal = Signal<AppState>;

#[derive(Clone, Debug, Default)]
pub struct AppState {
    /// Slug of the demo question shown on the dashboard; `None` renders an
    /// empty chart.
    pub selected_question: Option<String>,
}

impl AppState {
    pub fn question(&self) -> Option<Question> {
        let slug = self.selected_question.as_deref()?;
        sample_questions()
            .into_iter()
            .find(|(candidate, _)| *candidate == slug)
            .map(|(_, question)| question)
    }
}

#[derive(Clone, Copy)]
pub struct AppActions {
    state: AppSignal,
}

impl AppActions {
    pub fn select_question(&self, slug: Option<String>) {
        let mut state = self.state;
        if state.read().selected_question != slug {
            tracing::info!(?slug, "question selected");
            state.write().selected_question = slug;
        }
    }
}

pub fn use_app_state() -> AppSignal {
    use_context::<AppSignal>()
}

pub fn use_app_actions() -> AppActions {
    let state = use_app_state();
    AppActions { state }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_selected_question_by_slug() {
        let state = AppState {
            selected_question: Some("saved-orders-by-month".into()),
        };
        let question: Question = state.question().expect("known slug");
        assert_eq!(question.id(), Some(1));

        let unknown = AppState {
            selected_question: Some("missing".into()),
        };
        assert!(unknown.question().is_none());
        assert!(AppState::default().question().is_none());
    }
}
