use dioxus::prelude::*;
use serde::de::DeserializeOwned;

use crate::api::{ClientError, TimelineSource};
use crate::models::Timeline;
use crate::query::Question;
use crate::timelines::{fetch_timelines, QuestionKey, TimelineLoader};
use crate::API_CLIENT;

/// Question binding compared by [`QuestionKey`] rather than by value, so an
/// equal question rebuilt on every render does not restart the fetch.
#[derive(Clone, Debug)]
struct BoundQuestion {
    key: Option<QuestionKey>,
    question: Option<Question>,
}

impl BoundQuestion {
    fn new(question: Option<Question>) -> Self {
        Self {
            key: question.as_ref().map(QuestionKey::of),
            question,
        }
    }
}

impl PartialEq for BoundQuestion {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// Loads the timelines to overlay on `question`'s chart whenever the bound
/// question changes. Read the result through `TimelineLoader::events`.
pub fn use_question_timeline_events(question: Option<Question>) -> Signal<TimelineLoader<Timeline>> {
    use_timeline_events_from(API_CLIENT.get().cloned(), question)
}

/// [`use_question_timeline_events`] against an explicit source. A missing
/// source ends every eligible binding in `ClientError::NotConfigured`.
pub fn use_timeline_events_from<S, T>(
    source: Option<S>,
    question: Option<Question>,
) -> Signal<TimelineLoader<T>>
where
    S: TimelineSource + Clone + 'static,
    T: DeserializeOwned + 'static,
{
    let mut loader = use_signal(TimelineLoader::<T>::default);
    let bound = BoundQuestion::new(question);

    // Effects rerun whenever the reactive binding changes; superseded
    // requests are left to finish and dropped by generation.
    use_effect(use_reactive!(|(bound,)| {
        let Some(request) = loader.write().bind(bound.question.as_ref()) else {
            return;
        };

        let Some(source) = source.clone() else {
            loader
                .write()
                .complete(request.generation, Err(ClientError::NotConfigured));
            return;
        };

        spawn(async move {
            let result = fetch_timelines::<_, T>(&source, &request).await;
            if !loader.write().complete(request.generation, result) {
                tracing::debug!(
                    generation = request.generation,
                    "dropped timelines for a superseded question"
                );
            }
        });
    }));

    loader
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ClientResult, TimelineParams};
    use crate::fixtures::questions::{orders_question, saved_orders_by_month, unsaved_orders_by_month};
    use crate::query::CardId;
    use crate::timelines::FetchStatus;
    use dioxus::dioxus_core::NoOpMutations;
    use futures::channel::oneshot;
    use futures::FutureExt;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Source whose responses wait until the test releases them.
    #[derive(Clone, Default)]
    struct HeldSource {
        waiting: Rc<RefCell<Vec<oneshot::Sender<()>>>>,
    }

    impl HeldSource {
        async fn hold(&self) {
            let (tx, rx) = oneshot::channel();
            self.waiting.borrow_mut().push(tx);
            let _ = rx.await;
        }

        fn waiting(&self) -> usize {
            self.waiting.borrow().len()
        }

        fn release(&self) {
            for tx in self.waiting.borrow_mut().drain(..) {
                let _ = tx.send(());
            }
        }
    }

    impl TimelineSource for HeldSource {
        async fn card_timelines<T>(&self, card_id: CardId, _: &TimelineParams) -> ClientResult<Vec<T>>
        where
            T: DeserializeOwned,
        {
            self.hold().await;
            serde_json::from_value(json!([format!("card {card_id}")])).map_err(ClientError::from)
        }

        async fn all_timelines<T>(&self, _: &TimelineParams) -> ClientResult<Vec<T>>
        where
            T: DeserializeOwned,
        {
            self.hold().await;
            serde_json::from_value(json!(["all"])).map_err(ClientError::from)
        }
    }

    type Snapshot = (FetchStatus, Vec<String>);

    thread_local! {
        static SOURCE: HeldSource = HeldSource::default();
        static QUESTION: RefCell<Option<Signal<Option<Question>>>> = const { RefCell::new(None) };
        static RENDERS: RefCell<Vec<Snapshot>> = const { RefCell::new(Vec::new()) };
    }

    #[component]
    fn Chart() -> Element {
        let question = use_signal(|| None::<Question>);
        QUESTION.with(|slot| *slot.borrow_mut() = Some(question));

        let source = SOURCE.with(HeldSource::clone);
        let loader = use_timeline_events_from::<_, String>(Some(source), question.read().clone());
        let events = loader.read().events();
        RENDERS.with(|renders| {
            renders
                .borrow_mut()
                .push((events.status, events.timelines.clone()))
        });

        rsx! { span { "{events.status.as_str()}" } }
    }

    fn settle(dom: &mut VirtualDom) {
        for _ in 0..32 {
            if dom.wait_for_work().now_or_never().is_none() {
                break;
            }
            dom.render_immediate(&mut NoOpMutations);
        }
    }

    fn select(dom: &mut VirtualDom, next: Option<Question>) {
        let mut question = QUESTION.with(|slot| slot.borrow().expect("chart rendered"));
        dom.in_runtime(move || question.set(next));
        settle(dom);
    }

    fn last_render() -> Snapshot {
        RENDERS.with(|renders| renders.borrow().last().cloned().expect("rendered at least once"))
    }

    fn waiting() -> usize {
        SOURCE.with(HeldSource::waiting)
    }

    fn release(dom: &mut VirtualDom) {
        SOURCE.with(HeldSource::release);
        settle(dom);
    }

    #[test]
    fn reruns_the_cycle_for_every_new_question() {
        let mut dom = VirtualDom::new(Chart);
        dom.rebuild_in_place();
        settle(&mut dom);
        assert_eq!(last_render(), (FetchStatus::Idle, vec![]));
        assert_eq!(waiting(), 0);

        select(&mut dom, Some(saved_orders_by_month()));
        assert_eq!(last_render(), (FetchStatus::Loading, vec![]));
        assert_eq!(waiting(), 1);

        release(&mut dom);
        assert_eq!(last_render(), (FetchStatus::Success, vec!["card 1".to_string()]));

        select(&mut dom, Some(unsaved_orders_by_month()));
        assert_eq!(last_render(), (FetchStatus::Loading, vec!["card 1".to_string()]));
        assert_eq!(waiting(), 1);

        release(&mut dom);
        assert_eq!(last_render(), (FetchStatus::Success, vec!["all".to_string()]));

        select(&mut dom, Some(orders_question()));
        assert_eq!(last_render(), (FetchStatus::Idle, vec![]));
        assert_eq!(waiting(), 0);
    }

    #[test]
    fn equal_question_does_not_refetch() {
        let mut dom = VirtualDom::new(Chart);
        dom.rebuild_in_place();
        settle(&mut dom);

        select(&mut dom, Some(saved_orders_by_month()));
        release(&mut dom);
        assert_eq!(last_render().0, FetchStatus::Success);

        select(&mut dom, Some(saved_orders_by_month()));
        assert_eq!(waiting(), 0);
        assert_eq!(last_render(), (FetchStatus::Success, vec!["card 1".to_string()]));
    }

    #[test]
    fn late_response_for_previous_question_is_dropped() {
        let mut dom = VirtualDom::new(Chart);
        dom.rebuild_in_place();
        settle(&mut dom);

        select(&mut dom, Some(saved_orders_by_month()));
        select(&mut dom, Some(unsaved_orders_by_month()));
        assert_eq!(waiting(), 2);

        release(&mut dom);
        assert_eq!(last_render(), (FetchStatus::Success, vec!["all".to_string()]));
    }
}
