//! Timeline overlay coordination for chart questions.
//!
//! Timelines only make sense when a question groups its rows by a date or
//! time dimension. [`TimelineLoader`] decides eligibility each time a new
//! question is bound, picks the endpoint variant, and tracks the
//! `idle -> loading -> success | error` lifecycle of the single request it
//! issues. Results are tagged with a generation so a slow response for a
//! previous question can never overwrite the state of the current one.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::api::{ClientError, ClientResult, TimelineParams, TimelineSource};
use crate::models::Timeline;
use crate::query::{CardId, DatasetQuery, Question};

/// Returns true when `question` is a structured query with at least one
/// breakout on a date or time field.
pub fn should_display_timelines(question: Option<&Question>) -> bool {
    let Some(question) = question else {
        return false;
    };
    if !question.is_structured() {
        return false;
    }
    question.breakouts().iter().any(|breakout| {
        let field = breakout.field();
        field.is_date() || field.is_time()
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug)]
pub struct FetchState<T> {
    pub status: FetchStatus,
    pub timelines: Vec<T>,
    pub error: Option<Arc<ClientError>>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            timelines: Vec::new(),
            error: None,
        }
    }
}

/// Read-only projection handed to the rendering layer.
#[derive(Clone, Debug)]
pub struct TimelineEvents<T> {
    pub status: FetchStatus,
    pub timelines: Vec<T>,
    pub error: Option<Arc<ClientError>>,
    pub is_loading: bool,
    pub is_error: bool,
}

/// Identity of a bound question for re-evaluation purposes: two distinct
/// `Question` values with the same card id, saved flag, query and
/// eligibility are the same binding. Eligibility is part of the key because
/// it also depends on field metadata, which can arrive after the card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuestionKey {
    card_id: Option<CardId>,
    is_saved: bool,
    query_hash: u64,
    eligible: bool,
}

impl QuestionKey {
    pub fn of(question: &Question) -> Self {
        Self {
            card_id: question.id(),
            is_saved: question.is_saved(),
            query_hash: query_fingerprint(&question.card().dataset_query),
            eligible: should_display_timelines(Some(question)),
        }
    }
}

fn query_fingerprint(query: &DatasetQuery) -> u64 {
    let mut hasher = DefaultHasher::new();
    // Value maps are ordered, so both encodings are canonical.
    match serde_json::to_vec(query) {
        Ok(bytes) => bytes.hash(&mut hasher),
        Err(err) => {
            tracing::warn!("falling back to debug encoding for query key: {err}");
            format!("{query:?}").hash(&mut hasher);
        }
    }
    hasher.finish()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineEndpoint {
    /// `card/{id}/timelines`, for saved questions.
    Card { card_id: CardId },
    /// `timeline`, for ad-hoc questions.
    All,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub endpoint: TimelineEndpoint,
    pub params: TimelineParams,
}

impl FetchRequest {
    fn for_question(generation: u64, question: &Question) -> Self {
        let endpoint = match question.id() {
            Some(card_id) if question.is_saved() => TimelineEndpoint::Card { card_id },
            _ => TimelineEndpoint::All,
        };
        Self {
            generation,
            endpoint,
            params: TimelineParams::with_events(question.id()),
        }
    }
}

/// Runs `request` against the endpoint it names.
pub async fn fetch_timelines<S, T>(source: &S, request: &FetchRequest) -> ClientResult<Vec<T>>
where
    S: TimelineSource,
    T: DeserializeOwned,
{
    match request.endpoint {
        TimelineEndpoint::Card { card_id } => source.card_timelines(card_id, &request.params).await,
        TimelineEndpoint::All => source.all_timelines(&request.params).await,
    }
}

#[derive(Debug)]
pub struct TimelineLoader<T = Timeline> {
    state: FetchState<T>,
    bound: Option<Option<QuestionKey>>,
    generation: u64,
}

impl<T> Default for TimelineLoader<T> {
    fn default() -> Self {
        Self {
            state: FetchState::default(),
            bound: None,
            generation: 0,
        }
    }
}

impl<T> TimelineLoader<T> {
    /// Binds `question` and returns the request to issue, if any.
    ///
    /// Rebinding the same question is a no-op once its request has settled;
    /// while it is still loading the request is issued again under a new
    /// generation, since the caller may have dropped the previous one. An
    /// ineligible question resets the state to idle without producing a
    /// request. An eligible one moves to loading; earlier timelines stay
    /// visible until the response lands.
    pub fn bind(&mut self, question: Option<&Question>) -> Option<FetchRequest> {
        let key = question.map(QuestionKey::of);
        if self.bound == Some(key) && self.state.status != FetchStatus::Loading {
            return None;
        }
        self.bound = Some(key);
        self.generation += 1;

        let question = match question {
            Some(question) if should_display_timelines(Some(question)) => question,
            _ => {
                tracing::debug!(generation = self.generation, "question not eligible for timelines");
                self.state = FetchState::default();
                return None;
            }
        };

        let request = FetchRequest::for_question(self.generation, question);
        tracing::debug!(
            generation = request.generation,
            endpoint = ?request.endpoint,
            "loading question timelines"
        );
        self.state.status = FetchStatus::Loading;
        self.state.error = None;
        Some(request)
    }

    /// Applies the outcome of `generation`'s request. Returns false when a
    /// newer binding has superseded it and the result was dropped.
    pub fn complete(&mut self, generation: u64, result: ClientResult<Vec<T>>) -> bool {
        if generation != self.generation || self.state.status != FetchStatus::Loading {
            return false;
        }
        match result {
            Ok(timelines) => {
                self.state.timelines = timelines;
                self.state.error = None;
                self.state.status = FetchStatus::Success;
            }
            Err(err) => {
                tracing::warn!(generation, status = ?err.status(), "timeline fetch failed: {err}");
                self.state.error = Some(Arc::new(err));
                self.state.status = FetchStatus::Error;
            }
        }
        true
    }
}

impl<T: Clone> TimelineLoader<T> {
    pub fn events(&self) -> TimelineEvents<T> {
        let status = self.state.status;
        TimelineEvents {
            status,
            timelines: self.state.timelines.clone(),
            error: self.state.error.clone(),
            is_loading: status == FetchStatus::Loading,
            is_error: status == FetchStatus::Error,
        }
    }
}
