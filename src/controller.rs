//! Sequential chapter navigation and incremental loading.
//!
//! The controller owns the navigation state for one reading session. Each
//! [`Controller::advance`] call loads the chapter after the current one in
//! global order and appends it to the surface. At most one load is in flight:
//! the busy flag is checked and set before the first suspension point, so a
//! concurrent call returns [`AdvanceOutcome::Busy`] without touching the
//! network. Chapters are therefore appended in increasing global index.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::error::LoadError;
use crate::fetch::ChapterSource;
use crate::metadata::{ChapterIndex, initial_position};
use crate::model::{ChapterData, ChapterIdentifier, ChapterInfo};
use crate::surface::ReaderSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    /// No chapter follows the current one. Terminal for the session.
    Exhausted,
    /// The last advance failed. Behaves like `Idle`.
    Error,
}

#[derive(Debug, Clone)]
pub struct NavigationState {
    pub current_global_index: usize,
    pub loaded_identifiers: HashSet<ChapterIdentifier>,
    pub is_loading: bool,
    pub phase: Phase,
    /// Chapters appended by `advance` this session.
    pub appended: usize,
    /// Failed advances this session.
    pub failures: usize,
    /// Advances that fetched an already loaded chapter.
    pub duplicates: usize,
}

/// What observers of a session see after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationSnapshot {
    pub current_global_index: usize,
    pub is_loading: bool,
    pub phase: Phase,
    pub appended: usize,
    pub failures: usize,
    pub duplicates: usize,
}

#[derive(Debug)]
pub enum AdvanceOutcome {
    Appended {
        index: usize,
        id: ChapterIdentifier,
    },
    /// Another advance is in flight.
    Busy,
    Exhausted,
    /// The chapter was already on the surface; nothing changed.
    Duplicate { id: ChapterIdentifier },
    Failed(LoadError),
}

pub struct Controller<S, D> {
    index: ChapterIndex,
    source: S,
    surface: Mutex<D>,
    state: Mutex<NavigationState>,
    updates: watch::Sender<NavigationSnapshot>,
}

impl<S, D> Controller<S, D>
where
    S: ChapterSource,
    D: ReaderSurface,
{
    /// Starts a session positioned at `initial`, which the caller has already
    /// shown. Its position is looked up by id, then by URL, then by the
    /// chapter the page marked as selected.
    pub fn new(index: ChapterIndex, initial: &ChapterData, source: S, surface: D) -> Self {
        let start = initial_position(index.meta(), &initial.id, &initial.url);
        Self::starting_at(index, start, [initial.id.clone()], source, surface)
    }

    pub fn starting_at(
        index: ChapterIndex,
        start: usize,
        loaded: impl IntoIterator<Item = ChapterIdentifier>,
        source: S,
        surface: D,
    ) -> Self {
        let state = NavigationState {
            current_global_index: start,
            loaded_identifiers: loaded.into_iter().collect(),
            is_loading: false,
            phase: Phase::Idle,
            appended: 0,
            failures: 0,
            duplicates: 0,
        };
        let (updates, _) = watch::channel(snapshot(&state));
        tracing::debug!(start, chapters = index.len(), "navigation initialized");

        Self {
            index,
            source,
            surface: Mutex::new(surface),
            state: Mutex::new(state),
            updates,
        }
    }

    pub fn index(&self) -> &ChapterIndex {
        &self.index
    }

    pub fn state(&self) -> NavigationState {
        self.lock_state().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
        self.updates.subscribe()
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        f(&self.lock_surface())
    }

    pub fn into_surface(self) -> D {
        self.surface
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-points history without loading anything, e.g. when the reader
    /// scrolls back into an earlier chapter.
    pub fn update_history(&self, url: &str, title: &str) {
        self.lock_surface().update_history(url, title);
    }

    /// Loads and appends the next chapter in global order.
    ///
    /// Never fails: load errors come back as [`AdvanceOutcome::Failed`] and
    /// leave the current index untouched so a later call retries the same
    /// chapter.
    pub async fn advance(&self) -> AdvanceOutcome {
        let (next, chapter) = match self.begin() {
            Ok(target) => target,
            Err(outcome) => return outcome,
        };

        let result = self.source.load(&chapter, self.index.meta()).await;
        self.finish(next, result)
    }

    fn begin(&self) -> Result<(usize, ChapterInfo), AdvanceOutcome> {
        let mut state = self.lock_state();
        if state.is_loading {
            tracing::trace!("advance ignored: load in flight");
            return Err(AdvanceOutcome::Busy);
        }
        if state.phase == Phase::Exhausted {
            return Err(AdvanceOutcome::Exhausted);
        }

        let next = state.current_global_index + 1;
        let Some(chapter) = self.index.chapter_at(next) else {
            tracing::info!(current = state.current_global_index, "end of content");
            state.phase = Phase::Exhausted;
            self.publish(&state);
            return Err(AdvanceOutcome::Exhausted);
        };

        state.is_loading = true;
        state.phase = Phase::Loading;
        self.publish(&state);
        Ok((next, chapter.clone()))
    }

    fn finish(&self, next: usize, result: Result<ChapterData, LoadError>) -> AdvanceOutcome {
        let mut state = self.lock_state();
        state.is_loading = false;

        let outcome = match result {
            Err(err) => {
                tracing::warn!(index = next, error = %err, "chapter load failed");
                state.phase = Phase::Error;
                state.failures += 1;
                AdvanceOutcome::Failed(err)
            }
            Ok(data) if state.loaded_identifiers.contains(&data.id) => {
                tracing::debug!(index = next, id = %data.id, "chapter already loaded; dropped");
                state.phase = Phase::Idle;
                state.duplicates += 1;
                AdvanceOutcome::Duplicate { id: data.id }
            }
            Ok(data) => {
                state.loaded_identifiers.insert(data.id.clone());
                {
                    let mut surface = self.lock_surface();
                    surface.append_chapter(&data);
                    surface.update_history(&data.url, &data.title);
                }
                state.current_global_index = next;
                state.phase = Phase::Idle;
                state.appended += 1;
                tracing::info!(index = next, id = %data.id, title = %data.title, "chapter appended");
                AdvanceOutcome::Appended {
                    index: next,
                    id: data.id,
                }
            }
        };

        self.publish(&state);
        outcome
    }

    fn publish(&self, state: &NavigationState) {
        self.updates.send_replace(snapshot(state));
    }

    fn lock_state(&self) -> MutexGuard<'_, NavigationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_surface(&self) -> MutexGuard<'_, D> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot(state: &NavigationState) -> NavigationSnapshot {
    NavigationSnapshot {
        current_global_index: state.current_global_index,
        is_loading: state.is_loading,
        phase: state.phase,
        appended: state.appended,
        failures: state.failures,
        duplicates: state.duplicates,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, mpsc};

    use super::*;
    use crate::extractor::Site;
    use crate::fetch::{FetchOptions, FetchPipeline, HttpClient};
    use crate::model::ChapterMetaData;
    use crate::resolver::UrlResolver;
    use crate::scroll::{self, ScrollPolicy, Trigger, Viewport};

    struct StubSource<F> {
        respond: F,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl<F> StubSource<F>
    where
        F: Fn(&ChapterInfo) -> Result<ChapterData, LoadError> + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                respond,
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }
    }

    #[async_trait]
    impl<F> ChapterSource for StubSource<F>
    where
        F: Fn(&ChapterInfo) -> Result<ChapterData, LoadError> + Send + Sync,
    {
        async fn load(
            &self,
            chapter: &ChapterInfo,
            _meta: &ChapterMetaData,
        ) -> Result<ChapterData, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            (self.respond)(chapter)
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        appended: Vec<ChapterIdentifier>,
        history: Vec<String>,
    }

    impl ReaderSurface for Recorder {
        fn append_chapter(&mut self, data: &ChapterData) {
            self.appended.push(data.id.clone());
        }

        fn update_history(&mut self, url: &str, _title: &str) {
            self.history.push(url.to_owned());
        }
    }

    fn info(id: u64) -> ChapterInfo {
        ChapterInfo {
            id: ChapterIdentifier::Numeric(id),
            title: format!("Chapter {id}"),
            link: Some(format!("https://example.com/{id}/")),
            is_default_selected: false,
        }
    }

    fn data(chapter: &ChapterInfo) -> ChapterData {
        ChapterData {
            id: chapter.id.clone(),
            title: chapter.title.clone(),
            url: chapter.link.clone().unwrap_or_default(),
            content: "<p>text</p>".to_owned(),
        }
    }

    fn index(ids: &[u64]) -> ChapterIndex {
        ChapterIndex::new(ChapterMetaData::flat(
            "v",
            ids.iter().copied().map(info).collect(),
        ))
    }

    fn session<F>(ids: &[u64], source: StubSource<F>) -> Controller<StubSource<F>, Recorder>
    where
        F: Fn(&ChapterInfo) -> Result<ChapterData, LoadError> + Send + Sync,
    {
        Controller::starting_at(
            index(ids),
            0,
            [ChapterIdentifier::Numeric(ids[0])],
            source,
            Recorder::default(),
        )
    }

    fn appended_ids<S: ChapterSource>(controller: &Controller<S, Recorder>) -> Vec<ChapterIdentifier> {
        controller.with_surface(|surface| surface.appended.clone())
    }

    #[tokio::test]
    async fn advances_to_the_end_then_stays_exhausted() {
        let controller = session(&[1, 2, 3], StubSource::new(|c: &ChapterInfo| Ok(data(c))));

        assert!(matches!(
            controller.advance().await,
            AdvanceOutcome::Appended { index: 1, .. }
        ));
        assert!(matches!(
            controller.advance().await,
            AdvanceOutcome::Appended { index: 2, .. }
        ));
        assert_eq!(controller.state().current_global_index, 2);

        assert!(matches!(controller.advance().await, AdvanceOutcome::Exhausted));
        let state = controller.state();
        assert_eq!(state.current_global_index, 2);
        assert_eq!(state.phase, Phase::Exhausted);
        assert!(!state.is_loading);

        // Exhausted is terminal: no further loads are attempted.
        assert!(matches!(controller.advance().await, AdvanceOutcome::Exhausted));
        assert_eq!(controller.source.calls.load(Ordering::SeqCst), 2);

        assert_eq!(appended_ids(&controller), vec![
            ChapterIdentifier::Numeric(2),
            ChapterIdentifier::Numeric(3),
        ]);
        let history = controller.with_surface(|surface| surface.history.clone());
        assert_eq!(history, vec![
            "https://example.com/2/".to_owned(),
            "https://example.com/3/".to_owned(),
        ]);
    }

    struct NoUrl;

    #[async_trait]
    impl UrlResolver for NoUrl {
        async fn resolve_chapter_url(
            &self,
            _chapter: &ChapterInfo,
            _meta: &ChapterMetaData,
        ) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn unresolvable_chapter_fails_without_moving() -> anyhow::Result<()> {
        let mut second = info(2);
        second.link = None;
        let index = ChapterIndex::new(ChapterMetaData::flat("v", vec![info(1), second]));
        let pipeline = FetchPipeline::new(
            HttpClient::new(&FetchOptions::default())?,
            Site::Kolnovel.extractor(),
            Arc::new(NoUrl),
        );
        let controller = Controller::starting_at(
            index,
            0,
            [ChapterIdentifier::Numeric(1)],
            pipeline,
            Recorder::default(),
        );

        let outcome = controller.advance().await;
        assert!(matches!(
            outcome,
            AdvanceOutcome::Failed(LoadError::Resolution { id: ChapterIdentifier::Numeric(2), .. })
        ));
        let state = controller.state();
        assert_eq!(state.current_global_index, 0);
        assert!(!state.is_loading);
        assert_eq!(state.phase, Phase::Error);
        assert!(appended_ids(&controller).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn redirect_to_a_loaded_chapter_is_dropped() {
        // Every load lands on chapter 1, which the session started on.
        let source = StubSource::new(|_: &ChapterInfo| Ok(data(&info(1))));
        let controller = session(&[1, 2, 3], source);

        for _ in 0..2 {
            assert!(matches!(
                controller.advance().await,
                AdvanceOutcome::Duplicate { id: ChapterIdentifier::Numeric(1) }
            ));
        }
        let state = controller.state();
        assert_eq!(state.current_global_index, 0);
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.duplicates, 2);
        assert!(appended_ids(&controller).is_empty());
    }

    #[tokio::test]
    async fn second_advance_while_loading_is_busy() -> anyhow::Result<()> {
        let gate = Arc::new(Notify::new());
        let mut source = StubSource::new(|c: &ChapterInfo| Ok(data(c)));
        source.gate = Some(Arc::clone(&gate));
        let controller = Arc::new(session(&[1, 2, 3], source));

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.advance().await }
        });
        controller
            .subscribe()
            .wait_for(|snapshot| snapshot.is_loading)
            .await?;

        assert!(matches!(controller.advance().await, AdvanceOutcome::Busy));
        assert_eq!(controller.state().phase, Phase::Loading);

        gate.notify_one();
        assert!(matches!(
            first.await?,
            AdvanceOutcome::Appended { index: 1, .. }
        ));
        assert_eq!(controller.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(appended_ids(&controller), vec![ChapterIdentifier::Numeric(2)]);
        Ok(())
    }

    #[tokio::test]
    async fn index_only_moves_on_new_appends() {
        let failed_once = AtomicBool::new(false);
        let source = StubSource::new(move |c: &ChapterInfo| {
            if c.id == ChapterIdentifier::Numeric(2) && !failed_once.swap(true, Ordering::SeqCst) {
                return Err(LoadError::Parse {
                    url: "https://example.com/2/".to_owned(),
                });
            }
            Ok(data(c))
        });
        let controller = session(&[1, 2, 3], source);

        let mut seen = vec![controller.state().current_global_index];
        for _ in 0..4 {
            let before = controller.state().current_global_index;
            let outcome = controller.advance().await;
            let after = controller.state().current_global_index;
            match outcome {
                AdvanceOutcome::Appended { index, .. } => {
                    assert_eq!(index, before + 1);
                    assert_eq!(after, before + 1);
                }
                _ => assert_eq!(after, before),
            }
            seen.push(after);
        }

        assert_eq!(seen, vec![0, 0, 1, 2, 2]);
        let state = controller.state();
        assert_eq!(state.failures, 1);
        assert_eq!(state.appended, 2);
        assert_eq!(state.phase, Phase::Exhausted);
    }

    #[tokio::test]
    async fn start_position_falls_back_to_the_page_url() {
        let tree = ChapterMetaData::flat("v", vec![info(1), info(2), info(3)]);
        let initial = ChapterData {
            // Bookmark id that the chapter select does not use.
            id: ChapterIdentifier::from("9002"),
            title: "Chapter 2".to_owned(),
            url: "https://example.com/2/".to_owned(),
            content: String::new(),
        };
        let controller = Controller::new(
            ChapterIndex::new(tree),
            &initial,
            StubSource::new(|c: &ChapterInfo| Ok(data(c))),
            Recorder::default(),
        );

        assert_eq!(controller.state().current_global_index, 1);
        assert!(matches!(
            controller.advance().await,
            AdvanceOutcome::Appended { index: 2, .. }
        ));
    }

    #[tokio::test]
    async fn subscribers_see_every_transition() {
        let controller = session(&[1, 2], StubSource::new(|c: &ChapterInfo| Ok(data(c))));
        let mut updates = controller.subscribe();
        assert_eq!(updates.borrow_and_update().phase, Phase::Idle);

        controller.advance().await;
        assert!(updates.has_changed().unwrap_or(false));
        let snapshot = updates.borrow_and_update().clone();
        assert_eq!(snapshot, NavigationSnapshot {
            current_global_index: 1,
            is_loading: false,
            phase: Phase::Idle,
            appended: 1,
            failures: 0,
            duplicates: 0,
        });

        controller.advance().await;
        assert_eq!(updates.borrow().phase, Phase::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_bursts_within_cooldown_trigger_once() -> anyhow::Result<()> {
        let controller = Arc::new(session(
            &[1, 2, 3, 4],
            StubSource::new(|c: &ChapterInfo| Ok(data(c))),
        ));
        let policy = ScrollPolicy::new(Trigger::default(), Duration::from_millis(1000));
        let (events, rx) = mpsc::channel(16);
        let driver = tokio::spawn(scroll::drive(Arc::clone(&controller), policy, rx));

        for _ in 0..5 {
            events.send(Viewport::at_bottom()).await?;
        }
        controller
            .subscribe()
            .wait_for(|snapshot| snapshot.appended == 1 && !snapshot.is_loading)
            .await?;

        tokio::time::advance(Duration::from_millis(1000)).await;
        events.send(Viewport::at_bottom()).await?;
        drop(events);

        let outcomes = driver.await?;
        assert_eq!(outcomes.len(), 2);
        assert!(
            outcomes
                .iter()
                .all(|outcome| matches!(outcome, AdvanceOutcome::Appended { .. }))
        );
        assert_eq!(controller.state().current_global_index, 2);
        assert_eq!(controller.source.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
