use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cli::ReadArgs;
use crate::controller::{AdvanceOutcome, Controller, NavigationSnapshot, Phase};
use crate::fetch::ChapterSource;
use crate::progress::{LastRead, ProgressStore};
use crate::scroll::{self, ScrollPolicy, Trigger, Viewport};
use crate::session;
use crate::settings::host_key;
use crate::surface::{ReaderSurface, TerminalSurface};

/// How long to wait for a sent scroll event to show up as a state change
/// before sending another.
const STALL_GRACE: Duration = Duration::from_millis(250);
const MIN_TICK: Duration = Duration::from_millis(10);

pub async fn run(args: ReadArgs) -> anyhow::Result<()> {
    let url = args.site.start_url()?;
    let config = args.site.session_config();
    if args.threshold_px <= 0.0 {
        anyhow::bail!("--threshold-px must be positive: {}", args.threshold_px);
    }
    if args.max_failures == 0 {
        anyhow::bail!("--max-failures must be at least 1");
    }

    let store = args.progress.clone().map(ProgressStore::new);
    if let Some(store) = &store {
        let key = host_key(url.host_str().unwrap_or_default());
        let enabled = store
            .reader_enabled(&key)
            .await
            .context("read reader setting")?;
        if !enabled {
            anyhow::bail!("reader is disabled for {key} (run `reader enable --host {key}`)");
        }
    }

    let launched = session::launch(&config, &url)
        .await
        .context("launch session")?;

    let out = open_output(args.out.as_deref())?;
    let mut surface = TerminalSurface::new(out, args.format);
    surface.append_chapter(&launched.initial);
    if let Some(err) = surface.write_error() {
        anyhow::bail!("{err}");
    }
    surface.update_history(&launched.initial.url, &launched.initial.title);

    let controller = Arc::new(Controller::new(
        launched.index,
        &launched.initial,
        launched.pipeline,
        surface,
    ));
    let policy = ScrollPolicy::new(
        Trigger::DistanceToBottom {
            threshold_px: args.threshold_px,
        },
        Duration::from_millis(args.cooldown_ms),
    );
    let limits = Limits {
        chapters: args.chapters,
        max_failures: args.max_failures,
    };

    let (stop, outcomes) = scroll_until_done(Arc::clone(&controller), policy, &limits).await?;
    let state = controller.state();
    tracing::info!(
        appended = state.appended,
        failures = state.failures,
        duplicates = state.duplicates,
        triggers = outcomes.len(),
        reason = stop.as_str(),
        "reading stopped"
    );

    if stop == Stop::Output {
        let err = controller.with_surface(|surface| surface.write_error().map(str::to_owned));
        anyhow::bail!(
            "stopped after {} chapters: {}",
            state.appended,
            err.as_deref().unwrap_or("output write failed")
        );
    }

    if let Some(store) = &store {
        let last = controller.with_surface(|surface| surface.history().last().cloned());
        if let Some(last) = last {
            let entry = LastRead {
                url: last.url,
                title: last.title,
                global_index: state.current_global_index,
                total_chapters: controller.index().len(),
                updated_at: last.at,
            };
            store
                .record(&launched.novel_key, entry)
                .await
                .with_context(|| format!("save progress: {}", store.path().display()))?;
        }
    }

    if stop == Stop::Failures {
        let last_error = outcomes.iter().rev().find_map(|outcome| match outcome {
            AdvanceOutcome::Failed(err) => Some(err.to_string()),
            _ => None,
        });
        anyhow::bail!(
            "gave up after {} failed and {} duplicate loads (last error: {})",
            state.failures,
            state.duplicates,
            last_error.as_deref().unwrap_or("none")
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    chapters: usize,
    max_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Limit,
    EndOfContent,
    Failures,
    Output,
}

impl Stop {
    fn as_str(self) -> &'static str {
        match self {
            Self::Limit => "chapter limit reached",
            Self::EndOfContent => "end of content",
            Self::Failures => "too many failed loads",
            Self::Output => "output write failed",
        }
    }
}

impl Limits {
    fn check(&self, snapshot: &NavigationSnapshot) -> Option<Stop> {
        if snapshot.is_loading {
            None
        } else if snapshot.appended >= self.chapters {
            Some(Stop::Limit)
        } else if snapshot.phase == Phase::Exhausted {
            Some(Stop::EndOfContent)
        } else if snapshot.failures + snapshot.duplicates >= self.max_failures {
            Some(Stop::Failures)
        } else {
            None
        }
    }
}

/// Simulates a reader parked at the bottom of the page: scroll events are
/// fed to the policy until a limit is hit. Events are held back while a load
/// is in flight, so no more than `limits.chapters` chapters get appended.
async fn scroll_until_done<S, D>(
    controller: Arc<Controller<S, D>>,
    policy: ScrollPolicy,
    limits: &Limits,
) -> anyhow::Result<(Stop, Vec<AdvanceOutcome>)>
where
    S: ChapterSource + 'static,
    D: ReaderSurface + 'static,
{
    let cooldown = policy.cooldown();
    let (events, rx) = mpsc::channel(8);
    let driver = tokio::spawn(scroll::drive(Arc::clone(&controller), policy, rx));

    let mut updates = controller.subscribe();
    let mut ticker = tokio::time::interval((cooldown / 4).max(MIN_TICK));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut awaiting: Option<Instant> = None;

    let stop = loop {
        let snapshot = updates.borrow_and_update().clone();
        if controller.with_surface(|surface| surface.write_error().is_some()) {
            break Stop::Output;
        }
        if let Some(stop) = limits.check(&snapshot) {
            break stop;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break Stop::EndOfContent;
                }
                awaiting = None;
            }
            _ = ticker.tick() => {
                let pending = awaiting.is_some_and(|sent| sent.elapsed() < cooldown + STALL_GRACE);
                if pending || snapshot.is_loading {
                    continue;
                }
                if events.send(Viewport::at_bottom()).await.is_err() {
                    break Stop::EndOfContent;
                }
                awaiting = Some(Instant::now());
            }
        }
    };

    drop(events);
    let outcomes = driver.await.context("join scroll driver")?;
    Ok((stop, outcomes))
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write + Send>> {
    let Some(path) = path else {
        return Ok(Box::new(std::io::stdout()));
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("create output: {}", path.display()))?;
    Ok(Box::new(std::io::BufWriter::new(file)))
}
