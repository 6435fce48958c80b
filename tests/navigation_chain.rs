/// Navigation strategy chain against synthetic surfaces: fallback order,
/// cleanup of abandoned tabs, and the non-fatal all-exhausted outcome.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gram_scout::scout::nav::{
    reach_destination, NavigationDestination, Surface, DEFAULT_STRATEGIES,
};

/// A scripted surface: each transport either lands on the destination URL or
/// leaves the surface where it was. Tabs spawned by `open_sibling` share the
/// script and register themselves so tests can assert they were closed.
#[derive(Clone)]
struct FakeSurface {
    direct_lands: bool,
    redirect_lands: bool,
    tab_lands: bool,
    url: Arc<Mutex<String>>,
    closed: Arc<AtomicBool>,
    spawned_tabs: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
    loads_issued: Arc<AtomicUsize>,
}

impl FakeSurface {
    fn new(direct_lands: bool, redirect_lands: bool, tab_lands: bool) -> Self {
        Self {
            direct_lands,
            redirect_lands,
            tab_lands,
            url: Arc::new(Mutex::new("https://www.instagram.com/p/AAA11BBB22C/".into())),
            closed: Arc::new(AtomicBool::new(false)),
            spawned_tabs: Arc::new(Mutex::new(Vec::new())),
            loads_issued: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        self.loads_issued.fetch_add(1, Ordering::SeqCst);
        if self.direct_lands {
            *self.url.lock().unwrap() = url.to_string();
        }
        Ok(())
    }

    async fn redirect_via_script(&self, url: &str) -> anyhow::Result<()> {
        if self.redirect_lands {
            *self.url.lock().unwrap() = url.to_string();
        }
        Ok(())
    }

    async fn current_url(&self) -> Option<String> {
        Some(self.url.lock().unwrap().clone())
    }

    async fn open_sibling(&self, url: &str) -> anyhow::Result<Self> {
        let tab = Self {
            direct_lands: self.direct_lands,
            redirect_lands: self.redirect_lands,
            tab_lands: self.tab_lands,
            url: Arc::new(Mutex::new(if self.tab_lands {
                url.to_string()
            } else {
                "about:blank".to_string()
            })),
            closed: Arc::new(AtomicBool::new(false)),
            spawned_tabs: self.spawned_tabs.clone(),
            loads_issued: self.loads_issued.clone(),
        };
        self.spawned_tabs.lock().unwrap().push(tab.closed.clone());
        Ok(tab)
    }

    async fn close(self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn short_timeout() -> Duration {
    // Long enough for one URL poll round, short enough to keep tests fast.
    Duration::from_millis(50)
}

#[tokio::test]
async fn direct_load_success_keeps_origin_active() {
    let origin = FakeSurface::new(true, false, false);
    let dest = NavigationDestination::liked_by("AAA11BBB22C");

    let outcome = reach_destination(&origin, &dest, &DEFAULT_STRATEGIES, short_timeout()).await;

    assert!(outcome.success);
    assert!(outcome.surface.is_none(), "origin must stay the active surface");
    assert!(origin.spawned_tabs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn falls_through_to_new_tab_and_returns_it() {
    let origin = FakeSurface::new(false, false, true);
    let dest = NavigationDestination::liked_by("AAA11BBB22C");

    let outcome = reach_destination(&origin, &dest, &DEFAULT_STRATEGIES, short_timeout()).await;

    assert!(outcome.success);
    let tab = outcome.surface.expect("strategy 3 must hand back the tab");
    assert!(tab.current_url().await.unwrap().contains("/liked_by"));
    assert!(
        !origin.closed.load(Ordering::SeqCst),
        "origin is never closed by the chain"
    );
    // The successful tab is the caller's to close; it must still be open.
    assert!(!tab.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn exhausted_chain_reports_failure_and_closes_failed_tabs() {
    let origin = FakeSurface::new(false, false, false);
    let dest = NavigationDestination::liked_by("AAA11BBB22C");

    let outcome = reach_destination(&origin, &dest, &DEFAULT_STRATEGIES, short_timeout()).await;

    assert!(!outcome.success);
    assert!(outcome.surface.is_none());

    let tabs = origin.spawned_tabs.lock().unwrap();
    assert_eq!(tabs.len(), 1, "the NewTab strategy opened one tab");
    assert!(
        tabs[0].load(Ordering::SeqCst),
        "the abandoned tab must be closed before giving up"
    );
}

#[tokio::test]
async fn strategy_order_is_direct_before_redirect() {
    // Both direct and redirect would land; only the first strategy should run.
    let origin = FakeSurface::new(true, true, true);
    let dest = NavigationDestination::liked_by("AAA11BBB22C");

    let outcome = reach_destination(&origin, &dest, &DEFAULT_STRATEGIES, short_timeout()).await;

    assert!(outcome.success);
    assert_eq!(origin.loads_issued.load(Ordering::SeqCst), 1);
    assert!(origin.spawned_tabs.lock().unwrap().is_empty());
}
