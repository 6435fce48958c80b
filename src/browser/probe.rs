//! Best-effort selector probes.
//!
//! The target UI offers the same logical affordance (cookie banner, search
//! entry, likers link…) under different structures depending on rollout
//! cohort, locale, and A/B tests. Each logical target is therefore an ordered
//! chain of [`Locator`] candidates tried under short per-candidate timeouts.
//!
//! Invariant enforced here, not at call sites: a probe **never raises**.
//! Absence of an affordance is `false`, full stop. Anything that needs a
//! hard error lives above this boundary.

use std::time::Duration;

use chromiumoxide::Page;
use tokio::time::sleep;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A candidate location for a logical UI target: a CSS selector, optionally
/// narrowed to elements whose visible text contains `text`
/// (case-insensitive). The text filter stands in for Playwright-style
/// `:has-text(...)`, which CSS cannot express.
#[derive(Debug, Clone)]
pub struct Locator {
    pub css: String,
    pub text: Option<String>,
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
        }
    }

    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Some(text.into()),
        }
    }
}

/// What to do with the first visible match.
#[derive(Debug, Clone)]
pub enum ProbeAction {
    Click,
    /// Clear the field and type `value` (native value setter + input/change
    /// events so framework-bound inputs notice).
    Fill(String),
}

/// Probe executor bound to one page. `slow_mo` is appended after every
/// successful action so the visible run stays watchable.
pub struct Prober {
    page: Page,
    slow_mo: Duration,
}

impl Prober {
    pub fn new(page: Page, slow_mo: Duration) -> Self {
        Self { page, slow_mo }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Try each `(locator, action)` candidate in order. A candidate succeeds
    /// when its target becomes visible within `per_candidate_timeout` and the
    /// action completes. Returns `true` on first success, `false` when all
    /// candidates exhaust. Never errors.
    pub async fn resolve_and_act(
        &self,
        candidates: &[(Locator, ProbeAction)],
        per_candidate_timeout: Duration,
    ) -> bool {
        for (locator, action) in candidates {
            if self.try_candidate(locator, action, per_candidate_timeout).await {
                debug!("probe: hit {:?} via {}", action, locator.css);
                if !self.slow_mo.is_zero() {
                    sleep(self.slow_mo).await;
                }
                return true;
            }
            debug!("probe: miss {} — trying next candidate", locator.css);
        }
        false
    }

    /// Click the first locator in the chain that becomes visible.
    pub async fn click_any(&self, locators: &[Locator], per_candidate_timeout: Duration) -> bool {
        for locator in locators {
            let candidate = (locator.clone(), ProbeAction::Click);
            if self
                .resolve_and_act(std::slice::from_ref(&candidate), per_candidate_timeout)
                .await
            {
                return true;
            }
        }
        false
    }

    /// Is a visible element matching `locator` present within `timeout`?
    /// No side effects.
    pub async fn element_present(&self, locator: &Locator, timeout: Duration) -> bool {
        let script = presence_script(locator);
        self.poll_until_true(&script, timeout).await
    }

    async fn try_candidate(
        &self,
        locator: &Locator,
        action: &ProbeAction,
        timeout: Duration,
    ) -> bool {
        // Find-and-act is a single JS round trip: locating the element and
        // acting on it separately would race the re-rendering DOM.
        let script = act_script(locator, action);
        self.poll_until_true(&script, timeout).await
    }

    /// Evaluate `script` every poll tick until it returns `true` or `timeout`
    /// elapses. Evaluation failures count as `false` — a detached frame or a
    /// mid-navigation context is just "not there yet".
    async fn poll_until_true(&self, script: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let hit = self
                .page
                .evaluate(script)
                .await
                .ok()
                .and_then(|v| v.into_value::<bool>().ok())
                .unwrap_or(false);
            if hit {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

// ── Probe scripts ────────────────────────────────────────────────────────────
//
// All candidate matching runs in-page. The locator pieces are embedded as
// JSON string literals so selector quoting can never break the script.

fn finder_js(locator: &Locator) -> String {
    let css = serde_json::json!(locator.css);
    let text = serde_json::json!(locator.text);
    format!(
        r#"
    const css = {css};
    const text = {text};
    const visible = (el) => {{
        if (!el) return false;
        const rects = el.getClientRects();
        return rects.length > 0 && rects[0].width > 0 && rects[0].height > 0;
    }};
    const matches = Array.from(document.querySelectorAll(css)).filter(visible);
    const target = text === null
        ? matches[0]
        : matches.find((el) =>
            (el.innerText || '').toLowerCase().includes(text.toLowerCase()));
"#
    )
}

fn presence_script(locator: &Locator) -> String {
    format!(
        r#"(function() {{
{finder}
    return !!target;
}})();"#,
        finder = finder_js(locator)
    )
}

fn act_script(locator: &Locator, action: &ProbeAction) -> String {
    let act = match action {
        ProbeAction::Click => r#"
    target.scrollIntoView({block: 'center'});
    target.click();
    return true;"#
            .to_string(),
        ProbeAction::Fill(value) => {
            let value = serde_json::json!(value);
            format!(
                r#"
    target.focus();
    const proto = target instanceof HTMLTextAreaElement
        ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    setter.call(target, {value});
    target.dispatchEvent(new Event('input', {{bubbles: true}}));
    target.dispatchEvent(new Event('change', {{bubbles: true}}));
    return true;"#
            )
        }
    };
    format!(
        r#"(function() {{
{finder}
    if (!target) return false;
{act}
}})();"#,
        finder = finder_js(locator)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The generated scripts must embed selector quoting safely — a selector
    /// containing quotes may not escape the JSON string literal.
    #[test]
    fn test_scripts_json_escape_selector_quotes() {
        let locator = Locator::css_with_text(r#"a[href="/explore/search/"]"#, r#"say "hi""#);
        let script = presence_script(&locator);
        assert!(script.contains(r#""a[href=\"/explore/search/\"]""#));
        assert!(script.contains(r#""say \"hi\"""#));
    }

    #[test]
    fn test_fill_script_uses_native_setter_and_events() {
        let script = act_script(
            &Locator::css("input[name=\"username\"]"),
            &ProbeAction::Fill("scout".into()),
        );
        assert!(script.contains("getOwnPropertyDescriptor"));
        assert!(script.contains("dispatchEvent(new Event('input'"));
        assert!(script.contains(r#""scout""#));
    }

    #[test]
    fn test_click_script_returns_false_without_target() {
        let script = act_script(&Locator::css("button"), &ProbeAction::Click);
        assert!(script.contains("if (!target) return false;"));
    }
}
