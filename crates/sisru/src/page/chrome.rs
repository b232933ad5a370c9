use super::{ElementProbe, ElementRef, PageActions, PageInspector, VisualState};
use crate::period::Period;
use crate::status::{period_color, Status, StatusSink};
use crate::utils::js_escape;
use headless_chrome::Tab;
use serde::Deserialize;
use std::sync::Arc;

/// Serializes an element's text, computed style and layout box.
const PROBE_FN: &str = r#"function __sisruProbe(el, win) {
    var s = (win || window).getComputedStyle(el);
    var r = el.getBoundingClientRect();
    var o = parseFloat(s.opacity);
    return {
        text: el.textContent || '',
        display: s.display,
        visibility: s.visibility,
        opacity: isNaN(o) ? 1 : o,
        width: r.width,
        height: r.height
    };
}"#;

#[derive(Deserialize)]
struct RawProbe {
    text: String,
    #[serde(flatten)]
    visual: VisualState,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FrameAnswer {
    Failed { error: String },
    Found(RawProbe),
}

/// A Chrome tab seen through the inspector/actions traits.
///
/// Every query is a small JavaScript snippet evaluated in the page; results
/// come back as JSON strings so the Rust side decides what they mean.
pub struct ChromePage(pub(crate) Arc<Tab>);

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self(tab)
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.0
    }

    // ── Low-level JS evaluation helpers ──────────────────────────────────

    /// Evaluates JS and returns the boolean result.
    /// Returns `false` if the script returns null/undefined.
    fn eval_bool(&self, js: &str) -> anyhow::Result<bool> {
        Ok(self
            .0
            .evaluate(js, false)?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Evaluates JS and returns the string result, or `None` if null/undefined.
    fn eval_string(&self, js: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .0
            .evaluate(js, false)?
            .value
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    fn wait_for_load(&self) -> anyhow::Result<()> {
        if let Err(e) = self.0.wait_until_navigated() {
            log::warn!("[!] Navigation wait timed out: {}, continuing...", e);
        }
        Ok(())
    }
}

impl PageInspector for ChromePage {
    fn current_url(&self) -> anyhow::Result<String> {
        Ok(self.0.get_url())
    }

    fn document_id(&self) -> anyhow::Result<String> {
        self.eval_string("String(performance.timeOrigin)")?
            .ok_or_else(|| anyhow::anyhow!("Page has no timing origin"))
    }

    fn inner_text(&self) -> anyhow::Result<String> {
        Ok(self
            .eval_string("document.body ? document.body.innerText : ''")?
            .unwrap_or_default())
    }

    fn query_all(&self, selector: &str) -> anyhow::Result<Vec<ElementProbe>> {
        let sel = js_escape(selector);
        let js = format!(
            r#"(function() {{
    {PROBE_FN}
    return JSON.stringify(Array.from(document.querySelectorAll('{sel}')).map(function(el) {{
        return __sisruProbe(el);
    }}));
}})()"#
        );
        let json = self.eval_string(&js)?.unwrap_or_else(|| "[]".to_string());
        let raw: Vec<RawProbe> = serde_json::from_str(&json)?;

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(index, probe)| ElementProbe {
                target: ElementRef::new(selector, index),
                text: probe.text,
                visual: probe.visual,
            })
            .collect())
    }

    fn frame_query(
        &self,
        frame_selector: &str,
        selector: &str,
    ) -> anyhow::Result<Option<ElementProbe>> {
        let frame = js_escape(frame_selector);
        let sel = js_escape(selector);
        let js = format!(
            r#"(function() {{
    {PROBE_FN}
    try {{
        var frame = document.querySelector('{frame}');
        if (!frame) return null;
        var doc = frame.contentDocument;
        if (!doc) return JSON.stringify({{ error: 'frame document not accessible' }});
        var el = doc.querySelector('{sel}');
        return el ? JSON.stringify(__sisruProbe(el, frame.contentWindow)) : null;
    }} catch (e) {{
        return JSON.stringify({{ error: String(e) }});
    }}
}})()"#
        );

        let Some(json) = self.eval_string(&js)? else {
            return Ok(None);
        };
        match serde_json::from_str::<FrameAnswer>(&json)? {
            FrameAnswer::Failed { error } => Err(anyhow::anyhow!("Frame query failed: {}", error)),
            FrameAnswer::Found(probe) => Ok(Some(ElementProbe {
                target: ElementRef::new(selector, 0),
                text: probe.text,
                visual: probe.visual,
            })),
        }
    }
}

impl PageActions for ChromePage {
    fn click(&self, target: &ElementRef) -> anyhow::Result<()> {
        let sel = js_escape(&target.selector);
        let js = format!(
            r#"(function() {{
    var el = document.querySelectorAll('{sel}')[{index}];
    for (var i = 0; i < {ancestor} && el; i++) el = el.parentElement;
    if (!el) return false;
    el.focus();
    el.click();
    return true;
}})()"#,
            index = target.index,
            ancestor = target.ancestor
        );

        if self.eval_bool(&js)? {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Element {}[{}] vanished before the click",
                target.selector,
                target.index
            ))
        }
    }

    fn reload(&self) -> anyhow::Result<()> {
        self.0.reload(false, None)?;
        self.wait_for_load()
    }

    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.0.navigate_to(url)?;
        self.wait_for_load()
    }
}

/// Renders statuses as a fixed panel in the top-right corner of the page.
///
/// The panel is rebuilt on every status and disappears with each document,
/// so it always shows the latest state of the current page.
pub struct PanelSink {
    tab: Arc<Tab>,
    panel_id: String,
}

impl PanelSink {
    pub fn new(page: &ChromePage, panel_id: &str) -> Self {
        Self {
            tab: Arc::clone(&page.0),
            panel_id: panel_id.to_string(),
        }
    }
}

impl StatusSink for PanelSink {
    fn show(&self, status: &Status, period: &Period) {
        let id = js_escape(&self.panel_id);
        let period_text = js_escape(&format!("PERIOD: {}", period));
        let state = js_escape(&format!("[{}]", status.state));
        let message = js_escape(&format!(
            "[{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            status.message
        ));
        let js = format!(
            r#"(function() {{
    if (!document.body) return;
    var panel = document.getElementById('{id}');
    if (!panel) {{
        panel = document.createElement('div');
        panel.id = '{id}';
        Object.assign(panel.style, {{
            position: 'fixed', top: '10px', right: '10px', zIndex: '99999', padding: '15px',
            borderRadius: '10px', backgroundColor: '#1a1a1a', color: '#fff', fontSize: '14px',
            fontFamily: 'monospace', boxShadow: '0 4px 15px rgba(0,0,0,0.5)', maxWidth: '340px',
            lineHeight: '1.5em'
        }});
        document.body.appendChild(panel);
    }}
    panel.textContent = '';
    function line(text, color, size) {{
        var b = document.createElement('b');
        b.style.display = 'block';
        b.style.color = color;
        if (size) b.style.fontSize = size;
        b.textContent = text;
        panel.appendChild(b);
    }}
    line('{period_text}', '{period_color}', '12px');
    line('{state}', '#fff', '12px');
    line('{message}', '{color}');
    panel.style.borderLeft = '5px solid {color}';
}})()"#,
            period_color = period_color(period),
            color = status.color,
        );

        if let Err(e) = self.tab.evaluate(&js, false) {
            log::debug!("Status panel not rendered: {}", e);
        }
    }
}
