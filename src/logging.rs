use anyhow::Result;
use crossbeam_channel::Sender;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt as tfmt};

use crate::event::AppMsg;

pub const DEFAULT_FILTER: &str = "aemeath=info";

/// Installs the global subscriber. With a panel attached, events go to its
/// log pane instead of stderr so they do not tear the terminal UI.
pub fn init(panel: Option<Sender<AppMsg>>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match panel {
        Some(tx) => tracing_subscriber::registry()
            .with(filter)
            .with(PanelLayer::new(tx))
            .try_init()?,
        None => tracing_subscriber::registry()
            .with(filter)
            .with(tfmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()?,
    }
    Ok(())
}

pub struct PanelLayer {
    tx: Sender<AppMsg>,
}

impl PanelLayer {
    pub fn new(tx: Sender<AppMsg>) -> Self {
        Self { tx }
    }
}

impl<S: Subscriber> Layer<S> for PanelLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);
        let line = format_line(*event.metadata().level(), &visitor.message, &visitor.fields);
        let _ = self.tx.send(AppMsg::LogMessage(line));
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name(), format!("{value:?}")));
        }
    }
}

pub fn format_line(level: Level, message: &str, fields: &[(&str, String)]) -> String {
    let mut line = format!("{:>5} {message}", level.as_str());
    for (name, value) in fields {
        line.push_str(&format!(" {name}={value}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use tracing::{info, warn};

    #[test]
    fn test_format_line() {
        assert_eq!(format_line(Level::INFO, "ready", &[]), " INFO ready");
        assert_eq!(
            format_line(Level::ERROR, "boom", &[("backend", "kde".to_string())]),
            "ERROR boom backend=kde"
        );
    }

    #[test]
    fn test_panel_layer_forwards_events() {
        let (tx, rx) = unbounded();
        let subscriber = tracing_subscriber::registry().with(PanelLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            info!(backend = "x11", "cursor tracker ready");
            warn!("seal window hidden");
        });

        let lines: Vec<String> = rx
            .try_iter()
            .filter_map(|msg| match msg {
                AppMsg::LogMessage(line) => Some(line),
                _ => None,
            })
            .collect();
        assert_eq!(
            lines,
            vec![
                " INFO cursor tracker ready backend=x11".to_string(),
                " WARN seal window hidden".to_string(),
            ]
        );
    }
}
