use crate::delegate::{LogLevel, LoggerDelegate};
use crate::redactor::TokenRedactor;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;

/// `tracing` layer that forwards events to a [`LoggerDelegate`]
pub struct DelegateLayer {
    delegate: Arc<dyn LoggerDelegate>,
    redactor: Option<TokenRedactor>,
}

impl DelegateLayer {
    pub fn new(delegate: Arc<dyn LoggerDelegate>) -> Self {
        Self {
            delegate,
            redactor: Some(TokenRedactor::default()),
        }
    }

    pub fn with_redactor(mut self, redactor: Option<TokenRedactor>) -> Self {
        self.redactor = redactor;
        self
    }

    /// Standalone dispatcher for scoping SDK work to this delegate
    pub fn into_dispatch(self) -> tracing::Dispatch {
        tracing::Dispatch::new(Registry::default().with(self))
    }
}

impl<S: Subscriber> Layer<S> for DelegateLayer {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        LogLevel::from(*metadata.level()) >= self.delegate.log_level()
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = LogLevel::from(*metadata.level());
        if level < self.delegate.log_level() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let text = visitor.finish();
        let text = match &self.redactor {
            Some(redactor) => redactor.redact(&text),
            None => text,
        };

        self.delegate.write_to_log(
            level,
            &text,
            metadata.module_path().unwrap_or_else(|| metadata.target()),
            metadata.file().unwrap_or_default(),
            metadata.line().unwrap_or_default(),
        );
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
