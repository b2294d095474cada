use serde_json::{Map, Value};
use tracing::info;

use super::{Action, ActionContext, render};
use crate::error::ActionError;

/// Emit a rendered template line to the operational log.
#[derive(Debug, Clone, Default)]
pub struct LogAction {
    pub template: String,
    pub extra: Map<String, Value>,
}

impl LogAction {
    pub(crate) fn build(params: &Map<String, Value>) -> Result<Box<dyn Action>, ActionError> {
        let template = match params.get("template") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(ActionError::Config(format!(
                    "log template must be a string, got {other}"
                )));
            }
        };
        let extra = match params.get("extra") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(ActionError::Config(format!(
                    "log extra must be an object, got {other}"
                )));
            }
        };
        Ok(Box::new(Self { template, extra }))
    }

    pub fn render(&self, ctx: &ActionContext) -> String {
        render(&self.template, ctx, &self.extra)
    }
}

impl Action for LogAction {
    fn run(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let line = self.render(ctx);
        if !line.is_empty() {
            info!(target: "blesim::action", uuid = %ctx.uuid, "{line}");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use serde_json::json;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory log sink for a scoped subscriber.
    #[derive(Clone, Default)]
    struct Capture(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn build_accepts_missing_template() {
        let params = Map::new();
        let action = LogAction::build(&params).unwrap();
        let mut ctx = ActionContext::new(StateStore::new(), Value::Null);
        action.run(&mut ctx).unwrap();
    }

    #[test]
    fn build_rejects_non_string_template() {
        let params = json!({ "template": 5 }).as_object().cloned().unwrap();
        assert!(matches!(
            LogAction::build(&params),
            Err(ActionError::Config(_))
        ));
    }

    #[test]
    fn renders_with_extra() {
        let action = LogAction {
            template: "{{who}} wrote {{value}}".into(),
            extra: json!({ "who": "central" }).as_object().cloned().unwrap(),
        };
        let ctx = ActionContext::new(StateStore::new(), json!(3));
        assert_eq!(action.render(&ctx), "central wrote 3");
    }

    #[test]
    fn run_logs_rendered_line() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();

        let action = LogAction {
            template: "[{{deviceName}}] set to {{value}}".into(),
            extra: Map::new(),
        };
        let mut ctx = ActionContext::new(StateStore::new(), json!(42));
        ctx.device_name = "Sim".into();
        tracing::subscriber::with_default(subscriber, || action.run(&mut ctx).unwrap());

        let output = String::from_utf8(capture.0.lock().clone()).unwrap();
        assert!(output.contains("[Sim] set to 42"), "{output}");
        assert!(output.contains("blesim::action"), "{output}");
    }
}
