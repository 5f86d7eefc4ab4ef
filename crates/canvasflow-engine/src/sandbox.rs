use std::time::{Duration, Instant};

use boa_engine::{Context, Source};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use canvasflow_core::config::ScriptConfig;
use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::ScriptEvaluator;

/// Globals left in place for user code. Everything else on the global
/// object is deleted before the script runs.
const ALLOWED_GLOBALS: &[&str] = &[
    "Array",
    "Boolean",
    "Date",
    "Error",
    "Infinity",
    "JSON",
    "Map",
    "Math",
    "NaN",
    "Number",
    "Object",
    "RangeError",
    "RegExp",
    "Set",
    "String",
    "SyntaxError",
    "TypeError",
    "decodeURIComponent",
    "encodeURIComponent",
    "isFinite",
    "isNaN",
    "parseFloat",
    "parseInt",
    "undefined",
    "__inputs",
];

/// JavaScript evaluator backed by boa.
///
/// User code is the body of a function receiving `inputs` (every input
/// value) and `input` (the first one). Its return value, serialized through
/// `JSON.stringify`, becomes the node output; `undefined` maps to `null`.
pub struct BoaEvaluator {
    config: ScriptConfig,
}

impl BoaEvaluator {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }
}

impl Default for BoaEvaluator {
    fn default() -> Self {
        Self::new(ScriptConfig::default())
    }
}

fn build_source(code: &str, inputs_json: &str) -> String {
    let allowed = ALLOWED_GLOBALS
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"
var __inputs = {inputs_json};
(function() {{
    var allowed = new Set([{allowed}]);
    var global = globalThis;
    Object.getOwnPropertyNames(global).forEach(function(key) {{
        if (!allowed.has(key)) {{
            try {{ delete global[key]; }} catch (e) {{ global[key] = undefined; }}
        }}
    }});
}})();
(function(stringify, inputs) {{
    var result = (function(inputs, input) {{
{code}
    }})(inputs, inputs[0]);
    return stringify(result === undefined ? null : result);
}})(JSON.stringify, __inputs);
"#
    )
}

fn run_script(code: &str, inputs: &[Value], config: &ScriptConfig) -> Result<Value> {
    let inputs_json = serde_json::to_string(inputs)?;
    let source = build_source(code, &inputs_json);

    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(config.loop_iteration_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(config.recursion_limit);

    let result = context
        .eval(Source::from_bytes(&source))
        .map_err(|e| FlowError::Script(e.to_string()))?;

    let text = result
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| FlowError::Script("return value is not JSON-serializable".into()))?;

    serde_json::from_str(&text)
        .map_err(|e| FlowError::Script(format!("invalid script result: {}", e)))
}

impl ScriptEvaluator for BoaEvaluator {
    fn language(&self) -> &str {
        "javascript"
    }

    fn evaluate(&self, code: &str, inputs: &[Value]) -> BoxFuture<'_, Result<Value>> {
        let code = code.to_string();
        let inputs = inputs.to_vec();

        Box::pin(async move {
            if code.len() > self.config.max_code_length {
                return Err(FlowError::Script(format!(
                    "code is {} bytes, limit is {}",
                    code.len(),
                    self.config.max_code_length
                )));
            }

            let config = self.config.clone();
            let timeout = Duration::from_secs(self.config.timeout_secs);
            let started = Instant::now();
            // The blocking thread cannot be interrupted; the loop and recursion
            // limits bound how long it outlives a timeout.
            let task = tokio::task::spawn_blocking(move || run_script(&code, &inputs, &config));

            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(result)) => {
                    debug!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        ok = result.is_ok(),
                        "Script finished"
                    );
                    result
                }
                Ok(Err(e)) => Err(FlowError::Script(format!("script task failed: {}", e))),
                Err(_) => {
                    warn!(timeout_secs = self.config.timeout_secs, "Script timed out");
                    Err(FlowError::Script(format!(
                        "timed out after {}s",
                        self.config.timeout_secs
                    )))
                }
            }
        })
    }
}
