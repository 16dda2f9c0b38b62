use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use crate::hook_system::context::{CallContext, HookContext};
use crate::hook_system::error::{panic_message, DispatchError, HookError, HookExecutionError};
use crate::plugin_system::descriptor::{HookImplementation, PluginState};
use crate::plugin_system::snapshot::{HookSnapshot, SnapshotCell};

/// Runs the hook implementations registered under a name.
///
/// The dispatcher reads the published snapshot once per call and runs the
/// whole chain against it, so a concurrent toggle never produces a
/// half-updated pipeline. Cloning a dispatcher is cheap; all clones observe
/// the same registry.
#[derive(Clone)]
pub struct HookDispatcher {
    snapshots: Arc<SnapshotCell>,
}

impl fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDispatcher").finish_non_exhaustive()
    }
}

impl HookDispatcher {
    pub fn new(snapshots: Arc<SnapshotCell>) -> Self {
        Self { snapshots }
    }

    /// The snapshot a dispatch started now would run against
    pub fn snapshot(&self) -> Arc<HookSnapshot> {
        self.snapshots.load()
    }

    /// Whether any active plugin implements `hook_name`
    pub fn has_hook(&self, hook_name: &str) -> bool {
        self.snapshots.load().implementations(hook_name).is_some()
    }

    /// Execute `hook_name`.
    ///
    /// With no `args` every implementation runs once for its side effect
    /// and `Ok(None)` is returned. Otherwise `args[0]` is the carried value:
    /// each implementation receives fresh copies of it and of the remaining
    /// arguments, a returned value replaces it, and the final carried value
    /// is returned as `Ok(Some(..))`. A failing implementation is logged and
    /// treated as a no-op transform.
    pub async fn execute(
        &self,
        hook_name: &str,
        args: Vec<Value>,
        ctx: &CallContext,
    ) -> Result<Option<Value>, DispatchError> {
        let snapshot = self.snapshots.load();
        let hooks = snapshot
            .implementations(hook_name)
            .ok_or_else(|| DispatchError::UnknownHook(hook_name.to_string()))?;

        let mut args = args.into_iter();
        let Some(mut carried) = args.next() else {
            for hook in hooks {
                if let Err(e) = run_isolated(hook, Vec::new(), PluginState::Active, ctx).await {
                    log::error!("{}", e);
                }
            }
            return Ok(None);
        };
        let rest: Vec<Value> = args.collect();

        for hook in hooks {
            let mut call_args = Vec::with_capacity(rest.len() + 1);
            call_args.push(carried.clone());
            call_args.extend(rest.iter().cloned());

            match run_isolated(hook, call_args, PluginState::Active, ctx).await {
                Ok(Some(value)) => carried = value,
                Ok(None) => {}
                Err(e) => log::error!("{}", e),
            }
        }
        Ok(Some(carried))
    }

    /// Zero-argument dispatch, for side effects only
    pub async fn notify(&self, hook_name: &str, ctx: &CallContext) -> Result<(), DispatchError> {
        self.execute(hook_name, Vec::new(), ctx).await.map(|_| ())
    }

    /// Piped dispatch of `value` through every implementation of `hook_name`
    pub async fn pipe(
        &self,
        hook_name: &str,
        value: Value,
        extra: Vec<Value>,
        ctx: &CallContext,
    ) -> Result<Value, DispatchError> {
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(value);
        args.extend(extra);
        let carried = self.execute(hook_name, args, ctx).await?;
        // Piped mode always yields the carried value
        Ok(carried.unwrap_or(Value::Null))
    }
}

/// Invoke one implementation, turning both `Err` returns and panics into a
/// [`HookExecutionError`].
pub(crate) async fn run_isolated(
    hook: &HookImplementation,
    args: Vec<Value>,
    state: PluginState,
    call: &CallContext,
) -> Result<Option<Value>, HookExecutionError> {
    log::debug!(
        "Executing {}::{} (priority {})",
        hook.plugin_id(),
        hook.name(),
        hook.priority()
    );
    let ctx = HookContext::new(hook.plugin_id(), hook.name(), hook.priority(), state, call.clone());

    let outcome = AssertUnwindSafe(hook.function().call(args, &ctx))
        .catch_unwind()
        .await;

    let source = match outcome {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => e,
        Err(payload) => HookError::Panicked(panic_message(payload)),
    };
    Err(HookExecutionError {
        plugin_id: hook.plugin_id().to_string(),
        hook_name: hook.name().to_string(),
        function: hook.function_name().to_string(),
        source,
    })
}
