//! Lua 5.4 implementation of the sandbox runtime port.
//!
//! Every run gets a fresh VM. Globals exposed to the script:
//!
//! | Global | Behavior |
//! |--------|----------|
//! | `agents` | array of document tables |
//! | `search(term)` | documents whose text contains `term`, case-insensitive |
//! | `sub_lm(query, context?)` | completion answered by the host through the bridge |
//! | `print(...)` | captured, truncated at the output limit |
//! | `FINAL(value)` | finish with `value` |
//! | `FINAL_VAR(name)` | finish with the global called `name` |
//! | `pcall(f, ...)` | as usual, but limit violations and `FINAL` are not caught |
//!
//! The wall clock is enforced by an instruction hook and excludes time spent
//! waiting on `sub_lm`.

use super::environment::restricted_vm;
use agora_application::{SandboxError, SandboxRuntime, SubLmBridge};
use agora_domain::{AgentDocument, SandboxLimits, SandboxOutput};
use mlua::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

/// Instructions between wall-clock checks
const HOOK_INTERVAL: u32 = 1_000;

const FINAL_SIGNAL: &str = "__agora_final__";

/// Sandbox runtime backed by mlua.
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaSandboxRuntime;

impl LuaSandboxRuntime {
    pub fn new() -> Self {
        Self
    }
}

/// State shared between the VM callbacks and the run.
#[derive(Default)]
struct RunState {
    final_answer: Mutex<Option<String>>,
    printed: Mutex<String>,
    truncated: AtomicBool,
    timed_out: AtomicBool,
    sub_lm_calls: AtomicUsize,
}

impl RunState {
    fn finished(&self) -> bool {
        self.final_answer
            .lock()
            .map(|answer| answer.is_some())
            .unwrap_or(false)
    }

    fn set_final(&self, answer: String) {
        if let Ok(mut slot) = self.final_answer.lock()
            && slot.is_none()
        {
            *slot = Some(answer);
        }
    }
}

impl SandboxRuntime for LuaSandboxRuntime {
    fn run(
        &self,
        code: &str,
        documents: &[AgentDocument],
        limits: &SandboxLimits,
        bridge: SubLmBridge,
    ) -> Result<SandboxOutput, SandboxError> {
        let lua = restricted_vm().map_err(setup_error)?;
        let state = Arc::new(RunState::default());
        let deadline = Arc::new(Mutex::new(Instant::now() + limits.wall_clock));

        install_globals(&lua, documents, limits, &bridge, &state, &deadline).map_err(setup_error)?;

        {
            let state = Arc::clone(&state);
            let deadline = Arc::clone(&deadline);
            lua.set_hook(
                LuaHookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
                move |_lua, _debug| {
                    let expired = deadline
                        .lock()
                        .map(|deadline| Instant::now() > *deadline)
                        .unwrap_or(false);
                    if expired {
                        state.timed_out.store(true, Ordering::SeqCst);
                        Err(LuaError::runtime("wall-clock limit exceeded"))
                    } else {
                        Ok(LuaVmState::Continue)
                    }
                },
            );
        }
        lua.set_memory_limit(lua.used_memory() + limits.memory_bytes)
            .map_err(setup_error)?;

        let result = lua.load(code).set_name("generated").exec();
        debug!(
            "Lua run finished at depth {} ({} sub_lm calls)",
            limits.depth,
            state.sub_lm_calls.load(Ordering::SeqCst)
        );

        let finished = state.finished();
        if let Err(e) = result
            && !finished
        {
            return Err(classify_error(&e, &state, limits));
        }

        let mut final_answer = state
            .final_answer
            .lock()
            .map(|mut answer| answer.take())
            .unwrap_or(None);
        let Some(answer) = final_answer.as_mut() else {
            return Err(SandboxError::NoFinal);
        };
        if answer.len() > limits.output_bytes {
            truncate_at_char(answer, limits.output_bytes);
            state.truncated.store(true, Ordering::SeqCst);
        }

        let printed = state
            .printed
            .lock()
            .map(|printed| printed.clone())
            .unwrap_or_default();
        Ok(SandboxOutput {
            final_answer,
            printed,
            output_truncated: state.truncated.load(Ordering::SeqCst),
            sub_lm_calls: state.sub_lm_calls.load(Ordering::SeqCst),
        })
    }

    fn name(&self) -> &'static str {
        "lua"
    }
}

fn setup_error(e: LuaError) -> SandboxError {
    SandboxError::Unavailable(format!("could not prepare Lua VM: {}", e))
}

fn classify_error(e: &LuaError, state: &RunState, limits: &SandboxLimits) -> SandboxError {
    if state.timed_out.load(Ordering::SeqCst) {
        return SandboxError::Timeout(limits.wall_clock);
    }
    match root_cause(e) {
        LuaError::MemoryError(_) => SandboxError::MemoryLimit,
        _ => SandboxError::Runtime(e.to_string()),
    }
}

fn root_cause(e: &LuaError) -> &LuaError {
    match e {
        LuaError::CallbackError { cause, .. } => root_cause(cause),
        other => other,
    }
}

fn install_globals(
    lua: &Lua,
    documents: &[AgentDocument],
    limits: &SandboxLimits,
    bridge: &SubLmBridge,
    state: &Arc<RunState>,
    deadline: &Arc<Mutex<Instant>>,
) -> LuaResult<()> {
    let globals = lua.globals();

    let agents = lua.create_table()?;
    for (i, doc) in documents.iter().enumerate() {
        agents.set(i + 1, agent_table(lua, doc)?)?;
    }
    globals.set("agents", agents.clone())?;

    // search(term)
    {
        let haystacks: Vec<String> = documents.iter().map(searchable_text).collect();
        let agents_key = lua.create_registry_value(agents)?;
        let search = lua.create_function(move |lua, term: String| {
            let agents: LuaTable = lua.registry_value(&agents_key)?;
            let needle = term.to_lowercase();
            let matches = lua.create_table()?;
            for (i, text) in haystacks.iter().enumerate() {
                if text.contains(&needle) {
                    let agent: LuaTable = agents.get(i + 1)?;
                    matches.push(agent)?;
                }
            }
            Ok(matches)
        })?;
        globals.set("search", search)?;
    }

    // print(...)
    {
        let state = Arc::clone(state);
        let limit = limits.output_bytes;
        let print = lua.create_function(move |_, args: LuaVariadic<LuaValue>| {
            let line = args.iter().map(render_scalar).collect::<Vec<_>>().join("\t");
            if let Ok(mut printed) = state.printed.lock() {
                if printed.len() + line.len() + 1 > limit {
                    state.truncated.store(true, Ordering::SeqCst);
                    let room = limit.saturating_sub(printed.len());
                    let mut head = line;
                    truncate_at_char(&mut head, room);
                    printed.push_str(&head);
                } else {
                    printed.push_str(&line);
                    printed.push('\n');
                }
            }
            Ok(())
        })?;
        globals.set("print", print)?;
    }

    // sub_lm(query, context?)
    {
        let bridge = bridge.clone();
        let state = Arc::clone(state);
        let deadline = Arc::clone(deadline);
        let sub_lm = lua.create_function(move |_, (query, context): (String, Option<String>)| {
            state.sub_lm_calls.fetch_add(1, Ordering::SeqCst);
            let started = Instant::now();
            let answer = bridge.call(&query, context.as_deref().unwrap_or(""));
            if let Ok(mut deadline) = deadline.lock() {
                *deadline += started.elapsed();
            }
            answer.map_err(LuaError::external)
        })?;
        globals.set("sub_lm", sub_lm)?;
    }

    // FINAL(value)
    {
        let state = Arc::clone(state);
        let final_fn = lua.create_function(move |_, value: LuaValue| {
            state.set_final(render_value(&value));
            Err::<(), _>(LuaError::runtime(FINAL_SIGNAL))
        })?;
        globals.set("FINAL", final_fn)?;
    }

    // FINAL_VAR(name)
    {
        let state = Arc::clone(state);
        let final_var = lua.create_function(move |lua, name: String| {
            let value: LuaValue = lua.globals().get(name.as_str())?;
            if value.is_nil() {
                return Err(LuaError::runtime(format!(
                    "FINAL_VAR: global '{}' is not set",
                    name
                )));
            }
            state.set_final(render_value(&value));
            Err::<(), _>(LuaError::runtime(FINAL_SIGNAL))
        })?;
        globals.set("FINAL_VAR", final_var)?;
    }

    // pcall(f, ...)
    {
        let state = Arc::clone(state);
        let bridge = bridge.clone();
        let pcall = lua.create_function(move |lua, (f, args): (LuaFunction, LuaMultiValue)| {
            match f.call::<LuaMultiValue>(args) {
                Ok(values) => {
                    let mut out = vec![LuaValue::Boolean(true)];
                    out.extend(values);
                    Ok(LuaMultiValue::from_vec(out))
                }
                Err(e) => {
                    let uncatchable = state.finished()
                        || state.timed_out.load(Ordering::SeqCst)
                        || bridge.has_failed()
                        || matches!(root_cause(&e), LuaError::MemoryError(_));
                    if uncatchable {
                        return Err(e);
                    }
                    let message = lua.create_string(root_cause(&e).to_string())?;
                    Ok(LuaMultiValue::from_vec(vec![
                        LuaValue::Boolean(false),
                        LuaValue::String(message),
                    ]))
                }
            }
        })?;
        globals.set("pcall", pcall)?;
    }

    Ok(())
}

fn agent_table(lua: &Lua, doc: &AgentDocument) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    table.set("id", doc.id.as_str())?;
    table.set("name", doc.label())?;
    table.set("date", doc.date.map(|d| d.to_string()))?;
    table.set("summary", doc.summary.as_str())?;
    table.set("sentiment", doc.sentiment.as_deref())?;
    table.set("transcript", doc.transcript.as_deref())?;
    table.set(
        "key_points",
        lua.create_sequence_from(doc.key_points.iter().map(String::as_str))?,
    )?;
    table.set(
        "action_items",
        lua.create_sequence_from(doc.action_items.iter().map(String::as_str))?,
    )?;
    Ok(table)
}

fn searchable_text(doc: &AgentDocument) -> String {
    let mut parts = vec![doc.label(), doc.summary.as_str()];
    parts.extend(doc.key_points.iter().map(String::as_str));
    parts.extend(doc.action_items.iter().map(String::as_str));
    if let Some(sentiment) = &doc.sentiment {
        parts.push(sentiment);
    }
    if let Some(transcript) = &doc.transcript {
        parts.push(transcript);
    }
    parts.join("\n").to_lowercase()
}

/// Text for a final value: sequences become one item per line, other
/// tables `key: value` lines sorted by key.
fn render_value(value: &LuaValue) -> String {
    match value {
        LuaValue::Table(table) => {
            if table.raw_len() > 0 {
                table
                    .clone()
                    .sequence_values::<LuaValue>()
                    .filter_map(Result::ok)
                    .map(|item| render_scalar(&item))
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                let mut lines: Vec<String> = table
                    .clone()
                    .pairs::<LuaValue, LuaValue>()
                    .filter_map(Result::ok)
                    .map(|(k, v)| format!("{}: {}", render_scalar(&k), render_scalar(&v)))
                    .collect();
                lines.sort();
                lines.join("\n")
            }
        }
        other => render_scalar(other),
    }
}

fn render_scalar(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::String(s) => s.to_string_lossy(),
        other => other.type_name().to_string(),
    }
}

fn truncate_at_char(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
